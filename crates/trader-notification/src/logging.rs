//! 로그 전용 알림.
//!
//! 이메일 설정이 없을 때 기본으로 사용합니다.

use async_trait::async_trait;
use tracing::warn;
use trader_core::Notifier;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn alert(&self, subject: &str, body: &str) {
        warn!(subject, body, "운영자 확인 필요");
    }
}
