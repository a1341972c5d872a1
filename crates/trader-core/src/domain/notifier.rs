//! 운영 알림 추상화.

use async_trait::async_trait;

/// 알림 전송 trait.
///
/// 최선 노력(best-effort) 전송이며, 실패해도 호출자에게 전파하지 않습니다.
/// 구현체는 실패를 로그로만 남깁니다.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 경고 알림 전송.
    async fn alert(&self, subject: &str, body: &str);
}
