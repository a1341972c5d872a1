//! 알림 기록기.
//!
//! 보낸 알림을 메모리에 쌓아 두며, 드라이런과 테스트에서 알림 횟수와 내용을 확인하는 데 씁니다.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use trader_core::Notifier;

/// 기록된 알림.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 받은 알림.
    pub async fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.alerts.lock().await.len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn alert(&self, subject: &str, body: &str) {
        debug!(subject, "알림 기록");
        self.alerts.lock().await.push(Alert {
            subject: subject.to_string(),
            body: body.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_in_order() {
        let notifier = RecordingNotifier::new();
        notifier.alert("first", "a").await;
        notifier.alert("second", "b").await;

        let alerts = notifier.alerts().await;
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].subject, "first");
        assert_eq!(alerts[1].body, "b");
    }
}
