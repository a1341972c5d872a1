//! 운영자 알림.
//!
//! 모든 구현체는 `trader_core::Notifier`를 구현하며, 전송 실패는 로그로만 남기고
//! 호출자의 작업 흐름을 막지 않습니다.

pub mod email;
pub mod logging;
pub mod recording;
pub mod types;

pub use email::{EmailConfig, EmailSender};
pub use logging::LogNotifier;
pub use recording::{Alert, RecordingNotifier};
pub use types::{NotificationError, NotificationResult};
