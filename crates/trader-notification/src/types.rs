//! 알림 공통 타입.

use thiserror::Error;

/// 알림 에러.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// 설정 오류 (주소 형식 등)
    #[error("알림 설정 오류: {0}")]
    InvalidConfig(String),

    /// 전송 실패
    #[error("알림 전송 실패: {0}")]
    SendFailed(String),
}

/// 알림 결과 타입.
pub type NotificationResult<T> = Result<T, NotificationError>;
