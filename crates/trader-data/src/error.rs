//! 데이터 계층 에러 타입.

use thiserror::Error;
use trader_core::{SignalError, StoreError};

/// 데이터 계층 에러.
#[derive(Debug, Error)]
pub enum DataError {
    /// DB 연결 실패
    #[error("DB 연결 에러: {0}")]
    ConnectionError(String),

    /// 마이그레이션 실패
    #[error("마이그레이션 에러: {0}")]
    MigrationError(String),

    /// 시그널 파일 읽기 실패
    #[error("파일 읽기 에러 ({path}): {message}")]
    Io { path: String, message: String },

    /// JSON 구조 에러
    #[error("시그널 파일 파싱 에러 ({path}): {message}")]
    Parse { path: String, message: String },

    /// 식별 필드가 잘못된 시그널 레코드 (배치 전체 거부)
    #[error("{path}의 {index}번째 시그널 오류: {source}")]
    InvalidSignal {
        path: String,
        index: usize,
        #[source]
        source: SignalError,
    },
}

impl From<sqlx::Error> for DataError {
    fn from(e: sqlx::Error) -> Self {
        DataError::ConnectionError(e.to_string())
    }
}

/// sqlx 에러 → 저장소 에러.
pub(crate) fn store_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, DataError>;
