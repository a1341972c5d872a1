//! 에러 타입 정의.

use thiserror::Error;
use trader_core::{ProviderError, StoreError};
use trader_data::DataError;
use trader_exchange::ExchangeError;
use trader_execution::ExecutionError;

/// 데몬 에러 타입
#[derive(Debug, Error)]
pub enum DaemonError {
    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 데이터 계층 에러 (DB 연결, 시그널 파일)
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// 저장소 에러
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// 거래소 에러
    #[error("Exchange error: {0}")]
    Exchange(#[from] ProviderError),

    /// 거래소 클라이언트 생성 에러
    #[error("Exchange client error: {0}")]
    Connector(#[from] ExchangeError),

    /// 저장소에 없는 시그널
    #[error("Signal not found: {0}")]
    SignalNotFound(String),

    /// 가격 데이터 없음
    #[error("No market data: {0}")]
    NoMarketData(String),

    /// 주문 실행 에러
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, DaemonError>;
