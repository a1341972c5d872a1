//! 실행 에러 타입.

use thiserror::Error;
use trader_core::{ProviderError, SizingError, StoreError};

/// 진입/청산 실행 에러.
///
/// 거래소의 결과 불명 응답은 에러가 아니라 각 실행기의 `Indeterminate` 결과로 반환됩니다.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// 거래소 거부 또는 통신 실패
    #[error("거래소 에러: {0}")]
    Exchange(#[from] ProviderError),

    /// 저장소 쓰기/읽기 실패 (해당 실행 중단)
    #[error("저장소 에러: {0}")]
    Store(#[from] StoreError),

    /// 수량 계산 실패
    #[error("수량 계산 에러: {0}")]
    Sizing(#[from] SizingError),

    /// 진입했지만 보호 주문 기록이 없음
    #[error("보호 주문 기록 없음: {0}")]
    MissingProtectiveOrder(String),

    /// 기준 자산을 알 수 없는 페어
    #[error("잘못된 거래 페어: {0}")]
    InvalidPair(String),

    /// 보호 주문 수량이 0
    #[error("보호 주문 수량 없음: {pair} 체결 수량 {executed_qty}")]
    ZeroProtectiveQuantity {
        pair: String,
        executed_qty: rust_decimal::Decimal,
    },
}

impl ExecutionError {
    /// 거래소 결과 불명 여부.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, ExecutionError::Exchange(e) if e.is_indeterminate())
    }
}

/// 실행 결과 타입.
pub type ExecutionResult<T> = Result<T, ExecutionError>;
