//! 거래소 커넥터.
//!
//! - `connector`: Binance Spot REST 클라이언트 (HMAC 서명, 응답 모델)
//! - `provider`: `trader_core::SpotExchange` 구현체 (Binance, Mock)
//! - `retry`: 조회성 요청 재시도
//!
//! 주문/취소 요청은 재시도하지 않으며, 타임아웃이나 503 같은 결과 불명 응답은
//! `ProviderError::Indeterminate`로 보고합니다.

pub mod connector;
mod error;
pub mod provider;
pub mod retry;

pub use connector::binance::{BinanceClient, BinanceConfig};
pub use error::{to_provider_error, to_provider_error_for_mutation, ExchangeError};
pub use provider::{BinanceExchangeProvider, ExchangeCall, MockSpotExchange};
