//! SpotExchange 구현체.
//!
//! - [`BinanceExchangeProvider`]: Binance 현물 거래소 Provider
//! - [`MockSpotExchange`]: 호출을 기록하는 테스트용 Mock Provider

mod binance;
mod mock;

pub use binance::BinanceExchangeProvider;
pub use mock::{ExchangeCall, MockSpotExchange};
