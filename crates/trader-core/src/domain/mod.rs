//! 도메인 타입 및 외부 협력자 인터페이스.

pub mod clock;
pub mod exchange_provider;
pub mod notifier;
pub mod order;
pub mod signal;
pub mod signal_store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use exchange_provider::{
    base_asset_of, AssetBalance, Candlestick, MarketOrderRequest, OrderAmount, ProviderError,
    SpotExchange, StopLimitOrderRequest, SymbolRules, QUOTE_ASSET_LEN,
};
pub use notifier::Notifier;
pub use order::{CancelResult, ExitReason, Order, OrderStatus, Side};
pub use signal::{RawSignal, Signal, SignalError, SignalIdentity, TradeType};
pub use signal_store::{SignalStore, StoreError};
