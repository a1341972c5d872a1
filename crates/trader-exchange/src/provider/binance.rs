//! Binance SpotExchange 구현.
//!
//! BinanceClient를 래핑하여 거래소 중립적인 인터페이스를 제공합니다.
//!
//! # 아키텍처
//!
//! ```text
//! BinanceExchangeProvider
//! ├── 조회 (재시도 적용)
//! │   ├── order_status() / find_order_by_client_id()
//! │   ├── account_balances()
//! │   ├── candlesticks()
//! │   └── symbol_rules()
//! └── 변경 (재시도 없음, 결과 불명 → Indeterminate)
//!     ├── cancel_order()
//!     ├── place_market_order()
//!     └── place_stop_limit_order()
//! ```

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use trader_core::domain::{
    AssetBalance, CancelResult, Candlestick, MarketOrderRequest, Order, OrderAmount, OrderStatus,
    ProviderError, Side, SpotExchange, StopLimitOrderRequest, SymbolRules,
};
use trader_core::decimals_from_step;

use crate::connector::binance::models::{BinanceKline, BinanceOrder};
use crate::connector::binance::{BinanceClient, NewOrder};
use crate::error::{to_provider_error, to_provider_error_for_mutation};
use crate::retry::{with_retry, RetryConfig};
use crate::ExchangeError;

// ==================== 변환 ====================

fn side_param(side: Side) -> &'static str {
    side.as_str()
}

fn to_order(raw: &BinanceOrder) -> Result<Order, ProviderError> {
    let status = OrderStatus::from_str(&raw.status).map_err(ProviderError::Parse)?;
    Ok(Order::new(
        raw.order_id.to_string(),
        raw.executed_qty,
        raw.average_price(),
        status,
    ))
}

fn to_candlestick(kline: &BinanceKline) -> Result<Candlestick, ProviderError> {
    let ts = |ms: i64| {
        DateTime::<Utc>::from_timestamp_millis(ms)
            .ok_or_else(|| ProviderError::Parse(format!("잘못된 캔들 시각: {ms}")))
    };
    Ok(Candlestick {
        open_time: ts(kline.open_time_ms())?,
        close: kline.close(),
        close_time: ts(kline.close_time_ms())?,
        volume: kline.volume(),
    })
}

// ==================== Provider ====================

/// Binance 현물 거래소 Provider.
pub struct BinanceExchangeProvider {
    client: Arc<BinanceClient>,
    /// 조회 요청 재시도 설정
    retry: RetryConfig,
}

impl BinanceExchangeProvider {
    /// 새 BinanceExchangeProvider 생성.
    pub fn new(client: Arc<BinanceClient>) -> Self {
        Self {
            client,
            retry: RetryConfig::default(),
        }
    }

    /// BinanceClient에서 생성.
    pub fn from_client(client: BinanceClient) -> Self {
        Self::new(Arc::new(client))
    }

    /// 조회 재시도 설정 변경.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// 변경 요청 결과 로깅 및 에러 변환.
    fn mutation_result(
        action: &str,
        pair: &str,
        result: Result<BinanceOrder, ExchangeError>,
    ) -> Result<BinanceOrder, ProviderError> {
        result.map_err(|e| {
            if e.is_indeterminate() {
                warn!(action, pair, error = %e, "주문 처리 결과 불명, 다음 주기에 재조회 필요");
            } else {
                warn!(action, pair, error = %e, "거래소가 요청을 거부함");
            }
            to_provider_error_for_mutation(e)
        })
    }
}

#[async_trait]
impl SpotExchange for BinanceExchangeProvider {
    async fn order_status(&self, pair: &str, order_id: &str) -> Result<Order, ProviderError> {
        let raw = with_retry(&self.retry, || self.client.get_order(pair, order_id))
            .await
            .map_err(to_provider_error)?;
        to_order(&raw)
    }

    async fn find_order_by_client_id(
        &self,
        pair: &str,
        client_order_id: &str,
    ) -> Result<Option<Order>, ProviderError> {
        let raw = with_retry(&self.retry, || {
            self.client.find_order_by_client_id(pair, client_order_id)
        })
        .await
        .map_err(to_provider_error)?;
        raw.as_ref().map(to_order).transpose()
    }

    async fn cancel_order(&self, pair: &str, order_id: &str) -> Result<CancelResult, ProviderError> {
        let result = self.client.cancel_order(pair, order_id).await;
        let raw = Self::mutation_result("cancel", pair, result)?;
        let status = OrderStatus::from_str(&raw.status).map_err(ProviderError::Parse)?;

        info!(pair, order_id, %status, "Binance 주문 취소");
        Ok(CancelResult {
            order_id: raw.order_id.to_string(),
            status,
        })
    }

    async fn account_balances(&self) -> Result<HashMap<String, AssetBalance>, ProviderError> {
        let account = with_retry(&self.retry, || self.client.get_account())
            .await
            .map_err(to_provider_error)?;

        Ok(account
            .balances
            .into_iter()
            .map(|b| {
                (
                    b.asset,
                    AssetBalance {
                        free: b.free,
                        locked: b.locked,
                    },
                )
            })
            .collect())
    }

    async fn place_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<Order, ProviderError> {
        let side = side_param(request.side);
        let order = match request.amount {
            OrderAmount::Base(quantity) => NewOrder::Market { side, quantity },
            OrderAmount::Quote(quote_qty) => NewOrder::MarketQuote { side, quote_qty },
        };

        let result = self
            .client
            .new_order(&request.pair, &order, request.client_order_id.as_deref())
            .await;
        let raw = Self::mutation_result("market", &request.pair, result)?;
        let order = to_order(&raw)?;

        info!(
            pair = %request.pair,
            side,
            order_id = %order.order_id,
            executed_qty = %order.executed_qty,
            status = %order.status,
            "Binance 시장가 주문 체결"
        );
        Ok(order)
    }

    async fn place_stop_limit_order(
        &self,
        request: &StopLimitOrderRequest,
    ) -> Result<Order, ProviderError> {
        let order = NewOrder::StopLossLimit {
            side: side_param(request.side),
            quantity: request.quantity,
            stop_price: request.stop_price,
            price: request.limit_price,
        };

        let result = self
            .client
            .new_order(&request.pair, &order, request.client_order_id.as_deref())
            .await;
        let raw = Self::mutation_result("stop_limit", &request.pair, result)?;

        info!(
            pair = %request.pair,
            quantity = %request.quantity,
            stop_price = %request.stop_price,
            order_id = raw.order_id,
            "Binance 스탑 리밋 주문 접수"
        );
        to_order(&raw)
    }

    async fn candlesticks(
        &self,
        pair: &str,
        interval: &str,
        limit: u16,
    ) -> Result<Vec<Candlestick>, ProviderError> {
        let klines = with_retry(&self.retry, || self.client.get_klines(pair, interval, limit))
            .await
            .map_err(to_provider_error)?;
        klines.iter().map(to_candlestick).collect()
    }

    async fn symbol_rules(&self, pair: &str) -> Result<SymbolRules, ProviderError> {
        let info = with_retry(&self.retry, || self.client.get_exchange_info(pair))
            .await
            .map_err(to_provider_error)?;

        let symbol = info
            .symbols
            .into_iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(pair))
            .ok_or_else(|| ProviderError::Parse(format!("심볼 정보 없음: {pair}")))?;

        let missing = |name: &str| ProviderError::Parse(format!("{pair} {name} 필터 없음"));
        Ok(SymbolRules {
            pair: symbol.symbol.clone(),
            min_notional: symbol.min_notional().ok_or_else(|| missing("NOTIONAL"))?,
            step_decimals: decimals_from_step(symbol.step_size().ok_or_else(|| missing("LOT_SIZE"))?),
            tick_decimals: decimals_from_step(
                symbol.tick_size().ok_or_else(|| missing("PRICE_FILTER"))?,
            ),
        })
    }

    fn exchange_name(&self) -> &str {
        "binance"
    }
}
