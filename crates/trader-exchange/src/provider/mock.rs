//! Mock 현물 거래소.
//!
//! 실제 거래소와 동일한 `SpotExchange` 인터페이스를 제공하며, 모든 호출을
//! 순서대로 기록합니다. 청산/진입 흐름 테스트에서 협력자 호출 순서와 횟수를
//! 검증할 때 사용합니다.
//!
//! 잔고는 주문으로 변하지 않습니다. 테스트가 필요한 잔고를 직접 지정합니다.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use trader_core::domain::{
    AssetBalance, CancelResult, Candlestick, MarketOrderRequest, Order, OrderAmount, OrderStatus,
    ProviderError, SpotExchange, StopLimitOrderRequest, SymbolRules,
};

use crate::error::{CODE_CANCEL_REJECTED, CODE_NO_SUCH_ORDER};

/// 기록된 거래소 호출.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeCall {
    OrderStatus { pair: String, order_id: String },
    FindOrderByClientId { pair: String, client_order_id: String },
    CancelOrder { pair: String, order_id: String },
    AccountBalances,
    MarketOrder(MarketOrderRequest),
    StopLimitOrder(StopLimitOrderRequest),
    Candlesticks { pair: String, interval: String, limit: u16 },
    SymbolRules { pair: String },
}

#[derive(Default)]
struct MockState {
    orders: HashMap<String, Order>,
    client_orders: HashMap<String, Order>,
    balances: HashMap<String, AssetBalance>,
    market_prices: HashMap<String, Decimal>,
    candles: HashMap<String, Vec<Candlestick>>,
    rules: HashMap<String, SymbolRules>,
    cancel_status: Option<OrderStatus>,
    next_market_error: Option<ProviderError>,
    next_cancel_error: Option<ProviderError>,
    next_order_id: u64,
    calls: Vec<ExchangeCall>,
}

impl MockState {
    fn issue_order_id(&mut self) -> String {
        self.next_order_id += 1;
        format!("mock-{}", self.next_order_id)
    }

    fn store(&mut self, client_order_id: Option<&String>, order: &Order) {
        self.orders.insert(order.order_id.clone(), order.clone());
        if let Some(id) = client_order_id {
            self.client_orders.insert(id.clone(), order.clone());
        }
    }
}

/// 호출 기록형 Mock 거래소.
#[derive(Default)]
pub struct MockSpotExchange {
    state: Mutex<MockState>,
}

impl MockSpotExchange {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== 상태 설정 (빌더) ====================

    /// 기존 주문 등록.
    pub fn with_order(mut self, order: Order) -> Self {
        let state = self.state.get_mut();
        state.orders.insert(order.order_id.clone(), order);
        self
    }

    /// 클라이언트 주문 ID로 조회될 주문 등록.
    pub fn with_client_order(mut self, client_order_id: &str, order: Order) -> Self {
        let state = self.state.get_mut();
        state.orders.insert(order.order_id.clone(), order.clone());
        state.client_orders.insert(client_order_id.to_string(), order);
        self
    }

    /// 자산 사용 가능 잔고 설정.
    pub fn with_balance(mut self, asset: &str, free: Decimal) -> Self {
        self.state.get_mut().balances.insert(
            asset.to_string(),
            AssetBalance {
                free,
                locked: Decimal::ZERO,
            },
        );
        self
    }

    /// 시장가 주문 체결 가격 설정.
    pub fn with_market_price(mut self, pair: &str, price: Decimal) -> Self {
        self.state
            .get_mut()
            .market_prices
            .insert(pair.to_string(), price);
        self
    }

    pub fn with_candles(mut self, pair: &str, candles: Vec<Candlestick>) -> Self {
        self.state.get_mut().candles.insert(pair.to_string(), candles);
        self
    }

    pub fn with_rules(mut self, rules: SymbolRules) -> Self {
        self.state.get_mut().rules.insert(rules.pair.clone(), rules);
        self
    }

    /// 취소 응답에 보고할 상태 지정 (기본 CANCELED).
    pub fn with_cancel_status(mut self, status: OrderStatus) -> Self {
        self.state.get_mut().cancel_status = Some(status);
        self
    }

    /// 다음 시장가 주문을 실패시킴.
    pub fn fail_next_market_order(mut self, error: ProviderError) -> Self {
        self.state.get_mut().next_market_error = Some(error);
        self
    }

    /// 다음 취소 요청을 실패시킴.
    pub fn fail_next_cancel(mut self, error: ProviderError) -> Self {
        self.state.get_mut().next_cancel_error = Some(error);
        self
    }

    // ==================== 기록 조회 ====================

    /// 지금까지의 호출 기록.
    pub async fn calls(&self) -> Vec<ExchangeCall> {
        self.state.lock().await.calls.clone()
    }

    /// 접수된 시장가 주문 요청.
    pub async fn market_orders(&self) -> Vec<MarketOrderRequest> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter_map(|c| match c {
                ExchangeCall::MarketOrder(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    /// 접수된 스탑 리밋 주문 요청.
    pub async fn stop_limit_orders(&self) -> Vec<StopLimitOrderRequest> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter_map(|c| match c {
                ExchangeCall::StopLimitOrder(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    /// 취소 요청 횟수.
    pub async fn cancel_count(&self) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| matches!(c, ExchangeCall::CancelOrder { .. }))
            .count()
    }
}

fn no_such_order(id: &str) -> ProviderError {
    ProviderError::Api {
        code: CODE_NO_SUCH_ORDER,
        message: format!("Order does not exist: {id}"),
    }
}

#[async_trait]
impl SpotExchange for MockSpotExchange {
    async fn order_status(&self, pair: &str, order_id: &str) -> Result<Order, ProviderError> {
        let mut state = self.state.lock().await;
        state.calls.push(ExchangeCall::OrderStatus {
            pair: pair.to_string(),
            order_id: order_id.to_string(),
        });
        state
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| no_such_order(order_id))
    }

    async fn find_order_by_client_id(
        &self,
        pair: &str,
        client_order_id: &str,
    ) -> Result<Option<Order>, ProviderError> {
        let mut state = self.state.lock().await;
        state.calls.push(ExchangeCall::FindOrderByClientId {
            pair: pair.to_string(),
            client_order_id: client_order_id.to_string(),
        });
        Ok(state.client_orders.get(client_order_id).cloned())
    }

    async fn cancel_order(&self, pair: &str, order_id: &str) -> Result<CancelResult, ProviderError> {
        let mut state = self.state.lock().await;
        state.calls.push(ExchangeCall::CancelOrder {
            pair: pair.to_string(),
            order_id: order_id.to_string(),
        });
        if let Some(error) = state.next_cancel_error.take() {
            return Err(error);
        }

        let reported = state.cancel_status.unwrap_or(OrderStatus::Canceled);
        let order = state
            .orders
            .get_mut(order_id)
            .filter(|o| o.status.is_open())
            .ok_or_else(|| ProviderError::Api {
                code: CODE_CANCEL_REJECTED,
                message: format!("Unknown order sent: {order_id}"),
            })?;
        order.status = reported;

        Ok(CancelResult {
            order_id: order_id.to_string(),
            status: reported,
        })
    }

    async fn account_balances(&self) -> Result<HashMap<String, AssetBalance>, ProviderError> {
        let mut state = self.state.lock().await;
        state.calls.push(ExchangeCall::AccountBalances);
        Ok(state.balances.clone())
    }

    async fn place_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<Order, ProviderError> {
        let mut state = self.state.lock().await;
        state.calls.push(ExchangeCall::MarketOrder(request.clone()));
        if let Some(error) = state.next_market_error.take() {
            return Err(error);
        }

        let price = state
            .market_prices
            .get(&request.pair)
            .copied()
            .unwrap_or(Decimal::ONE);
        let executed_qty = match request.amount {
            OrderAmount::Base(qty) => qty,
            OrderAmount::Quote(quote) => (quote / price).round_dp(8),
        };
        let order_id = state.issue_order_id();
        let order = Order::new(order_id, executed_qty, price, OrderStatus::Filled);
        state.store(request.client_order_id.as_ref(), &order);
        Ok(order)
    }

    async fn place_stop_limit_order(
        &self,
        request: &StopLimitOrderRequest,
    ) -> Result<Order, ProviderError> {
        let mut state = self.state.lock().await;
        state.calls.push(ExchangeCall::StopLimitOrder(request.clone()));

        let order_id = state.issue_order_id();
        let order = Order::new(order_id, Decimal::ZERO, Decimal::ZERO, OrderStatus::New);
        state.store(request.client_order_id.as_ref(), &order);
        Ok(order)
    }

    async fn candlesticks(
        &self,
        pair: &str,
        interval: &str,
        limit: u16,
    ) -> Result<Vec<Candlestick>, ProviderError> {
        let mut state = self.state.lock().await;
        state.calls.push(ExchangeCall::Candlesticks {
            pair: pair.to_string(),
            interval: interval.to_string(),
            limit,
        });
        let candles = state.candles.get(pair).cloned().unwrap_or_default();
        let skip = candles.len().saturating_sub(usize::from(limit));
        Ok(candles.into_iter().skip(skip).collect())
    }

    async fn symbol_rules(&self, pair: &str) -> Result<SymbolRules, ProviderError> {
        let mut state = self.state.lock().await;
        state.calls.push(ExchangeCall::SymbolRules {
            pair: pair.to_string(),
        });
        state.rules.get(pair).cloned().ok_or_else(|| ProviderError::Api {
            code: -1121,
            message: format!("Invalid symbol: {pair}"),
        })
    }

    fn exchange_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trader_core::Side;

    #[tokio::test]
    async fn test_cancel_only_open_orders() {
        let exchange = MockSpotExchange::new()
            .with_order(Order::new("1", dec!(0), dec!(0), OrderStatus::New))
            .with_order(Order::new("2", dec!(3), dec!(10), OrderStatus::Filled));

        let result = exchange.cancel_order("BTCUSDT", "1").await.unwrap();
        assert_eq!(result.status, OrderStatus::Canceled);
        assert_eq!(
            exchange.order_status("BTCUSDT", "1").await.unwrap().status,
            OrderStatus::Canceled
        );
        assert!(exchange.cancel_order("BTCUSDT", "2").await.is_err());
        assert_eq!(exchange.cancel_count().await, 2);
    }

    #[tokio::test]
    async fn test_market_order_by_quote_amount() {
        let exchange = MockSpotExchange::new().with_market_price("ETHUSDT", dec!(2000));
        let order = exchange
            .place_market_order(&MarketOrderRequest {
                pair: "ETHUSDT".to_string(),
                side: Side::Buy,
                amount: OrderAmount::Quote(dec!(50)),
                client_order_id: Some("entry-1".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(order.executed_qty, dec!(0.025));
        assert_eq!(order.avg_price, dec!(2000));
        let found = exchange
            .find_order_by_client_id("ETHUSDT", "entry-1")
            .await
            .unwrap();
        assert_eq!(found, Some(order));
    }

    #[tokio::test]
    async fn test_candles_limited_to_latest() {
        let candle = |close: Decimal| Candlestick {
            open_time: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
            close,
            close_time: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
            volume: dec!(1),
        };
        let exchange = MockSpotExchange::new().with_candles(
            "BTCUSDT",
            vec![candle(dec!(1)), candle(dec!(2)), candle(dec!(3))],
        );

        let candles = exchange.candlesticks("BTCUSDT", "1h", 2).await.unwrap();
        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![dec!(2), dec!(3)]);
    }
}
