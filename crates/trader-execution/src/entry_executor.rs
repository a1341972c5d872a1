//! 진입 주문 실행.
//!
//! 신규 BUY 시그널에 대해 시장가 매수 후 보호용 STOP_LOSS_LIMIT 매도 주문을 냅니다.
//! 주문 금액은 손절 주문까지 최소 주문 금액을 만족하도록 계산합니다.
//!
//! 현물 롱 전용이므로 SELL 시그널은 거래하지 않습니다.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};
use trader_core::{
    min_entry_value_usd, round_up, truncate, MarketOrderRequest, Order, OrderAmount, Side, Signal,
    SignalStore, SpotExchange, StopLimitOrderRequest, SymbolRules, TradeType, COMMISSION_FACTOR,
};

use crate::client_order_id::{client_order_id, OrderRole};
use crate::error::{ExecutionError, ExecutionResult};

/// 스탑 가격 대비 지정가 비율 (0.5% 아래)
const LIMIT_BELOW_STOP: Decimal = dec!(0.995);

/// 주문 금액 소수점 자릿수 (USDT)
const QUOTE_DECIMALS: u32 = 2;

/// 진입 설정.
#[derive(Debug, Clone)]
pub struct EntryConfig {
    /// 손절 비율 (%)
    pub stop_loss_percent: Decimal,
    /// 기본 진입 금액. 최소 진입 금액보다 작으면 최소 금액을 사용합니다.
    pub quote_amount: Decimal,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            stop_loss_percent: dec!(5),
            quote_amount: dec!(15),
        }
    }
}

/// 진입 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    /// 이미 진입 기록이 있음
    AlreadyEntered,
    /// 거래 대상이 아님 (SELL 시그널, 비활성 시그널)
    Skipped(&'static str),
    /// 진입 주문이 체결되지 않음 (다음 주기에 클라이언트 ID로 재확인)
    Unfilled(Order),
    /// 진입 및 보호 주문 완료
    Entered { entry: Order, protective: Order },
    /// 거래소 처리 결과 불명
    Indeterminate(String),
}

/// 보호 주문 가격/수량.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectiveOrderPlan {
    pub quantity: Decimal,
    pub stop_price: Decimal,
    pub limit_price: Decimal,
}

/// 체결된 진입 주문에서 보호 주문 계획 계산.
///
/// 매수 수수료는 기준 자산에서 차감되므로 보유 수량은 `체결 × 0.999`를 스텝 단위로 절사한 값입니다.
pub fn plan_protective_order(
    entry: &Order,
    rules: &SymbolRules,
    stop_loss_percent: Decimal,
) -> ProtectiveOrderPlan {
    let quantity = truncate(entry.executed_qty * COMMISSION_FACTOR, rules.step_decimals);
    let stop_price = truncate(
        entry.avg_price * (Decimal::ONE_HUNDRED - stop_loss_percent) / Decimal::ONE_HUNDRED,
        rules.tick_decimals,
    );
    let limit_price = truncate(stop_price * LIMIT_BELOW_STOP, rules.tick_decimals);
    ProtectiveOrderPlan {
        quantity,
        stop_price,
        limit_price,
    }
}

/// 진입 실행기.
pub struct EntryExecutor {
    exchange: Arc<dyn SpotExchange>,
    store: Arc<dyn SignalStore>,
    config: EntryConfig,
}

impl EntryExecutor {
    pub fn new(
        exchange: Arc<dyn SpotExchange>,
        store: Arc<dyn SignalStore>,
        config: EntryConfig,
    ) -> Self {
        Self {
            exchange,
            store,
            config,
        }
    }

    pub fn config(&self) -> &EntryConfig {
        &self.config
    }

    /// 시그널 진입.
    ///
    /// # Errors
    ///
    /// 거래소 거부, 저장소 실패, 수량 계산 실패는 에러입니다.
    pub async fn enter(
        &self,
        signal: &Signal,
        current_price: Decimal,
    ) -> ExecutionResult<EntryOutcome> {
        match self.run(signal, current_price).await {
            Err(ExecutionError::Exchange(e)) if e.is_indeterminate() => {
                warn!(
                    signal = %signal.identity(),
                    error = %e,
                    "진입 처리 결과 불명, 다음 주기에 재확인"
                );
                Ok(EntryOutcome::Indeterminate(e.to_string()))
            }
            other => other,
        }
    }

    async fn run(&self, signal: &Signal, current_price: Decimal) -> ExecutionResult<EntryOutcome> {
        if signal.entry_order.is_some() {
            return Ok(EntryOutcome::AlreadyEntered);
        }
        if signal.identity().trade_type() != TradeType::Buy {
            return Ok(EntryOutcome::Skipped("현물 롱 전용"));
        }
        if !signal.is_signal_on || signal.is_position_exited {
            return Ok(EntryOutcome::Skipped("비활성 시그널"));
        }

        let identity = signal.identity();
        let pair = signal.coin_pair();
        let rules = self.exchange.symbol_rules(pair).await?;

        // 1. 진입 주문
        let entry_id = client_order_id(identity, OrderRole::Entry);
        let entry = match self.exchange.find_order_by_client_id(pair, &entry_id).await? {
            Some(existing) => {
                info!(pair, order_id = %existing.order_id, "기존 진입 주문 발견");
                existing
            }
            None => {
                let min_value = min_entry_value_usd(
                    rules.min_notional,
                    rules.step_decimals,
                    self.config.stop_loss_percent,
                    current_price,
                )?;
                let quote = round_up(min_value.max(self.config.quote_amount), QUOTE_DECIMALS);
                debug!(pair, %min_value, %quote, "진입 금액 계산");

                let request = MarketOrderRequest {
                    pair: pair.to_string(),
                    side: Side::Buy,
                    amount: OrderAmount::Quote(quote),
                    client_order_id: Some(entry_id),
                };
                self.exchange.place_market_order(&request).await?
            }
        };

        if entry.executed_qty <= Decimal::ZERO {
            warn!(pair, order_id = %entry.order_id, status = %entry.status, "진입 주문 미체결");
            return Ok(EntryOutcome::Unfilled(entry));
        }

        // 2. 보호 주문
        let plan = plan_protective_order(&entry, &rules, self.config.stop_loss_percent);
        if plan.quantity <= Decimal::ZERO {
            return Err(ExecutionError::ZeroProtectiveQuantity {
                pair: pair.to_string(),
                executed_qty: entry.executed_qty,
            });
        }

        let stop_id = client_order_id(identity, OrderRole::Protective);
        let protective = match self.exchange.find_order_by_client_id(pair, &stop_id).await? {
            Some(existing) => existing,
            None => {
                let request = StopLimitOrderRequest {
                    pair: pair.to_string(),
                    side: Side::Sell,
                    quantity: plan.quantity,
                    stop_price: plan.stop_price,
                    limit_price: plan.limit_price,
                    client_order_id: Some(stop_id),
                };
                self.exchange.place_stop_limit_order(&request).await?
            }
        };

        // 청산 수량 계산 기준은 실제 보유 수량
        let held = Order {
            executed_qty: plan.quantity,
            ..entry
        };
        self.store.record_entry(identity, &held, &protective).await?;

        info!(
            pair,
            entry_id = %held.order_id,
            quantity = %held.executed_qty,
            avg_price = %held.avg_price,
            stop_price = %plan.stop_price,
            protective_id = %protective.order_id,
            "진입 완료"
        );
        Ok(EntryOutcome::Entered {
            entry: held,
            protective,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trader_core::OrderStatus;

    #[test]
    fn test_plan_protective_order() {
        let entry = Order::new("1", dec!(0.2), dec!(100), OrderStatus::Filled);
        let rules = SymbolRules {
            pair: "ETHUSDT".to_string(),
            min_notional: dec!(10),
            step_decimals: 3,
            tick_decimals: 2,
        };
        let plan = plan_protective_order(&entry, &rules, dec!(5));
        assert_eq!(plan.quantity, dec!(0.199));
        assert_eq!(plan.stop_price, dec!(95));
        assert_eq!(plan.limit_price, dec!(94.52));
    }
}
