//! 포지션 청산 정리.
//!
//! 진입한 포지션을 보호 주문 상태에 맞춰 정리합니다.
//!
//! # 처리 순서
//!
//! ```text
//! 저장된 시그널 재조회
//!     │
//!     ▼
//! 청산 완료? ──예──▶ 종료 (거래소 호출 없음)
//!     │
//!     ▼
//! 보호 주문 상태 조회
//!     ├── FILLED ──────────▶ 스냅샷 저장, 종료 (손절 청산)
//!     ├── NEW / PARTIALLY ─▶ 취소 → 취소 결과 저장
//!     └── 비활성 ──────────▶ 스냅샷 저장
//!     │
//!     ▼
//! 청산 수량 = 진입 체결 - 보호 주문 체결
//!     ├── 0 ───────────────▶ 청산 완료 표시
//!     ▼
//! 기존 청산 주문 조회 (클라이언트 ID) ──있음──▶ 현재가로 기록
//!     ▼
//! 잔고 확인 ──부족──▶ 알림 1회, 기록 없음
//!     ▼
//! 시장가 매도 → 청산 주문 저장
//! ```
//!
//! 각 저장은 독립된 쓰기이므로 중간에 중단되면 다음 주기에 다시 실행합니다.
//! 다시 실행해도 보호 주문 상태와 클라이언트 주문 ID로 같은 지점부터 이어집니다.
//! 청산 완료 표시는 저장소에서 한 번만 성공하며, 늦은 쓰기는 `AlreadyExited`로 끝납니다.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use trader_core::{
    base_asset_of, ExitReason, MarketOrderRequest, Notifier, Order, OrderAmount, Side, Signal,
    SignalStore, SpotExchange, StoreError,
};

use crate::client_order_id::{client_order_id, OrderRole};
use crate::error::{ExecutionError, ExecutionResult};

/// 청산 정리 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitOutcome {
    /// 이미 청산 완료된 시그널
    AlreadyExited,
    /// 진입 체결이 없는 시그널
    NotEntered,
    /// 보호 주문이 이미 전량 체결됨
    ClosedByProtective(Order),
    /// 청산할 수량이 남아 있지 않아 청산 완료로 표시
    NothingToExit,
    /// 이전 주기에 접수된 청산 주문을 찾아 기록
    Recovered(Order),
    /// 시장가 청산 주문 체결
    Exited(Order),
    /// 잔고 부족으로 청산하지 않음 (운영자 알림 발송)
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },
    /// 거래소 처리 결과 불명 (다음 주기에 재확인)
    Indeterminate(String),
}

/// 포지션 청산 정리기.
pub struct PositionExitReconciler {
    exchange: Arc<dyn SpotExchange>,
    store: Arc<dyn SignalStore>,
    notifier: Arc<dyn Notifier>,
}

impl PositionExitReconciler {
    pub fn new(
        exchange: Arc<dyn SpotExchange>,
        store: Arc<dyn SignalStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            exchange,
            store,
            notifier,
        }
    }

    /// 시그널 포지션 청산 정리.
    ///
    /// 전달된 시그널은 식별자로만 쓰고, 진행 여부는 저장소에서 다시 읽은 상태로 판단합니다.
    /// `current_price`는 청산 주문의 기록 가격으로 저장됩니다.
    ///
    /// # Errors
    ///
    /// 거래소 거부와 저장소 실패는 에러로 반환합니다. 결과 불명 응답은
    /// `ExitOutcome::Indeterminate`이며 해당 단계는 아무것도 저장하지 않습니다.
    pub async fn reconcile(
        &self,
        signal: &Signal,
        reason: ExitReason,
        current_price: Decimal,
    ) -> ExecutionResult<ExitOutcome> {
        match self.run(signal, reason, current_price).await {
            Err(ExecutionError::Exchange(e)) if e.is_indeterminate() => {
                warn!(
                    signal = %signal.identity(),
                    error = %e,
                    "청산 처리 결과 불명, 다음 주기에 재확인"
                );
                Ok(ExitOutcome::Indeterminate(e.to_string()))
            }
            Err(ExecutionError::Store(StoreError::AlreadyExited(id))) => {
                warn!(signal = %id, "다른 작업이 먼저 청산을 기록함");
                Ok(ExitOutcome::AlreadyExited)
            }
            other => other,
        }
    }

    async fn run(
        &self,
        signal: &Signal,
        reason: ExitReason,
        current_price: Decimal,
    ) -> ExecutionResult<ExitOutcome> {
        let signal = self
            .store
            .get_signal(signal.identity())
            .await?
            .ok_or_else(|| StoreError::NotFound(signal.identity().to_string()))?;
        if signal.is_position_exited {
            debug!(signal = %signal.identity(), "이미 청산된 시그널");
            return Ok(ExitOutcome::AlreadyExited);
        }
        let Some(entry) = signal
            .entry_order
            .as_ref()
            .filter(|o| o.executed_qty > Decimal::ZERO)
        else {
            return Ok(ExitOutcome::NotEntered);
        };

        let identity = signal.identity();
        let pair = signal.coin_pair();
        let protective = signal
            .exit_stop_limit_order
            .as_ref()
            .ok_or_else(|| ExecutionError::MissingProtectiveOrder(identity.to_string()))?;

        // 1. 보호 주문 상태
        let live = self
            .exchange
            .order_status(pair, &protective.order_id)
            .await?;

        if live.status.is_filled() {
            self.store.update_protective_order(identity, &live).await?;
            info!(
                pair,
                order_id = %live.order_id,
                executed_qty = %live.executed_qty,
                "보호 주문 전량 체결, 추가 청산 없음"
            );
            return Ok(ExitOutcome::ClosedByProtective(live));
        }

        if live.status.is_open() {
            let cancel = self.exchange.cancel_order(pair, &live.order_id).await?;
            self.store.record_cancellation(identity, &cancel).await?;
            info!(pair, order_id = %cancel.order_id, status = %cancel.status, "보호 주문 취소");
        } else {
            debug!(pair, status = %live.status, "보호 주문 이미 비활성, 취소 생략");
            self.store.update_protective_order(identity, &live).await?;
        }

        // 2. 청산 수량
        let quantity = entry.executed_qty - live.executed_qty;
        if quantity <= Decimal::ZERO {
            self.store.mark_position_exited(identity, reason).await?;
            info!(pair, %reason, "청산할 수량 없음, 청산 완료로 표시");
            return Ok(ExitOutcome::NothingToExit);
        }

        // 3. 이전 주기의 청산 주문
        let exit_id = client_order_id(identity, OrderRole::Exit);
        if let Some(existing) = self
            .exchange
            .find_order_by_client_id(pair, &exit_id)
            .await?
        {
            let recorded = Order::new(
                existing.order_id,
                existing.executed_qty,
                current_price,
                existing.status,
            );
            self.store
                .record_exit_order(identity, &recorded, reason)
                .await?;
            info!(pair, order_id = %recorded.order_id, "기존 청산 주문 발견, 기록");
            return Ok(ExitOutcome::Recovered(recorded));
        }

        // 4. 잔고 확인
        let base = base_asset_of(pair).ok_or_else(|| ExecutionError::InvalidPair(pair.to_string()))?;
        let balances = self.exchange.account_balances().await?;
        let available = balances.get(base).map(|b| b.free).unwrap_or(Decimal::ZERO);

        if available < quantity {
            warn!(
                pair,
                required = %quantity,
                available = %available,
                "청산 수량보다 잔고가 적음, 청산 보류"
            );
            self.notifier
                .alert(
                    &format!("{pair} 청산 잔고 부족"),
                    &format!(
                        "{pair} 포지션 청산 불가: 필요 {quantity} {base}, 사용 가능 {available} {base}\n\
                         시그널: {identity}\n사유: {reason}"
                    ),
                )
                .await;
            return Ok(ExitOutcome::InsufficientBalance {
                required: quantity,
                available,
            });
        }

        // 5. 시장가 청산
        let request = MarketOrderRequest {
            pair: pair.to_string(),
            side: Side::Sell,
            amount: OrderAmount::Base(quantity),
            client_order_id: Some(exit_id),
        };
        let filled = self.exchange.place_market_order(&request).await?;
        let recorded = Order::new(
            filled.order_id,
            filled.executed_qty,
            current_price,
            filled.status,
        );
        self.store
            .record_exit_order(identity, &recorded, reason)
            .await?;

        info!(
            pair,
            order_id = %recorded.order_id,
            quantity = %recorded.executed_qty,
            price = %current_price,
            %reason,
            "포지션 청산 완료"
        );
        Ok(ExitOutcome::Exited(recorded))
    }
}
