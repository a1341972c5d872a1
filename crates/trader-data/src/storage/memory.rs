//! 인메모리 시그널 저장소.
//!
//! PostgreSQL 저장소와 같은 갱신 규칙을 따르며, 드라이런 모드와 테스트에서 사용합니다.
//! 모든 쓰기를 `StoreWrite`로 기록해 호출 순서를 검증할 수 있습니다.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use trader_core::{
    CancelResult, ExitReason, Order, Signal, SignalIdentity, SignalStore, StoreError,
};

/// 저장소 쓰기 기록.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    Inserted(SignalIdentity),
    SwitchedOff(SignalIdentity),
    Entry(SignalIdentity),
    ProtectiveUpdated(SignalIdentity, Order),
    Cancellation(SignalIdentity, CancelResult),
    ExitOrder(SignalIdentity, Order, ExitReason),
    Exited(SignalIdentity, ExitReason),
}

#[derive(Default)]
struct State {
    signals: Vec<Signal>,
    writes: Vec<StoreWrite>,
}

/// 인메모리 시그널 저장소.
#[derive(Default)]
pub struct InMemorySignalStore {
    state: RwLock<State>,
    fail_writes: AtomicBool,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 초기 시그널로 생성 (쓰기 기록에는 남지 않음).
    pub fn with_signals(signals: Vec<Signal>) -> Self {
        Self {
            state: RwLock::new(State {
                signals,
                writes: Vec::new(),
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// 이후 모든 쓰기를 DB 에러로 실패시킵니다.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 지금까지의 쓰기 기록.
    pub async fn writes(&self) -> Vec<StoreWrite> {
        self.state.read().await.writes.clone()
    }

    /// 저장된 시그널 수.
    pub async fn len(&self) -> usize {
        self.state.read().await.signals.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 대상 시그널을 찾아 갱신하고 쓰기를 기록합니다.
    async fn update<F>(
        &self,
        identity: &SignalIdentity,
        write: StoreWrite,
        apply: F,
    ) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Signal) -> Result<(), StoreError> + Send,
    {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("쓰기 실패 (테스트 주입)".to_string()));
        }

        let mut state = self.state.write().await;
        let signal = state
            .signals
            .iter_mut()
            .find(|s| s.identity() == identity)
            .ok_or_else(|| StoreError::NotFound(identity.to_string()))?;
        apply(signal)?;
        state.writes.push(write);
        Ok(())
    }
}

fn ensure_open(signal: &Signal) -> Result<(), StoreError> {
    if signal.is_position_exited {
        return Err(StoreError::AlreadyExited(signal.identity().to_string()));
    }
    Ok(())
}

#[async_trait]
impl SignalStore for InMemorySignalStore {
    async fn get_signal(&self, identity: &SignalIdentity) -> Result<Option<Signal>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .signals
            .iter()
            .find(|s| s.identity() == identity)
            .cloned())
    }

    async fn all_signals(&self) -> Result<Vec<Signal>, StoreError> {
        Ok(self.state.read().await.signals.clone())
    }

    async fn open_signals(&self) -> Result<Vec<Signal>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .signals
            .iter()
            .filter(|s| !s.is_position_exited)
            .cloned()
            .collect())
    }

    async fn insert_signals(&self, signals: &[Signal]) -> Result<u64, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("쓰기 실패 (테스트 주입)".to_string()));
        }

        let mut state = self.state.write().await;
        let mut inserted = 0;
        for signal in signals {
            if state.signals.iter().any(|s| s == signal) {
                continue;
            }
            state.signals.push(signal.clone());
            state
                .writes
                .push(StoreWrite::Inserted(signal.identity().clone()));
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn switch_off_signal(
        &self,
        identity: &SignalIdentity,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let reason = reason.to_string();
        self.update(identity, StoreWrite::SwitchedOff(identity.clone()), move |s| {
            s.is_signal_on = false;
            s.invalidation_reason = Some(reason);
            s.invalidated_at = Some(at);
            Ok(())
        })
        .await
    }

    async fn record_entry(
        &self,
        identity: &SignalIdentity,
        entry: &Order,
        protective: &Order,
    ) -> Result<(), StoreError> {
        let (entry, protective) = (entry.clone(), protective.clone());
        self.update(identity, StoreWrite::Entry(identity.clone()), move |s| {
            s.entry_order = Some(entry);
            s.exit_stop_limit_order = Some(protective);
            Ok(())
        })
        .await
    }

    async fn update_protective_order(
        &self,
        identity: &SignalIdentity,
        order: &Order,
    ) -> Result<(), StoreError> {
        let snapshot = order.clone();
        let write = StoreWrite::ProtectiveUpdated(identity.clone(), order.clone());
        self.update(identity, write, move |s| {
            if snapshot.status.is_filled() && !s.is_position_exited {
                s.is_position_exited = true;
                s.exit_reason = Some(ExitReason::StopLoss);
            }
            s.exit_stop_limit_order = Some(snapshot);
            Ok(())
        })
        .await
    }

    async fn record_cancellation(
        &self,
        identity: &SignalIdentity,
        result: &CancelResult,
    ) -> Result<(), StoreError> {
        let cancel = result.clone();
        let write = StoreWrite::Cancellation(identity.clone(), result.clone());
        let key = identity.to_string();
        self.update(identity, write, move |s| match s.exit_stop_limit_order.as_mut() {
            Some(order) if order.order_id == cancel.order_id => {
                order.status = cancel.status;
                Ok(())
            }
            _ => Err(StoreError::NotFound(format!("{key} 보호 주문 {}", cancel.order_id))),
        })
        .await
    }

    async fn record_exit_order(
        &self,
        identity: &SignalIdentity,
        order: &Order,
        reason: ExitReason,
    ) -> Result<(), StoreError> {
        let exit = order.clone();
        let write = StoreWrite::ExitOrder(identity.clone(), order.clone(), reason);
        self.update(identity, write, move |s| {
            ensure_open(s)?;
            s.exit_order = Some(exit);
            s.exit_reason = Some(reason);
            s.is_position_exited = true;
            Ok(())
        })
        .await
    }

    async fn mark_position_exited(
        &self,
        identity: &SignalIdentity,
        reason: ExitReason,
    ) -> Result<(), StoreError> {
        self.update(identity, StoreWrite::Exited(identity.clone(), reason), move |s| {
            ensure_open(s)?;
            s.exit_reason = Some(reason);
            s.is_position_exited = true;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use trader_core::{OrderStatus, TradeType};

    fn signal(pair: &str) -> Signal {
        let identity = SignalIdentity::new(
            pair,
            "1h",
            TradeType::Buy,
            "Flag",
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        )
        .unwrap();
        Signal::new(identity, dec!(100))
    }

    #[tokio::test]
    async fn test_insert_ignores_existing() {
        let store = InMemorySignalStore::new();
        assert_eq!(store.insert_signals(&[signal("BTCUSDT")]).await.unwrap(), 1);
        assert_eq!(
            store
                .insert_signals(&[signal("BTCUSDT"), signal("ETHUSDT")])
                .await
                .unwrap(),
            1
        );
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_filled_protective_closes_position() {
        let s = signal("BTCUSDT");
        let id = s.identity().clone();
        let store = InMemorySignalStore::with_signals(vec![s]);

        let entry = Order::new("1", dec!(10), dec!(100), OrderStatus::Filled);
        let protective = Order::new("2", dec!(0), dec!(0), OrderStatus::New);
        store.record_entry(&id, &entry, &protective).await.unwrap();
        assert_eq!(store.open_signals().await.unwrap().len(), 1);

        let filled = Order::new("2", dec!(10), dec!(95), OrderStatus::Filled);
        store.update_protective_order(&id, &filled).await.unwrap();

        let saved = store.get_signal(&id).await.unwrap().unwrap();
        assert!(saved.is_position_exited);
        assert_eq!(saved.exit_reason, Some(ExitReason::StopLoss));
        assert!(store.open_signals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exit_is_recorded_once() {
        let s = signal("BTCUSDT");
        let id = s.identity().clone();
        let store = InMemorySignalStore::with_signals(vec![s]);

        let exit = Order::new("3", dec!(10), dec!(120), OrderStatus::Filled);
        store
            .record_exit_order(&id, &exit, ExitReason::ProfitTargetMet)
            .await
            .unwrap();

        let late = Order::new("3", dec!(10), dec!(1), OrderStatus::Filled);
        let err = store
            .record_exit_order(&id, &late, ExitReason::ForcedExit)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExited(_)));
        let err = store
            .mark_position_exited(&id, ExitReason::ForcedExit)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExited(_)));

        // 청산 후 보호 주문 체결 스냅샷은 청산 사유를 바꾸지 않음
        let filled = Order::new("2", dec!(10), dec!(95), OrderStatus::Filled);
        store.update_protective_order(&id, &filled).await.unwrap();

        let saved = store.get_signal(&id).await.unwrap().unwrap();
        assert_eq!(saved.exit_order, Some(exit));
        assert_eq!(saved.exit_reason, Some(ExitReason::ProfitTargetMet));
        assert_eq!(store.writes().await.len(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_for_unknown_order_is_not_found() {
        let s = signal("BTCUSDT");
        let id = s.identity().clone();
        let store = InMemorySignalStore::with_signals(vec![s]);

        let result = CancelResult {
            order_id: "999".to_string(),
            status: OrderStatus::Canceled,
        };
        let err = store.record_cancellation(&id, &result).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let s = signal("BTCUSDT");
        let id = s.identity().clone();
        let store = InMemorySignalStore::with_signals(vec![s]);
        store.fail_writes(true);

        let err = store
            .mark_position_exited(&id, ExitReason::ForcedExit)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        assert!(!store.get_signal(&id).await.unwrap().unwrap().is_position_exited);
    }
}
