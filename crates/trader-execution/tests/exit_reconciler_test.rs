//! 포지션 청산 정리 통합 테스트.
//!
//! Mock 거래소, 인메모리 저장소, 알림 기록기로 협력자 호출 순서와 저장 내용을 검증합니다.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_core::{
    CancelResult, ExitReason, Order, OrderAmount, OrderStatus, ProviderError, Side, Signal,
    SignalIdentity, SignalStore, StoreError, TradeType,
};
use trader_data::{InMemorySignalStore, StoreWrite};
use trader_exchange::{ExchangeCall, MockSpotExchange};
use trader_execution::{
    client_order_id, ExecutionError, ExitOutcome, OrderRole, PositionExitReconciler,
};
use trader_notification::RecordingNotifier;

const PAIR: &str = "BTCUSDT";

fn identity() -> SignalIdentity {
    SignalIdentity::new(
        PAIR,
        "4h",
        TradeType::Buy,
        "Ascending Triangle",
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
    )
    .unwrap()
}

fn entered_signal(entry_qty: Decimal, protective: &Order) -> Signal {
    let mut signal = Signal::new(identity(), dec!(100));
    signal.entry_order = Some(Order::new("E1", entry_qty, dec!(100), OrderStatus::Filled));
    signal.exit_stop_limit_order = Some(protective.clone());
    signal
}

struct Fixture {
    exchange: Arc<MockSpotExchange>,
    store: Arc<InMemorySignalStore>,
    notifier: Arc<RecordingNotifier>,
    reconciler: PositionExitReconciler,
}

fn fixture(exchange: MockSpotExchange, signal: Signal) -> Fixture {
    let exchange = Arc::new(exchange);
    let store = Arc::new(InMemorySignalStore::with_signals(vec![signal]));
    let notifier = Arc::new(RecordingNotifier::new());
    let reconciler = PositionExitReconciler::new(exchange.clone(), store.clone(), notifier.clone());
    Fixture {
        exchange,
        store,
        notifier,
        reconciler,
    }
}

impl Fixture {
    async fn stored(&self) -> Signal {
        self.store.get_signal(&identity()).await.unwrap().unwrap()
    }
}

#[tokio::test]
async fn partial_fill_cancels_and_sells_remainder() {
    let protective = Order::new("P1", dec!(5), dec!(95), OrderStatus::PartiallyFilled);
    let exchange = MockSpotExchange::new()
        .with_order(protective.clone())
        .with_balance("BTC", dec!(20));
    let fx = fixture(exchange, entered_signal(dec!(10), &protective));

    let outcome = fx
        .reconciler
        .reconcile(&fx.stored().await, ExitReason::TargetTimePassed, dec!(110))
        .await
        .unwrap();

    let order = match outcome {
        ExitOutcome::Exited(order) => order,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(order.executed_qty, dec!(5));
    assert_eq!(order.avg_price, dec!(110));

    let calls = fx.exchange.calls().await;
    assert_eq!(calls.len(), 5);
    assert!(matches!(calls[0], ExchangeCall::OrderStatus { .. }));
    assert!(matches!(calls[1], ExchangeCall::CancelOrder { .. }));
    assert!(matches!(calls[2], ExchangeCall::FindOrderByClientId { .. }));
    assert!(matches!(calls[3], ExchangeCall::AccountBalances));
    let ExchangeCall::MarketOrder(request) = &calls[4] else {
        panic!("expected market order, got {:?}", calls[4]);
    };
    assert_eq!(request.side, Side::Sell);
    assert_eq!(request.amount, OrderAmount::Base(dec!(5)));
    assert_eq!(
        request.client_order_id.as_deref(),
        Some(client_order_id(&identity(), OrderRole::Exit).as_str())
    );

    let writes = fx.store.writes().await;
    assert_eq!(
        writes,
        vec![
            StoreWrite::Cancellation(
                identity(),
                CancelResult {
                    order_id: "P1".to_string(),
                    status: OrderStatus::Canceled,
                }
            ),
            StoreWrite::ExitOrder(identity(), order, ExitReason::TargetTimePassed),
        ]
    );

    let saved = fx.stored().await;
    assert!(saved.is_position_exited);
    assert_eq!(saved.exit_reason, Some(ExitReason::TargetTimePassed));
    assert_eq!(fx.notifier.count().await, 0);
}

#[tokio::test]
async fn exited_signal_makes_no_calls() {
    let protective = Order::new("P1", dec!(0), dec!(0), OrderStatus::New);
    let exchange = MockSpotExchange::new()
        .with_order(protective.clone())
        .with_balance("BTC", dec!(10));
    let fx = fixture(exchange, entered_signal(dec!(10), &protective));

    fx.reconciler
        .reconcile(&fx.stored().await, ExitReason::ProfitTargetMet, dec!(120))
        .await
        .unwrap();
    let calls_after_first = fx.exchange.calls().await.len();
    let writes_after_first = fx.store.writes().await.len();

    let outcome = fx
        .reconciler
        .reconcile(&fx.stored().await, ExitReason::ProfitTargetMet, dec!(120))
        .await
        .unwrap();

    assert_eq!(outcome, ExitOutcome::AlreadyExited);
    assert_eq!(fx.exchange.calls().await.len(), calls_after_first);
    assert_eq!(fx.store.writes().await.len(), writes_after_first);
}

#[tokio::test]
async fn insufficient_balance_alerts_once_and_records_no_exit() {
    let protective = Order::new("P1", dec!(0), dec!(0), OrderStatus::New);
    let exchange = MockSpotExchange::new()
        .with_order(protective.clone())
        .with_balance("BTC", dec!(9));
    let fx = fixture(exchange, entered_signal(dec!(10), &protective));

    let outcome = fx
        .reconciler
        .reconcile(&fx.stored().await, ExitReason::RemovedFromSource, dec!(100))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ExitOutcome::InsufficientBalance {
            required: dec!(10),
            available: dec!(9),
        }
    );
    assert!(fx.exchange.market_orders().await.is_empty());

    let alerts = fx.notifier.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].subject.contains(PAIR));
    assert!(alerts[0].body.contains("10"));
    assert!(alerts[0].body.contains("9"));

    let writes = fx.store.writes().await;
    assert!(!writes
        .iter()
        .any(|w| matches!(w, StoreWrite::ExitOrder(..) | StoreWrite::Exited(..))));
    let saved = fx.stored().await;
    assert!(!saved.is_position_exited);
    assert!(saved.exit_order.is_none());
}

#[tokio::test]
async fn missing_base_asset_counts_as_zero_balance() {
    let protective = Order::new("P1", dec!(0), dec!(0), OrderStatus::New);
    let exchange = MockSpotExchange::new().with_order(protective.clone());
    let fx = fixture(exchange, entered_signal(dec!(1), &protective));

    let outcome = fx
        .reconciler
        .reconcile(&fx.stored().await, ExitReason::ForcedExit, dec!(100))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        ExitOutcome::InsufficientBalance { available, .. } if available == Decimal::ZERO
    ));
    assert_eq!(fx.notifier.count().await, 1);
}

#[tokio::test]
async fn filled_protective_order_closes_position_without_orders() {
    let recorded = Order::new("P1", dec!(0), dec!(0), OrderStatus::New);
    let filled = Order::new("P1", dec!(10), dec!(95), OrderStatus::Filled);
    let exchange = MockSpotExchange::new().with_order(filled.clone());
    let fx = fixture(exchange, entered_signal(dec!(10), &recorded));

    let outcome = fx
        .reconciler
        .reconcile(&fx.stored().await, ExitReason::TargetTimePassed, dec!(90))
        .await
        .unwrap();

    assert_eq!(outcome, ExitOutcome::ClosedByProtective(filled.clone()));
    assert_eq!(fx.exchange.cancel_count().await, 0);
    assert!(fx.exchange.market_orders().await.is_empty());
    assert_eq!(
        fx.store.writes().await,
        vec![StoreWrite::ProtectiveUpdated(identity(), filled)]
    );

    let saved = fx.stored().await;
    assert!(saved.is_position_exited);
    assert_eq!(saved.exit_reason, Some(ExitReason::StopLoss));
}

#[tokio::test]
async fn cancellation_is_recorded_even_if_reported_filled() {
    let protective = Order::new("P1", dec!(2), dec!(95), OrderStatus::PartiallyFilled);
    let exchange = MockSpotExchange::new()
        .with_order(protective.clone())
        .with_cancel_status(OrderStatus::Filled)
        .with_balance("BTC", dec!(8));
    let fx = fixture(exchange, entered_signal(dec!(10), &protective));

    let outcome = fx
        .reconciler
        .reconcile(&fx.stored().await, ExitReason::TargetTimePassed, dec!(100))
        .await
        .unwrap();

    assert!(matches!(outcome, ExitOutcome::Exited(_)));
    let writes = fx.store.writes().await;
    assert!(matches!(
        &writes[0],
        StoreWrite::Cancellation(_, CancelResult { status: OrderStatus::Filled, .. })
    ));
}

#[tokio::test]
async fn inactive_protective_order_skips_cancel() {
    let recorded = Order::new("P1", dec!(3), dec!(95), OrderStatus::PartiallyFilled);
    let expired = Order::new("P1", dec!(3), dec!(95), OrderStatus::Expired);
    let exchange = MockSpotExchange::new()
        .with_order(expired.clone())
        .with_balance("BTC", dec!(7));
    let fx = fixture(exchange, entered_signal(dec!(10), &recorded));

    let outcome = fx
        .reconciler
        .reconcile(&fx.stored().await, ExitReason::TargetTimePassed, dec!(100))
        .await
        .unwrap();

    assert!(matches!(outcome, ExitOutcome::Exited(ref o) if o.executed_qty == dec!(7)));
    assert_eq!(fx.exchange.cancel_count().await, 0);
    assert_eq!(
        fx.store.writes().await[0],
        StoreWrite::ProtectiveUpdated(identity(), expired)
    );
}

#[tokio::test]
async fn nothing_left_to_exit_marks_position_exited() {
    let canceled = Order::new("P1", dec!(10), dec!(95), OrderStatus::Canceled);
    let exchange = MockSpotExchange::new().with_order(canceled.clone());
    let fx = fixture(exchange, entered_signal(dec!(10), &canceled));

    let outcome = fx
        .reconciler
        .reconcile(&fx.stored().await, ExitReason::RemovedFromSource, dec!(100))
        .await
        .unwrap();

    assert_eq!(outcome, ExitOutcome::NothingToExit);
    assert!(fx.exchange.market_orders().await.is_empty());
    assert_eq!(
        fx.store.writes().await.last(),
        Some(&StoreWrite::Exited(identity(), ExitReason::RemovedFromSource))
    );
    assert!(fx.stored().await.is_position_exited);
}

#[tokio::test]
async fn indeterminate_market_order_is_not_an_error() {
    let protective = Order::new("P1", dec!(0), dec!(0), OrderStatus::New);
    let exchange = MockSpotExchange::new()
        .with_order(protective.clone())
        .with_balance("BTC", dec!(10))
        .fail_next_market_order(ProviderError::Indeterminate("HTTP 503".to_string()));
    let fx = fixture(exchange, entered_signal(dec!(10), &protective));

    let outcome = fx
        .reconciler
        .reconcile(&fx.stored().await, ExitReason::TargetTimePassed, dec!(100))
        .await
        .unwrap();

    assert!(matches!(outcome, ExitOutcome::Indeterminate(_)));
    let saved = fx.stored().await;
    assert!(!saved.is_position_exited);
    assert!(saved.exit_order.is_none());

    // 다음 주기: 보호 주문은 이미 취소 상태
    let outcome = fx
        .reconciler
        .reconcile(&saved, ExitReason::TargetTimePassed, dec!(100))
        .await
        .unwrap();
    assert!(matches!(outcome, ExitOutcome::Exited(_)));
    assert_eq!(fx.exchange.cancel_count().await, 1);
    assert_eq!(fx.exchange.market_orders().await.len(), 2);
}

#[tokio::test]
async fn exit_order_from_previous_run_is_recovered() {
    let canceled = Order::new("P1", dec!(0), dec!(0), OrderStatus::Canceled);
    let previous = Order::new("X9", dec!(10), dec!(101), OrderStatus::Filled);
    let exchange = MockSpotExchange::new()
        .with_order(canceled.clone())
        .with_client_order(&client_order_id(&identity(), OrderRole::Exit), previous.clone())
        .with_balance("BTC", dec!(0));
    let fx = fixture(exchange, entered_signal(dec!(10), &canceled));

    let outcome = fx
        .reconciler
        .reconcile(&fx.stored().await, ExitReason::TargetTimePassed, dec!(100))
        .await
        .unwrap();

    let recorded = Order::new("X9", dec!(10), dec!(100), OrderStatus::Filled);
    assert_eq!(outcome, ExitOutcome::Recovered(recorded.clone()));
    assert!(fx.exchange.market_orders().await.is_empty());
    assert_eq!(fx.notifier.count().await, 0);
    assert_eq!(fx.stored().await.exit_order, Some(recorded));
}

#[tokio::test]
async fn stale_snapshot_does_not_exit_twice() {
    let protective = Order::new("P1", dec!(0), dec!(0), OrderStatus::New);
    let exchange = MockSpotExchange::new()
        .with_order(protective.clone())
        .with_balance("BTC", dec!(10));
    let fx = fixture(exchange, entered_signal(dec!(10), &protective));
    let snapshot = fx.stored().await;

    let first = fx
        .reconciler
        .reconcile(&snapshot, ExitReason::ProfitTargetMet, dec!(120))
        .await
        .unwrap();
    assert!(matches!(first, ExitOutcome::Exited(_)));
    let calls_after_first = fx.exchange.calls().await.len();
    let writes_after_first = fx.store.writes().await.len();

    // 청산 전 스냅샷으로 다시 호출 (동시에 실행된 강제 청산)
    let second = fx
        .reconciler
        .reconcile(&snapshot, ExitReason::ForcedExit, dec!(1))
        .await
        .unwrap();

    assert_eq!(second, ExitOutcome::AlreadyExited);
    assert_eq!(fx.exchange.calls().await.len(), calls_after_first);
    assert_eq!(fx.store.writes().await.len(), writes_after_first);

    let saved = fx.stored().await;
    assert_eq!(saved.exit_reason, Some(ExitReason::ProfitTargetMet));
    assert_eq!(saved.exit_order.map(|o| o.avg_price), Some(dec!(120)));
}

#[tokio::test]
async fn exit_recorded_elsewhere_during_run_is_already_exited() {
    let canceled = Order::new("P1", dec!(0), dec!(0), OrderStatus::Canceled);
    let exchange = MockSpotExchange::new()
        .with_order(canceled.clone())
        .with_balance("BTC", dec!(10));
    let fx = fixture(exchange, entered_signal(dec!(10), &canceled));
    let snapshot = fx.stored().await;

    // 이 실행의 조회 이후 다른 작업이 청산을 기록한 상황
    fx.store
        .mark_position_exited(&identity(), ExitReason::ForcedExit)
        .await
        .unwrap();
    let err = fx
        .store
        .record_exit_order(
            &identity(),
            &Order::new("X1", dec!(10), dec!(100), OrderStatus::Filled),
            ExitReason::TargetTimePassed,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExited(_)));

    let outcome = fx
        .reconciler
        .reconcile(&snapshot, ExitReason::TargetTimePassed, dec!(100))
        .await
        .unwrap();
    assert_eq!(outcome, ExitOutcome::AlreadyExited);
    assert!(fx.exchange.calls().await.is_empty());
    assert_eq!(fx.stored().await.exit_reason, Some(ExitReason::ForcedExit));
}

#[tokio::test]
async fn cancel_rejection_propagates_without_writes() {
    let protective = Order::new("P1", dec!(0), dec!(0), OrderStatus::New);
    let exchange = MockSpotExchange::new()
        .with_order(protective.clone())
        .fail_next_cancel(ProviderError::Api {
            code: -2011,
            message: "Unknown order sent.".to_string(),
        });
    let fx = fixture(exchange, entered_signal(dec!(10), &protective));

    let err = fx
        .reconciler
        .reconcile(&fx.stored().await, ExitReason::TargetTimePassed, dec!(100))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExecutionError::Exchange(ProviderError::Api { code: -2011, .. })
    ));
    assert!(fx.store.writes().await.is_empty());
}

#[tokio::test]
async fn store_failure_is_fatal() {
    let protective = Order::new("P1", dec!(0), dec!(0), OrderStatus::New);
    let exchange = MockSpotExchange::new()
        .with_order(protective.clone())
        .with_balance("BTC", dec!(10));
    let fx = fixture(exchange, entered_signal(dec!(10), &protective));
    let signal = fx.stored().await;
    fx.store.fail_writes(true);

    let err = fx
        .reconciler
        .reconcile(&signal, ExitReason::TargetTimePassed, dec!(100))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::Store(StoreError::Database(_))));
    // 취소 기록 실패 후 청산 주문으로 진행하지 않음
    assert!(fx.exchange.market_orders().await.is_empty());
}

#[tokio::test]
async fn signal_without_entry_is_not_entered() {
    let fx = fixture(MockSpotExchange::new(), Signal::new(identity(), dec!(100)));

    let outcome = fx
        .reconciler
        .reconcile(&fx.stored().await, ExitReason::TargetTimePassed, dec!(100))
        .await
        .unwrap();

    assert_eq!(outcome, ExitOutcome::NotEntered);
    assert!(fx.exchange.calls().await.is_empty());
}

#[tokio::test]
async fn missing_protective_order_is_an_error() {
    let mut signal = Signal::new(identity(), dec!(100));
    signal.entry_order = Some(Order::new("E1", dec!(1), dec!(100), OrderStatus::Filled));
    let fx = fixture(MockSpotExchange::new(), signal);

    let err = fx
        .reconciler
        .reconcile(&fx.stored().await, ExitReason::TargetTimePassed, dec!(100))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::MissingProtectiveOrder(_)));
}
