//! 주문 실행 및 포지션 청산 정리.
//!
//! 이 crate는 다음을 제공합니다:
//! - 최소 주문 금액을 만족하는 진입 주문과 보호용 스탑 리밋 주문 실행
//! - 보호 주문 상태에 따른 포지션 청산 정리 (부분 체결 포함)
//! - 중복 주문 방지용 결정적 클라이언트 주문 ID
//!
//! # 예제
//!
//! ```rust,ignore
//! use trader_execution::PositionExitReconciler;
//!
//! let reconciler = PositionExitReconciler::new(exchange, store, notifier);
//! let outcome = reconciler
//!     .reconcile(&signal, ExitReason::TargetTimePassed, current_price)
//!     .await?;
//! ```

pub mod client_order_id;
pub mod entry_executor;
pub mod error;
pub mod exit_reconciler;

pub use client_order_id::{client_order_id, OrderRole};
pub use entry_executor::{
    plan_protective_order, EntryConfig, EntryExecutor, EntryOutcome, ProtectiveOrderPlan,
};
pub use error::{ExecutionError, ExecutionResult};
pub use exit_reconciler::{ExitOutcome, PositionExitReconciler};
