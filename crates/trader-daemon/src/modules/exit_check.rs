//! 포지션 청산 확인 모듈.
//!
//! 열린 포지션마다 청산 조건을 평가하고, 조건이 맞으면 청산 정리기를 실행합니다.
//! 조건이 없으면 보호 주문 체결(손절) 여부만 확인해 기록합니다.

use std::time::Instant;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};
use trader_core::{evaluate_exit, ExitReason, Signal, SignalIdentity};
use trader_execution::ExitOutcome;

use super::utils::latest_price;
use crate::app::App;
use crate::error::DaemonError;
use crate::{Result, WorkflowStats};

/// 열린 포지션 청산 확인.
///
/// 시그널 하나의 실패는 기록만 하고 나머지 시그널 처리를 계속합니다.
pub async fn check_exits(app: &App) -> Result<WorkflowStats> {
    let start = Instant::now();
    let mut stats = WorkflowStats::new();

    let positions: Vec<Signal> = app
        .store
        .open_signals()
        .await?
        .into_iter()
        .filter(Signal::has_open_position)
        .collect();
    stats.total = positions.len();

    for signal in &positions {
        match check_one(app, signal).await {
            Ok(true) => stats.success += 1,
            Ok(false) => stats.skipped += 1,
            Err(e) => {
                stats.errors += 1;
                error!(signal = %signal.identity(), error = %e, "청산 확인 실패");
            }
        }
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}

/// 시그널 하나 처리. 기록이 발생하면 `true`.
async fn check_one(app: &App, signal: &Signal) -> Result<bool> {
    let price = latest_price(
        app.exchange.as_ref(),
        signal.coin_pair(),
        &app.config.trading.candle_interval,
    )
    .await?;

    let Some(reason) = evaluate_exit(signal, price, app.clock.now()) else {
        return sync_protective_fill(app, signal).await;
    };

    if !app.config.trading.enabled {
        warn!(signal = %signal.identity(), %reason, "매매 비활성화 상태, 청산 건너뜀");
        return Ok(false);
    }

    info!(signal = %signal.identity(), %reason, %price, "청산 조건 충족");
    let outcome = app.exit_reconciler().reconcile(signal, reason, price).await?;
    Ok(log_outcome(signal, &outcome))
}

/// 보호 주문이 체결되었으면 손절 청산으로 기록.
async fn sync_protective_fill(app: &App, signal: &Signal) -> Result<bool> {
    let Some(protective) = &signal.exit_stop_limit_order else {
        return Ok(false);
    };
    let live = app
        .exchange
        .order_status(signal.coin_pair(), &protective.order_id)
        .await?;
    if !live.status.is_filled() {
        debug!(signal = %signal.identity(), status = %live.status, "청산 조건 없음");
        return Ok(false);
    }

    app.store
        .update_protective_order(signal.identity(), &live)
        .await?;
    info!(
        signal = %signal.identity(),
        order_id = %live.order_id,
        avg_price = %live.avg_price,
        "보호 주문 체결, 손절 청산 기록"
    );
    Ok(true)
}

/// 수동 강제 청산.
pub async fn force_exit(app: &App, identity: &SignalIdentity) -> Result<ExitOutcome> {
    let signal = app
        .store
        .get_signal(identity)
        .await?
        .ok_or_else(|| DaemonError::SignalNotFound(identity.to_string()))?;

    let price = latest_price(
        app.exchange.as_ref(),
        signal.coin_pair(),
        &app.config.trading.candle_interval,
    )
    .await?;

    info!(signal = %identity, %price, "강제 청산 요청");
    let outcome = app
        .exit_reconciler()
        .reconcile(&signal, ExitReason::ForcedExit, price)
        .await?;
    log_outcome(&signal, &outcome);
    Ok(outcome)
}

fn log_outcome(signal: &Signal, outcome: &ExitOutcome) -> bool {
    let identity = signal.identity();
    match outcome {
        ExitOutcome::Exited(order) | ExitOutcome::Recovered(order) => {
            info!(
                signal = %identity,
                order_id = %order.order_id,
                quantity = %order.executed_qty,
                profit_percent = ?realized(signal, order.avg_price),
                "시장가 청산 완료"
            );
            true
        }
        ExitOutcome::ClosedByProtective(order) => {
            info!(signal = %identity, order_id = %order.order_id, "보호 주문으로 이미 청산됨");
            true
        }
        ExitOutcome::NothingToExit => {
            info!(signal = %identity, "청산할 수량 없음, 청산 완료 처리");
            true
        }
        ExitOutcome::InsufficientBalance {
            required,
            available,
        } => {
            warn!(signal = %identity, %required, %available, "잔고 부족으로 청산 보류");
            false
        }
        ExitOutcome::Indeterminate(reason) => {
            warn!(signal = %identity, reason = %reason, "청산 결과 불명, 다음 주기에 재확인");
            false
        }
        ExitOutcome::AlreadyExited | ExitOutcome::NotEntered => false,
    }
}

/// 진입 평균가 대비 청산가 수익률 (%).
fn realized(signal: &Signal, exit_price: Decimal) -> Option<Decimal> {
    let entry = signal.entry_order.as_ref()?;
    if entry.avg_price.is_zero() {
        return None;
    }
    Some(((exit_price - entry.avg_price) / entry.avg_price * Decimal::ONE_HUNDRED).round_dp(2))
}
