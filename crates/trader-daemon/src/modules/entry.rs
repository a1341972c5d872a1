//! 신규 시그널 진입 모듈.

use std::time::Instant;

use tracing::{debug, error, info, warn};
use trader_core::{Signal, TradeType};
use trader_execution::EntryOutcome;

use super::utils::latest_price;
use crate::app::App;
use crate::{Result, WorkflowStats};

/// 진입 대상 시그널인지 확인.
///
/// 활성 BUY 시그널이고, 진입 기록이 없고, 목표 시각이 아직 지나지 않아야 합니다.
fn is_entry_candidate(app: &App, signal: &Signal) -> bool {
    let now = app.clock.now();
    signal.is_signal_on
        && !signal.is_position_exited
        && signal.entry_order.is_none()
        && signal.identity().trade_type() == TradeType::Buy
        && !signal.price_target_time.is_some_and(|deadline| deadline <= now)
        && app.config.trading.allows_pair(signal.coin_pair())
}

/// 진입하지 않은 활성 시그널 진입.
pub async fn enter_signals(app: &App) -> Result<WorkflowStats> {
    let start = Instant::now();
    let mut stats = WorkflowStats::new();

    let candidates: Vec<Signal> = app
        .store
        .open_signals()
        .await?
        .into_iter()
        .filter(|s| is_entry_candidate(app, s))
        .collect();
    stats.total = candidates.len();

    if !app.config.trading.enabled {
        if !candidates.is_empty() {
            info!(count = candidates.len(), "매매 비활성화 상태, 진입 건너뜀");
        }
        stats.skipped = candidates.len();
        stats.elapsed = start.elapsed();
        return Ok(stats);
    }

    let executor = app.entry_executor();
    for signal in &candidates {
        let pair = signal.coin_pair();
        let price = match latest_price(
            app.exchange.as_ref(),
            pair,
            &app.config.trading.candle_interval,
        )
        .await
        {
            Ok(price) => price,
            Err(e) => {
                stats.errors += 1;
                error!(pair, error = %e, "가격 조회 실패");
                continue;
            }
        };

        match executor.enter(signal, price).await {
            Ok(EntryOutcome::Entered { entry, protective }) => {
                stats.success += 1;
                info!(
                    signal = %signal.identity(),
                    entry_id = %entry.order_id,
                    quantity = %entry.executed_qty,
                    avg_price = %entry.avg_price,
                    stop_id = %protective.order_id,
                    "진입 완료"
                );
            }
            Ok(EntryOutcome::Unfilled(order)) => {
                stats.skipped += 1;
                warn!(signal = %signal.identity(), order_id = %order.order_id, "진입 주문 미체결");
            }
            Ok(outcome) => {
                stats.skipped += 1;
                debug!(signal = %signal.identity(), ?outcome, "진입 건너뜀");
            }
            Err(e) => {
                stats.errors += 1;
                error!(signal = %signal.identity(), error = %e, "진입 실패");
            }
        }
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}
