//! 지지/저항 레벨 스캔 모듈.

use rust_decimal::Decimal;
use tracing::{debug, error, info};
use trader_core::{classify, PriceLevels, PriceMovement};

use super::utils::last_two_closed;
use crate::app::App;
use crate::error::DaemonError;
use crate::Result;

/// 마감 캔들 2개를 확보하기 위한 조회 개수 (진행 중 캔들 포함).
const SCAN_CANDLE_LIMIT: u16 = 3;

/// 페어별 스캔 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelScan {
    pub pair: String,
    pub prev_close: Decimal,
    pub curr_close: Decimal,
    pub movement: PriceMovement,
}

/// 설정된 모든 페어의 가격 움직임 분류.
///
/// 레벨 돌파(저항 돌파, 지지 이탈)는 알림을 보냅니다.
/// 페어 하나의 실패는 기록만 하고 다음 페어로 넘어갑니다.
pub async fn scan_price_levels(app: &App) -> Result<Vec<LevelScan>> {
    let mut results = Vec::with_capacity(app.config.price_levels.len());

    for (pair, levels) in &app.config.price_levels {
        match scan_pair(app, pair, levels).await {
            Ok(scan) => {
                if scan.movement.state.is_breakout() {
                    alert_breakout(app, &scan).await;
                }
                results.push(scan);
            }
            Err(e) => error!(pair = %pair, error = %e, "레벨 스캔 실패"),
        }
    }

    info!(pairs = results.len(), "레벨 스캔 완료");
    Ok(results)
}

async fn scan_pair(app: &App, pair: &str, levels: &PriceLevels) -> Result<LevelScan> {
    let candles = app
        .exchange
        .candlesticks(pair, &app.config.trading.candle_interval, SCAN_CANDLE_LIMIT)
        .await?;
    let (prev, curr) = last_two_closed(&candles, app.clock.now())
        .ok_or_else(|| DaemonError::NoMarketData(pair.to_string()))?;

    let movement = classify(levels, prev.close, curr.close);
    debug!(
        pair,
        prev = %prev.close,
        curr = %curr.close,
        state = %movement.state,
        level = ?movement.level,
        "가격 움직임 분류"
    );

    Ok(LevelScan {
        pair: pair.to_string(),
        prev_close: prev.close,
        curr_close: curr.close,
        movement,
    })
}

async fn alert_breakout(app: &App, scan: &LevelScan) {
    let level = scan
        .movement
        .level
        .map(|l| l.to_string())
        .unwrap_or_else(|| "-".to_string());
    let next = scan
        .movement
        .next_level
        .map(|l| l.to_string())
        .unwrap_or_else(|| "-".to_string());

    info!(pair = %scan.pair, state = %scan.movement.state, %level, "레벨 돌파");
    let subject = format!("{} {}", scan.pair, scan.movement.state);
    let body = format!(
        "페어: {}\n상태: {}\n레벨: {}\n다음 레벨: {}\n직전 종가: {}\n현재 종가: {}",
        scan.pair,
        scan.movement.state,
        level,
        next,
        scan.prev_close,
        scan.curr_close
    );
    app.notifier.alert(&subject, &body).await;
}
