//! 공통 유틸리티 함수.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use trader_core::{Candlestick, SpotExchange};

use crate::error::DaemonError;
use crate::Result;

/// 최신 캔들 종가 (진행 중인 캔들 포함).
pub async fn latest_price(
    exchange: &dyn SpotExchange,
    pair: &str,
    interval: &str,
) -> Result<Decimal> {
    let candles = exchange.candlesticks(pair, interval, 1).await?;
    candles
        .last()
        .map(|c| c.close)
        .ok_or_else(|| DaemonError::NoMarketData(pair.to_string()))
}

/// 마감된 마지막 두 캔들 (직전, 최신).
///
/// `close_time`이 `now` 이후인 캔들은 아직 진행 중이므로 제외합니다.
pub fn last_two_closed(
    candles: &[Candlestick],
    now: DateTime<Utc>,
) -> Option<(&Candlestick, &Candlestick)> {
    let closed: Vec<&Candlestick> = candles.iter().filter(|c| c.close_time < now).collect();
    match closed.as_slice() {
        [.., prev, curr] => Some((prev, curr)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn candle(open: DateTime<Utc>, close: Decimal) -> Candlestick {
        Candlestick {
            open_time: open,
            close,
            close_time: open + Duration::minutes(15) - Duration::milliseconds(1),
            volume: dec!(1),
        }
    }

    #[test]
    fn test_last_two_closed_skips_open_candle() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let candles = vec![
            candle(t0, dec!(1)),
            candle(t0 + Duration::minutes(15), dec!(2)),
            candle(t0 + Duration::minutes(30), dec!(3)),
        ];
        let now = t0 + Duration::minutes(40);

        let (prev, curr) = last_two_closed(&candles, now).unwrap();
        assert_eq!((prev.close, curr.close), (dec!(1), dec!(2)));

        assert!(last_two_closed(&candles[..1], now).is_none());
    }
}
