//! 포지션 청산 조건 평가.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{ExitReason, Signal, TradeType};

/// 열린 포지션의 청산 사유를 판정합니다.
///
/// 여러 조건이 동시에 맞으면 목표가 도달, 목표 시각 경과, 소스 제거 순으로 우선합니다.
/// 포지션이 없거나 이미 청산되었으면 `None`.
pub fn evaluate_exit(
    signal: &Signal,
    current_price: Decimal,
    now: DateTime<Utc>,
) -> Option<ExitReason> {
    if !signal.has_open_position() {
        return None;
    }

    if let Some(target) = signal.price_target {
        let reached = match signal.identity().trade_type() {
            TradeType::Buy => current_price >= target,
            TradeType::Sell => current_price <= target,
        };
        if reached {
            return Some(ExitReason::ProfitTargetMet);
        }
    }

    if signal.price_target_time.is_some_and(|deadline| now >= deadline) {
        return Some(ExitReason::TargetTimePassed);
    }

    if !signal.is_signal_on {
        return Some(ExitReason::RemovedFromSource);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Order, OrderStatus, SignalIdentity};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn entered(trade_type: TradeType) -> Signal {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let id = SignalIdentity::new("BTCUSDT", "4h", trade_type, "Channel Up", at).unwrap();
        let mut signal =
            Signal::new(id, dec!(100)).with_target(dec!(110), Some(at + Duration::hours(24)));
        signal.entry_order = Some(Order::new("1", dec!(1), dec!(100), OrderStatus::Filled));
        signal
    }

    fn before_deadline() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_no_exit_without_position() {
        let mut signal = entered(TradeType::Buy);
        signal.entry_order = None;
        assert_eq!(evaluate_exit(&signal, dec!(200), before_deadline()), None);

        let mut exited = entered(TradeType::Buy);
        exited.is_position_exited = true;
        assert_eq!(evaluate_exit(&exited, dec!(200), before_deadline()), None);
    }

    #[test]
    fn test_profit_target_takes_priority() {
        let mut signal = entered(TradeType::Buy);
        signal.is_signal_on = false;
        let late = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        assert_eq!(
            evaluate_exit(&signal, dec!(111), late),
            Some(ExitReason::ProfitTargetMet)
        );
        assert_eq!(
            evaluate_exit(&signal, dec!(105), late),
            Some(ExitReason::TargetTimePassed)
        );
        assert_eq!(
            evaluate_exit(&signal, dec!(105), before_deadline()),
            Some(ExitReason::RemovedFromSource)
        );
    }

    #[test]
    fn test_sell_target_direction() {
        let signal = entered(TradeType::Sell);
        assert_eq!(evaluate_exit(&signal, dec!(111), before_deadline()), None);
        assert_eq!(
            evaluate_exit(&signal, dec!(109), before_deadline()),
            Some(ExitReason::ProfitTargetMet)
        );
    }
}
