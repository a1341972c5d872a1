//! 최소 주문 금액(min notional)을 만족하는 주문 수량 계산.
//!
//! 진입 체결 시 0.1% 수수료가 기준 자산에서 차감되고, 보호 스탑 주문 수량은
//! 거래소 규칙에 따라 스텝 단위로 절사됩니다. 이 모듈은 두 조건을 모두 반영해
//! 진입 주문과 보호 주문이 모두 최소 주문 금액을 넘도록 하는 가장 작은 진입 금액을 구합니다.
//!
//! 올림(`round_up`)과 절사(`truncate`)는 서로 다른 연산이며 둘 다 필요합니다.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use thiserror::Error;

/// 체결 후 남는 수량 비율 (수수료 0.1%).
pub const COMMISSION_FACTOR: Decimal = dec!(0.999);

/// 계산 시점과 주문 시점 사이의 가격 변동 여유분 (USD).
pub const SLIPPAGE_BUFFER_USD: Decimal = dec!(0.25);

/// `Decimal`이 표현할 수 있는 최대 소수점 자릿수.
pub const MAX_STEP_DECIMALS: u32 = 28;

/// 수량 계산 입력 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizingError {
    #[error("손절 비율은 0 이상 100 미만이어야 합니다: {0}")]
    InvalidStopLoss(Decimal),

    #[error("가격은 0보다 커야 합니다: {0}")]
    InvalidPrice(Decimal),

    #[error("최소 주문 금액은 0보다 커야 합니다: {0}")]
    InvalidMinNotional(Decimal),

    #[error("수량 소수점 자릿수는 {MAX_STEP_DECIMALS} 이하여야 합니다: {0}")]
    InvalidStepDecimals(u32),
}

/// 소수점 자릿수에 해당하는 최소 수량 단위 (2 → 0.01, 0 → 1).
///
/// # Errors
///
/// 자릿수가 `MAX_STEP_DECIMALS`를 넘으면 에러.
pub fn step_size(decimals: u32) -> Result<Decimal, SizingError> {
    if decimals > MAX_STEP_DECIMALS {
        return Err(SizingError::InvalidStepDecimals(decimals));
    }
    Ok(Decimal::new(1, decimals))
}

/// 거래소 stepSize/tickSize 값에서 소수점 자릿수 추출 ("0.00100000" → 3).
pub fn decimals_from_step(step: Decimal) -> u32 {
    step.normalize().scale()
}

/// 지정 자릿수로 올림 (양수 기준 ceiling).
pub fn round_up(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::ToPositiveInfinity)
}

/// 지정 자릿수로 절사 (양수 기준 floor).
pub fn truncate(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::ToZero)
}

/// 매수 진입에 필요한 최소 주문 금액 (USD).
///
/// 1. 손절 비율만큼 가치가 줄어도 `min_notional`을 넘는 원시 금액을 구합니다.
/// 2. 진입가로 수량을 구하고 수수료만큼 부풀린 뒤 스텝 단위로 올림합니다.
/// 3. 수수료 차감 후 절사한 수량이 스탑 가격에서 `min_notional` 미만이면
///    한 스텝씩 수량을 늘립니다.
/// 4. `수량 × 진입가 + 0.25`를 반환합니다.
///
/// # Errors
///
/// 손절 비율이 [0, 100) 범위를 벗어나거나, 가격/최소 주문 금액이 0 이하이거나,
/// 자릿수가 `MAX_STEP_DECIMALS`를 넘으면 에러.
pub fn min_entry_value_usd(
    min_notional: Decimal,
    step_decimals: u32,
    stop_loss_percent: Decimal,
    entry_price: Decimal,
) -> Result<Decimal, SizingError> {
    if stop_loss_percent < Decimal::ZERO || stop_loss_percent >= Decimal::ONE_HUNDRED {
        return Err(SizingError::InvalidStopLoss(stop_loss_percent));
    }
    if entry_price <= Decimal::ZERO {
        return Err(SizingError::InvalidPrice(entry_price));
    }
    if min_notional <= Decimal::ZERO {
        return Err(SizingError::InvalidMinNotional(min_notional));
    }

    let keep_ratio = Decimal::ONE_HUNDRED - stop_loss_percent;
    let raw_value = min_notional * Decimal::ONE_HUNDRED / keep_ratio;
    let stop_price = entry_price * keep_ratio / Decimal::ONE_HUNDRED;
    let step = step_size(step_decimals)?;

    let mut quantity = round_up(raw_value / entry_price / COMMISSION_FACTOR, step_decimals);
    while truncate(quantity * COMMISSION_FACTOR, step_decimals) * stop_price < min_notional {
        quantity += step;
    }

    Ok(quantity * entry_price + SLIPPAGE_BUFFER_USD)
}

/// 매도 측 보호 주문에 필요한 최소 수량.
///
/// `min_notional / 진입가 / 0.999`를 스텝 단위로 올림합니다. 매수 측과 달리
/// 절사 검증 후 스텝을 늘리는 과정은 없습니다.
///
/// # Errors
///
/// 가격/최소 주문 금액이 0 이하이거나 자릿수가 `MAX_STEP_DECIMALS`를 넘으면 에러.
pub fn min_exit_quantity(
    min_notional: Decimal,
    step_decimals: u32,
    entry_price: Decimal,
) -> Result<Decimal, SizingError> {
    if step_decimals > MAX_STEP_DECIMALS {
        return Err(SizingError::InvalidStepDecimals(step_decimals));
    }
    if entry_price <= Decimal::ZERO {
        return Err(SizingError::InvalidPrice(entry_price));
    }
    if min_notional <= Decimal::ZERO {
        return Err(SizingError::InvalidMinNotional(min_notional));
    }
    Ok(round_up(
        min_notional / entry_price / COMMISSION_FACTOR,
        step_decimals,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_up_and_truncate_differ() {
        assert_eq!(round_up(dec!(1.231), 2), dec!(1.24));
        assert_eq!(truncate(dec!(1.239), 2), dec!(1.23));
        assert_eq!(round_up(dec!(1.23), 2), dec!(1.23));
        assert_eq!(round_up(dec!(0.2), 0), dec!(1));
        assert_eq!(truncate(dec!(0.999), 0), dec!(0));
    }

    #[test]
    fn test_step_helpers() {
        assert_eq!(step_size(0), Ok(dec!(1)));
        assert_eq!(step_size(3), Ok(dec!(0.001)));
        assert_eq!(step_size(28), Ok(Decimal::new(1, 28)));
        assert_eq!(step_size(29), Err(SizingError::InvalidStepDecimals(29)));
        assert_eq!(decimals_from_step(dec!(0.00100000)), 3);
        assert_eq!(decimals_from_step(dec!(1.00000000)), 0);
    }

    #[test]
    fn test_min_entry_value_integer_steps() {
        // raw = 10 * 100 / 90 = 11.11.., qty = ceil(11.11/2/0.999) = 6
        // truncate(6 * 0.999) = 5, 5 * 1.8 = 9 < 10 → 7: truncate(6.993) = 6, 6 * 1.8 = 10.8
        let value = min_entry_value_usd(dec!(10), 0, dec!(10), dec!(2)).unwrap();
        assert_eq!(value, dec!(14.25));
    }

    #[test]
    fn test_min_entry_value_fractional_steps() {
        let value = min_entry_value_usd(dec!(10), 2, dec!(5), dec!(100)).unwrap();
        // raw = 10.526.., qty = ceil(0.10537) = 0.11, truncate(0.10989) = 0.10, 0.10 * 95 = 9.5 < 10
        // 0.12: truncate(0.11988) = 0.11, 0.11 * 95 = 10.45
        assert_eq!(value, dec!(12.25));
    }

    #[test]
    fn test_min_entry_value_rejects_invalid_input() {
        assert_eq!(
            min_entry_value_usd(dec!(10), 2, dec!(100), dec!(1)),
            Err(SizingError::InvalidStopLoss(dec!(100)))
        );
        assert_eq!(
            min_entry_value_usd(dec!(10), 2, dec!(-1), dec!(1)),
            Err(SizingError::InvalidStopLoss(dec!(-1)))
        );
        assert_eq!(
            min_entry_value_usd(dec!(10), 29, dec!(5), dec!(1)),
            Err(SizingError::InvalidStepDecimals(29))
        );
        assert!(min_entry_value_usd(dec!(10), 2, dec!(5), dec!(0)).is_err());
        assert!(min_entry_value_usd(dec!(0), 2, dec!(5), dec!(1)).is_err());
    }

    #[test]
    fn test_min_entry_value_without_stop_loss() {
        // raw = 10, qty = ceil(10/100/0.999) = 0.11, truncate(0.10989) = 0.10, 0.10 * 100 = 10
        let value = min_entry_value_usd(dec!(10), 2, dec!(0), dec!(100)).unwrap();
        assert_eq!(value, dec!(11.25));
    }

    #[test]
    fn test_min_exit_quantity() {
        // 10 / 3 / 0.999 = 3.3366.. → 3.34
        assert_eq!(min_exit_quantity(dec!(10), 2, dec!(3)).unwrap(), dec!(3.34));
        assert_eq!(min_exit_quantity(dec!(10), 0, dec!(3)).unwrap(), dec!(4));
        assert!(min_exit_quantity(dec!(10), 0, dec!(-1)).is_err());
        assert_eq!(
            min_exit_quantity(dec!(10), 29, dec!(3)),
            Err(SizingError::InvalidStepDecimals(29))
        );
    }
}
