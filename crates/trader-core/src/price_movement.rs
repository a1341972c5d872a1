//! 지지/저항 레벨 기반 가격 움직임 분류.
//!
//! 정렬된 가격 레벨 사이의 구간(band)을 기준으로 직전 종가와 현재 종가의
//! 위치를 비교해 돌파, 접근, 도달, 재테스트 상태를 판정합니다.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// 레벨 근접 판정 비율 (1%).
const PROXIMITY: Decimal = dec!(0.01);

/// 가격 움직임 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceMovementState {
    BrokeResistance,
    BrokeSupport,
    ApproachingResistance,
    ApproachingSupport,
    AtResistance,
    AtSupport,
    RetestedResistance,
    RetestedSupport,
    Undefined,
}

impl PriceMovementState {
    /// 레벨 돌파 여부 (알림 대상).
    pub fn is_breakout(self) -> bool {
        matches!(
            self,
            PriceMovementState::BrokeResistance | PriceMovementState::BrokeSupport
        )
    }
}

impl fmt::Display for PriceMovementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PriceMovementState::BrokeResistance => "저항 돌파",
            PriceMovementState::BrokeSupport => "지지 이탈",
            PriceMovementState::ApproachingResistance => "저항 접근",
            PriceMovementState::ApproachingSupport => "지지 접근",
            PriceMovementState::AtResistance => "저항 도달",
            PriceMovementState::AtSupport => "지지 도달",
            PriceMovementState::RetestedResistance => "저항 재테스트",
            PriceMovementState::RetestedSupport => "지지 재테스트",
            PriceMovementState::Undefined => "판정 불가",
        };
        f.write_str(s)
    }
}

/// 분류 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceMovement {
    pub state: PriceMovementState,
    /// 판정 기준 레벨
    pub level: Option<Decimal>,
    /// 돌파 후 다음 레벨
    pub next_level: Option<Decimal>,
}

impl PriceMovement {
    fn undefined() -> Self {
        Self {
            state: PriceMovementState::Undefined,
            level: None,
            next_level: None,
        }
    }

    fn at(state: PriceMovementState, level: Decimal) -> Self {
        Self {
            state,
            level: Some(level),
            next_level: None,
        }
    }
}

/// 오름차순 정렬된 지지/저항 레벨 목록.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceLevels(Vec<Decimal>);

impl PriceLevels {
    /// 레벨 목록 생성 (정렬 및 중복 제거).
    pub fn new(mut levels: Vec<Decimal>) -> Self {
        levels.sort();
        levels.dedup();
        Self(levels)
    }

    pub fn as_slice(&self) -> &[Decimal] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `levels[i] <= close <= levels[i+1]`인 첫 번째 구간 인덱스.
    pub fn band_index(&self, close: Decimal) -> Option<usize> {
        self.0
            .windows(2)
            .position(|w| w[0] <= close && close <= w[1])
    }
}

impl FromStr for PriceLevels {
    type Err = rust_decimal::Error;

    /// "3300,3400,3500" 형식 파싱.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let levels = s
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(Decimal::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(levels))
    }
}

/// 직전 종가와 현재 종가로 가격 움직임을 분류합니다.
///
/// 두 종가 중 하나라도 레벨 범위를 벗어나면 `Undefined`입니다.
pub fn classify(levels: &PriceLevels, prev_close: Decimal, curr_close: Decimal) -> PriceMovement {
    let (Some(prev_idx), Some(curr_idx)) =
        (levels.band_index(prev_close), levels.band_index(curr_close))
    else {
        return PriceMovement::undefined();
    };
    let l = levels.as_slice();

    if curr_idx > prev_idx {
        return PriceMovement {
            state: PriceMovementState::BrokeResistance,
            level: Some(l[prev_idx + 1]),
            next_level: Some(l[curr_idx + 1]),
        };
    }
    if curr_idx < prev_idx {
        return PriceMovement {
            state: PriceMovementState::BrokeSupport,
            level: Some(l[prev_idx]),
            next_level: Some(l[curr_idx]),
        };
    }

    let support = l[curr_idx];
    let resistance = l[curr_idx + 1];
    let near_support = support * (Decimal::ONE + PROXIMITY);
    let near_resistance = resistance * (Decimal::ONE - PROXIMITY);

    if curr_close > prev_close {
        if prev_close <= near_support && curr_close < near_resistance {
            PriceMovement::at(PriceMovementState::RetestedSupport, support)
        } else if curr_close >= near_resistance {
            PriceMovement::at(PriceMovementState::AtResistance, resistance)
        } else {
            PriceMovement::at(PriceMovementState::ApproachingResistance, resistance)
        }
    } else if curr_close < prev_close {
        if prev_close >= near_resistance && curr_close > near_support {
            PriceMovement::at(PriceMovementState::RetestedResistance, resistance)
        } else if curr_close <= near_support {
            PriceMovement::at(PriceMovementState::AtSupport, support)
        } else {
            PriceMovement::at(PriceMovementState::ApproachingSupport, support)
        }
    } else {
        PriceMovement::undefined()
    }
}
