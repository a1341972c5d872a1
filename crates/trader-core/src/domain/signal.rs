//! 차트 패턴 트레이딩 시그널.
//!
//! 이 모듈은 외부 패턴 인식 서비스가 만든 매매 신호 관련 타입을 정의합니다:
//! - `SignalIdentity` - 시그널의 자연 키 (페어, 타임프레임, 방향, 패턴, 발생 시각)
//! - `Signal` - 시그널 레코드 (식별자 + 가변 속성 + 주문 스냅샷)
//! - `RawSignal` - 파일에서 읽은 검증 전 레코드
//!
//! 두 시그널은 식별자 필드가 같으면 같은 시그널입니다. 목표가나 가격 같은
//! 나머지 필드는 동등성과 해시에서 제외됩니다.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ExitReason, Order};

/// 시그널 구성 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// 식별 필드 누락 (빈 문자열 포함)
    #[error("시그널 식별 필드 누락: {0}")]
    MissingField(&'static str),

    /// 알 수 없는 매매 방향
    #[error("알 수 없는 매매 방향: {0}")]
    InvalidTradeType(String),
}

/// 시그널의 매매 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    /// 상승 기대 (매수 진입)
    Buy,
    /// 하락 기대 (매도 진입)
    Sell,
}

impl TradeType {
    /// 저장용 문자열.
    pub fn as_str(self) -> &'static str {
        match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeType {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "LONG" => Ok(TradeType::Buy),
            "SELL" | "SHORT" => Ok(TradeType::Sell),
            other => Err(SignalError::InvalidTradeType(other.to_string())),
        }
    }
}

/// 시그널 자연 키.
///
/// 생성 후에는 변경할 수 없으며, 생성 시 모든 문자열 필드가 비어 있지 않은지 검증합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SignalIdentity {
    coin_pair: String,
    time_frame: String,
    trade_type: TradeType,
    pattern: String,
    time_of_signal: DateTime<Utc>,
}

impl SignalIdentity {
    /// 식별자 생성.
    ///
    /// # Errors
    ///
    /// 문자열 필드가 비어 있으면 `SignalError::MissingField`.
    pub fn new(
        coin_pair: impl Into<String>,
        time_frame: impl Into<String>,
        trade_type: TradeType,
        pattern: impl Into<String>,
        time_of_signal: DateTime<Utc>,
    ) -> Result<Self, SignalError> {
        let coin_pair = required(coin_pair.into(), "coinPair")?.to_ascii_uppercase();
        let time_frame = required(time_frame.into(), "timeFrame")?;
        let pattern = required(pattern.into(), "pattern")?;

        Ok(Self {
            coin_pair,
            time_frame,
            trade_type,
            pattern,
            time_of_signal,
        })
    }

    /// 거래 페어 (예: "BTCUSDT").
    pub fn coin_pair(&self) -> &str {
        &self.coin_pair
    }

    /// 타임프레임 (예: "4h").
    pub fn time_frame(&self) -> &str {
        &self.time_frame
    }

    /// 매매 방향.
    pub fn trade_type(&self) -> TradeType {
        self.trade_type
    }

    /// 패턴 이름.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// 시그널 발생 시각.
    pub fn time_of_signal(&self) -> DateTime<Utc> {
        self.time_of_signal
    }
}

impl fmt::Display for SignalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} @ {}",
            self.coin_pair,
            self.time_frame,
            self.trade_type,
            self.pattern,
            self.time_of_signal.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

fn required(value: String, field: &'static str) -> Result<String, SignalError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SignalError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

/// 시그널 레코드.
///
/// 저장소가 유일한 영속 소유자이며, 이 값은 조회 시점의 스냅샷입니다.
/// 거래소 변경 호출 후에는 다시 조회해야 합니다.
#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    identity: SignalIdentity,
    /// 시그널 발생 시점 가격
    pub price_at_time_of_signal: Decimal,
    /// 목표가
    pub price_target: Option<Decimal>,
    /// 목표가 도달 기한
    pub price_target_time: Option<DateTime<Utc>>,
    /// 기대 수익률 (%)
    pub profit_potential_percent: Option<Decimal>,
    /// 소스에 아직 존재하는지
    pub is_signal_on: bool,
    /// 시그널 발생 봉의 거래량
    pub volume: Option<Decimal>,
    /// 평균 거래량 (소스 제공 시)
    pub average_volume: Option<Decimal>,
    /// 무효화 사유
    pub invalidation_reason: Option<String>,
    /// 무효화 시각
    pub invalidated_at: Option<DateTime<Utc>>,
    /// 마지막으로 추적한 가격
    pub last_tracked_price: Option<Decimal>,
    /// 진입 주문
    pub entry_order: Option<Order>,
    /// 보호용 스탑 리밋 주문
    pub exit_stop_limit_order: Option<Order>,
    /// 시장가 청산 주문
    pub exit_order: Option<Order>,
    /// 청산 사유
    pub exit_reason: Option<ExitReason>,
    /// 포지션 청산 완료 여부 (false → true 한 번만 전이)
    pub is_position_exited: bool,
}

impl Signal {
    /// 수집 직후 상태의 시그널 생성 (시그널 활성, 주문 없음).
    pub fn new(identity: SignalIdentity, price_at_time_of_signal: Decimal) -> Self {
        Self {
            identity,
            price_at_time_of_signal,
            price_target: None,
            price_target_time: None,
            profit_potential_percent: None,
            is_signal_on: true,
            volume: None,
            average_volume: None,
            invalidation_reason: None,
            invalidated_at: None,
            last_tracked_price: None,
            entry_order: None,
            exit_stop_limit_order: None,
            exit_order: None,
            exit_reason: None,
            is_position_exited: false,
        }
    }

    /// 목표가와 기한 설정.
    pub fn with_target(mut self, price: Decimal, until: Option<DateTime<Utc>>) -> Self {
        self.price_target = Some(price);
        self.price_target_time = until;
        self
    }

    /// 기대 수익률 설정.
    pub fn with_profit_potential(mut self, percent: Decimal) -> Self {
        self.profit_potential_percent = Some(percent);
        self
    }

    /// 식별자.
    pub fn identity(&self) -> &SignalIdentity {
        &self.identity
    }

    /// 거래 페어.
    pub fn coin_pair(&self) -> &str {
        self.identity.coin_pair()
    }

    /// 진입 주문이 체결되어 포지션이 열려 있는지.
    pub fn has_open_position(&self) -> bool {
        !self.is_position_exited
            && self
                .entry_order
                .as_ref()
                .is_some_and(|o| o.executed_qty > Decimal::ZERO)
    }

    /// 진입 평균가 대비 청산 평균가 수익률 (%).
    pub fn realized_profit_percent(&self) -> Option<Decimal> {
        let entry = self.entry_order.as_ref()?;
        let exit = self.exit_order.as_ref()?;
        if entry.avg_price.is_zero() {
            return None;
        }
        Some((exit.avg_price - entry.avg_price) / entry.avg_price * Decimal::ONE_HUNDRED)
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for Signal {}

impl Hash for Signal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

/// 파일에서 읽은 검증 전 시그널.
///
/// 식별 필드가 모두 있어야 `Signal`로 변환됩니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSignal {
    pub coin_pair: Option<String>,
    pub time_frame: Option<String>,
    pub trade_type: Option<String>,
    pub pattern: Option<String>,
    #[serde(alias = "time")]
    pub time_of_signal: Option<DateTime<Utc>>,
    #[serde(default)]
    pub price_at_time_of_signal: Option<Decimal>,
    #[serde(default)]
    pub price_target: Option<Decimal>,
    #[serde(default)]
    pub price_target_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub profit_potential_percent: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub average_volume: Option<Decimal>,
}

impl TryFrom<RawSignal> for Signal {
    type Error = SignalError;

    fn try_from(raw: RawSignal) -> Result<Self, Self::Error> {
        let trade_type = raw
            .trade_type
            .ok_or(SignalError::MissingField("tradeType"))?
            .parse::<TradeType>()?;
        let identity = SignalIdentity::new(
            raw.coin_pair.ok_or(SignalError::MissingField("coinPair"))?,
            raw.time_frame.ok_or(SignalError::MissingField("timeFrame"))?,
            trade_type,
            raw.pattern.ok_or(SignalError::MissingField("pattern"))?,
            raw.time_of_signal
                .ok_or(SignalError::MissingField("timeOfSignal"))?,
        )?;

        let mut signal = Signal::new(
            identity,
            raw.price_at_time_of_signal.unwrap_or(Decimal::ZERO),
        );
        signal.price_target = raw.price_target;
        signal.price_target_time = raw.price_target_time;
        signal.profit_potential_percent = raw.profit_potential_percent;
        signal.volume = raw.volume;
        signal.average_volume = raw.average_volume;
        Ok(signal)
    }
}
