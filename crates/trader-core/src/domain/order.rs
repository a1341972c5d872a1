//! 거래소 주문 스냅샷.
//!
//! 시그널에는 세 가지 역할의 주문이 붙습니다:
//! - 진입 주문 (`entry_order`)
//! - 보호용 스탑 리밋 주문 (`exit_stop_limit_order`)
//! - 최종 시장가 청산 주문 (`exit_order`)

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 주문 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Side {
    /// 거래소 API 문자열.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 거래소 주문 생명주기 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 접수됨, 체결 없음
    New,
    /// 부분 체결
    PartiallyFilled,
    /// 전량 체결
    Filled,
    /// 취소됨
    Canceled,
    /// 취소 처리 중
    PendingCancel,
    /// 거부됨
    Rejected,
    /// 만료됨
    Expired,
    /// 자기체결 방지로 만료됨
    ExpiredInMatch,
}

impl OrderStatus {
    /// 거래소 API 문자열.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::PendingCancel => "PENDING_CANCEL",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::ExpiredInMatch => "EXPIRED_IN_MATCH",
        }
    }

    /// 호가창에 남아 있어 취소가 필요한 상태인지.
    pub fn is_open(self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }

    /// 전량 체결 여부.
    pub fn is_filled(self) -> bool {
        self == OrderStatus::Filled
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Ok(OrderStatus::New),
            "PARTIALLY_FILLED" => Ok(OrderStatus::PartiallyFilled),
            "FILLED" => Ok(OrderStatus::Filled),
            "CANCELED" | "CANCELLED" => Ok(OrderStatus::Canceled),
            "PENDING_CANCEL" => Ok(OrderStatus::PendingCancel),
            "REJECTED" => Ok(OrderStatus::Rejected),
            "EXPIRED" => Ok(OrderStatus::Expired),
            "EXPIRED_IN_MATCH" => Ok(OrderStatus::ExpiredInMatch),
            other => Err(format!("알 수 없는 주문 상태: {}", other)),
        }
    }
}

/// 주문 스냅샷.
///
/// 거래소에서 조회한 시점의 값이며 이후 상태는 재조회해야 합니다.
/// 같은 주문 ID에 대해 `executed_qty`는 감소하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// 거래소 주문 ID
    pub order_id: String,
    /// 체결 수량
    pub executed_qty: Decimal,
    /// 평균 체결가 (미체결이면 0)
    pub avg_price: Decimal,
    /// 주문 상태
    pub status: OrderStatus,
}

impl Order {
    /// 새 주문 스냅샷 생성.
    pub fn new(
        order_id: impl Into<String>,
        executed_qty: Decimal,
        avg_price: Decimal,
        status: OrderStatus,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            executed_qty,
            avg_price,
            status,
        }
    }
}

/// 주문 취소 응답.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResult {
    /// 취소 대상 주문 ID
    pub order_id: String,
    /// 거래소가 보고한 취소 후 상태
    pub status: OrderStatus,
}

/// 포지션 청산 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// 목표 시각 경과
    TargetTimePassed,
    /// 시그널 소스에서 제거됨
    RemovedFromSource,
    /// 목표가 도달
    ProfitTargetMet,
    /// 보호 주문(손절) 체결
    StopLoss,
    /// 수동 강제 청산
    ForcedExit,
}

impl ExitReason {
    /// 저장용 문자열.
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::TargetTimePassed => "target_time_passed",
            ExitReason::RemovedFromSource => "removed_from_source",
            ExitReason::ProfitTargetMet => "profit_target_met",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::ForcedExit => "forced_exit",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExitReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "target_time_passed" => Ok(ExitReason::TargetTimePassed),
            "removed_from_source" => Ok(ExitReason::RemovedFromSource),
            "profit_target_met" => Ok(ExitReason::ProfitTargetMet),
            "stop_loss" => Ok(ExitReason::StopLoss),
            "forced_exit" => Ok(ExitReason::ForcedExit),
            other => Err(format!("알 수 없는 청산 사유: {}", other)),
        }
    }
}
