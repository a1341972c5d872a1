//! 거래소 협력자 추상화.
//!
//! 주문 상태 조회, 취소, 잔고 조회, 시장가/스탑 리밋 주문, 캔들 조회를 위한
//! 거래소 중립적인 인터페이스를 제공합니다.
//!
//! 거래소는 신뢰할 수 없고 결과적 일관성만 보장하는 외부 시스템으로 취급합니다.
//! 변경 요청(주문/취소)이 타임아웃되면 실패가 아니라 `ProviderError::Indeterminate`로
//! 보고하며, 호출자는 같은 요청을 재시도하지 말고 다음 주기에 상태를 재조회해야 합니다.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{CancelResult, Order, Side};

/// 페어 이름 끝에 붙는 호가 자산 길이 (예: "USDT").
pub const QUOTE_ASSET_LEN: usize = 4;

// =============================================================================
// 에러 타입
// =============================================================================

/// 거래소 협력자 에러.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 인증 실패
    #[error("인증 실패: {0}")]
    Authentication(String),

    /// 거래소가 요청을 명시적으로 거부함
    #[error("거래소 거부 [{code}]: {message}")]
    Api {
        /// 거래소 에러 코드
        code: i64,
        /// 거래소 에러 메시지
        message: String,
    },

    /// 요청은 접수되었으나 결과를 알 수 없음 (다음 주기에 재조회 필요)
    #[error("처리 결과 불명: {0}")]
    Indeterminate(String),

    /// 파싱 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 지원하지 않는 기능
    #[error("지원하지 않는 기능: {0}")]
    Unsupported(String),

    /// 기타 에러
    #[error("기타 에러: {0}")]
    Other(String),
}

impl ProviderError {
    /// 결과 불명 여부. 실패로 분류하면 안 됩니다.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, ProviderError::Indeterminate(_))
    }
}

// =============================================================================
// 요청/응답 타입
// =============================================================================

/// 자산별 잔고.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetBalance {
    /// 사용 가능 수량
    pub free: Decimal,
    /// 주문에 묶인 수량
    pub locked: Decimal,
}

/// 캔들 (종가 중심).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candlestick {
    /// 시작 시각
    pub open_time: DateTime<Utc>,
    /// 종가
    pub close: Decimal,
    /// 종료 시각
    pub close_time: DateTime<Utc>,
    /// 거래량
    pub volume: Decimal,
}

/// 심볼 거래 규칙.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRules {
    /// 거래 페어
    pub pair: String,
    /// 최소 주문 금액 (호가 자산 기준)
    pub min_notional: Decimal,
    /// 수량 소수점 자릿수 (LOT_SIZE stepSize)
    pub step_decimals: u32,
    /// 가격 소수점 자릿수 (PRICE_FILTER tickSize)
    pub tick_decimals: u32,
}

/// 시장가 주문 수량 지정 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAmount {
    /// 기준 자산 수량
    Base(Decimal),
    /// 호가 자산 금액 (매수 시 사용)
    Quote(Decimal),
}

/// 시장가 주문 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketOrderRequest {
    pub pair: String,
    pub side: Side,
    pub amount: OrderAmount,
    /// 중복 주문 방지용 클라이언트 주문 ID
    pub client_order_id: Option<String>,
}

/// 스탑 리밋 주문 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopLimitOrderRequest {
    pub pair: String,
    pub side: Side,
    pub quantity: Decimal,
    pub stop_price: Decimal,
    pub limit_price: Decimal,
    pub client_order_id: Option<String>,
}

/// 페어에서 기준 자산 추출 (고정 4글자 호가 자산 제거).
///
/// ```
/// assert_eq!(trader_core::base_asset_of("BTCUSDT"), Some("BTC"));
/// assert_eq!(trader_core::base_asset_of("USDT"), None);
/// ```
pub fn base_asset_of(pair: &str) -> Option<&str> {
    let cut = pair.len().checked_sub(QUOTE_ASSET_LEN)?;
    if cut == 0 {
        return None;
    }
    pair.get(..cut)
}

// =============================================================================
// SpotExchange Trait
// =============================================================================

/// 현물 거래소 협력자 trait.
///
/// 호출자 관점에서 각 호출은 완료될 때까지 대기하며, 이 trait 자체는
/// 재시도를 하지 않습니다. 조회성 호출의 재시도는 구현체가 결정합니다.
#[async_trait]
pub trait SpotExchange: Send + Sync {
    /// 주문 상태 조회.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Api`: 존재하지 않는 주문 등
    /// - `ProviderError::Network`: 네트워크 연결 실패
    async fn order_status(&self, pair: &str, order_id: &str) -> Result<Order, ProviderError>;

    /// 클라이언트 주문 ID로 주문 조회.
    ///
    /// 이전 주기의 주문이 실제로 접수되었는지 확인할 때 사용합니다.
    /// 주문이 없으면 `Ok(None)`.
    async fn find_order_by_client_id(
        &self,
        pair: &str,
        client_order_id: &str,
    ) -> Result<Option<Order>, ProviderError>;

    /// 주문 취소.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Api`: 이미 체결되었거나 존재하지 않는 주문
    /// - `ProviderError::Indeterminate`: 취소 여부 불명
    async fn cancel_order(&self, pair: &str, order_id: &str) -> Result<CancelResult, ProviderError>;

    /// 계좌 전체 자산별 잔고 조회.
    async fn account_balances(&self) -> Result<HashMap<String, AssetBalance>, ProviderError>;

    /// 시장가 주문.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Api`: 잔고 부족, 최소 주문 금액 미달 등
    /// - `ProviderError::Indeterminate`: 체결 여부 불명
    async fn place_market_order(&self, request: &MarketOrderRequest)
        -> Result<Order, ProviderError>;

    /// 스탑 리밋 주문 (GTC).
    async fn place_stop_limit_order(
        &self,
        request: &StopLimitOrderRequest,
    ) -> Result<Order, ProviderError>;

    /// 최근 캔들 조회 (오래된 것부터 정렬).
    async fn candlesticks(
        &self,
        pair: &str,
        interval: &str,
        limit: u16,
    ) -> Result<Vec<Candlestick>, ProviderError>;

    /// 심볼 거래 규칙 조회.
    async fn symbol_rules(&self, pair: &str) -> Result<SymbolRules, ProviderError>;

    /// 거래소 이름 (로깅용).
    fn exchange_name(&self) -> &str;
}
