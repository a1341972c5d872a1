//! Binance Spot REST 응답 타입.

use rust_decimal::Decimal;
use serde::Deserialize;

/// 에러 응답 본문 (`{"code": -2013, "msg": "Order does not exist."}`).
#[derive(Debug, Deserialize)]
pub struct BinanceErrorBody {
    pub code: i64,
    pub msg: String,
}

/// 주문 조회/생성/취소 응답.
///
/// 생성(`newOrderRespType=FULL`), 조회, 취소 응답의 공통 필드만 사용합니다.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceOrder {
    pub symbol: String,
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub orig_qty: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str")]
    pub executed_qty: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub cummulative_quote_qty: Option<Decimal>,
    pub status: String,
    #[serde(default, rename = "type")]
    pub order_type: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub fills: Vec<BinanceFill>,
}

impl BinanceOrder {
    /// 평균 체결가.
    ///
    /// 누적 체결 금액 / 체결 수량. 미체결이면 지정가, 지정가도 없으면 0.
    pub fn average_price(&self) -> Decimal {
        if self.executed_qty > Decimal::ZERO {
            if let Some(quote) = self.cummulative_quote_qty.filter(|q| *q > Decimal::ZERO) {
                return quote / self.executed_qty;
            }
            let filled: Decimal = self.fills.iter().map(|f| f.qty).sum();
            if filled > Decimal::ZERO {
                let notional: Decimal = self.fills.iter().map(|f| f.price * f.qty).sum();
                return notional / filled;
            }
        }
        self.price.unwrap_or(Decimal::ZERO)
    }
}

/// FULL 응답의 개별 체결.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceFill {
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub qty: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub commission: Option<Decimal>,
    #[serde(default)]
    pub commission_asset: Option<String>,
}

/// 계좌 정보 (`/api/v3/account`).
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceAccount {
    pub balances: Vec<BinanceBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceBalance {
    pub asset: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub free: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub locked: Decimal,
}

/// 캔들 배열 원소.
///
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume,
///   trades, takerBuyBase, takerBuyQuote, ignore]`
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceKline(
    pub i64,
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
    pub i64,
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
    pub u64,
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
    pub serde_json::Value,
);

impl BinanceKline {
    pub fn open_time_ms(&self) -> i64 {
        self.0
    }

    pub fn close(&self) -> Decimal {
        self.4
    }

    pub fn volume(&self) -> Decimal {
        self.5
    }

    pub fn close_time_ms(&self) -> i64 {
        self.6
    }
}

/// 거래 규칙 (`/api/v3/exchangeInfo`).
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceExchangeInfo {
    pub symbols: Vec<BinanceSymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceSymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub filters: Vec<BinanceSymbolFilter>,
}

impl BinanceSymbolInfo {
    fn filter(&self, filter_type: &str) -> Option<&BinanceSymbolFilter> {
        self.filters.iter().find(|f| f.filter_type == filter_type)
    }

    /// LOT_SIZE stepSize.
    pub fn step_size(&self) -> Option<Decimal> {
        self.filter("LOT_SIZE").and_then(|f| f.step_size)
    }

    /// PRICE_FILTER tickSize.
    pub fn tick_size(&self) -> Option<Decimal> {
        self.filter("PRICE_FILTER").and_then(|f| f.tick_size)
    }

    /// NOTIONAL 또는 구버전 MIN_NOTIONAL 필터의 최소 주문 금액.
    pub fn min_notional(&self) -> Option<Decimal> {
        self.filter("NOTIONAL")
            .or_else(|| self.filter("MIN_NOTIONAL"))
            .and_then(|f| f.min_notional)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceSymbolFilter {
    pub filter_type: String,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub step_size: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub tick_size: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub min_notional: Option<Decimal>,
}
