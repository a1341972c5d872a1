//! Binance Spot REST 클라이언트.
//!
//! 서명이 필요한 요청은 `timestamp`/`recvWindow`를 붙인 쿼리 문자열에
//! HMAC-SHA256 서명을 추가하고 `X-MBX-APIKEY` 헤더로 API 키를 전달합니다.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{header::RETRY_AFTER, Client, Method, Response, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::{debug, instrument, warn};

use super::models::{
    BinanceAccount, BinanceErrorBody, BinanceExchangeInfo, BinanceKline, BinanceOrder,
};
use crate::error::{CODE_NEW_ORDER_REJECTED, CODE_NO_SUCH_ORDER, CODE_UNKNOWN};
use crate::ExchangeError;

/// 운영 API 주소.
pub const BINANCE_API_URL: &str = "https://api.binance.com";

// ============================================================================
// 설정
// ============================================================================

/// Binance 클라이언트 설정.
#[derive(Clone)]
pub struct BinanceConfig {
    pub api_key: String,
    pub secret_key: SecretString,
    pub base_url: String,
    pub recv_window_ms: u64,
    pub timeout: Duration,
}

impl std::fmt::Debug for BinanceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceConfig")
            .field("api_key", &"***")
            .field("secret_key", &"***")
            .field("base_url", &self.base_url)
            .field("recv_window_ms", &self.recv_window_ms)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BinanceConfig {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: SecretString::from(secret_key.into()),
            base_url: BINANCE_API_URL.to_string(),
            recv_window_ms: 5000,
            timeout: Duration::from_secs(10),
        }
    }

    /// API 주소 변경 (테스트넷, 테스트 서버).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// 주문 방향과 수량 지정 방식이 정해진 신규 주문 파라미터.
#[derive(Debug, Clone)]
pub enum NewOrder {
    /// 기준 자산 수량 시장가
    Market { side: &'static str, quantity: Decimal },
    /// 호가 자산 금액 시장가
    MarketQuote { side: &'static str, quote_qty: Decimal },
    /// 스탑 리밋 (GTC)
    StopLossLimit {
        side: &'static str,
        quantity: Decimal,
        stop_price: Decimal,
        price: Decimal,
    },
}

impl NewOrder {
    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            NewOrder::Market { side, quantity } => vec![
                ("side", side.to_string()),
                ("type", "MARKET".to_string()),
                ("quantity", fmt_decimal(*quantity)),
            ],
            NewOrder::MarketQuote { side, quote_qty } => vec![
                ("side", side.to_string()),
                ("type", "MARKET".to_string()),
                ("quoteOrderQty", fmt_decimal(*quote_qty)),
            ],
            NewOrder::StopLossLimit {
                side,
                quantity,
                stop_price,
                price,
            } => vec![
                ("side", side.to_string()),
                ("type", "STOP_LOSS_LIMIT".to_string()),
                ("timeInForce", "GTC".to_string()),
                ("quantity", fmt_decimal(*quantity)),
                ("stopPrice", fmt_decimal(*stop_price)),
                ("price", fmt_decimal(*price)),
            ],
        }
    }
}

/// 거래소 전송용 소수 표기 (불필요한 0 제거).
fn fmt_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

fn to_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

// ============================================================================
// 클라이언트
// ============================================================================

/// Binance Spot REST 클라이언트.
pub struct BinanceClient {
    http: Client,
    config: BinanceConfig,
}

impl BinanceClient {
    /// 클라이언트 생성.
    pub fn new(config: BinanceConfig) -> Result<Self, ExchangeError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn sign(&self, query: &str) -> Result<String, ExchangeError> {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(self.config.secret_key.expose_secret().as_bytes())
                .map_err(|e| ExchangeError::Unauthorized(e.to_string()))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}?{}", self.config.base_url, path, to_query(params));
        debug!(%url, "Binance 공개 API 요청");
        let response = self.http.get(&url).send().await?;
        Self::handle_response(response).await
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, ExchangeError> {
        params.push(("recvWindow", self.config.recv_window_ms.to_string()));
        params.push(("timestamp", Utc::now().timestamp_millis().to_string()));
        let query = to_query(&params);
        let signature = self.sign(&query)?;
        let url = format!(
            "{}{}?{}&signature={}",
            self.config.base_url, path, query, signature
        );

        debug!(%method, path, "Binance 서명 API 요청");
        let response = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// HTTP 응답 분류.
    ///
    /// 503은 요청이 처리되었을 수 있으므로 결과 불명 에러 코드로 변환합니다.
    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, ExchangeError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            return Ok(serde_json::from_str(&body)?);
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            let retry_after_ms = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000);
            return Err(ExchangeError::RateLimited { retry_after_ms });
        }

        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::SERVICE_UNAVAILABLE {
            warn!(%body, "Binance 503 응답, 처리 결과 불명");
            return Err(ExchangeError::ApiError {
                code: CODE_UNKNOWN,
                message: format!("HTTP 503: {body}"),
            });
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ExchangeError::Unauthorized(body));
        }

        match serde_json::from_str::<BinanceErrorBody>(&body) {
            Ok(err) => Err(classify_api_error(err)),
            Err(_) => Err(ExchangeError::ApiError {
                code: i64::from(status.as_u16()),
                message: body,
            }),
        }
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 주문 조회 (주문 ID).
    #[instrument(skip(self))]
    pub async fn get_order(&self, symbol: &str, order_id: &str) -> Result<BinanceOrder, ExchangeError> {
        self.signed(
            Method::GET,
            "/api/v3/order",
            vec![("symbol", symbol.to_string()), ("orderId", order_id.to_string())],
        )
        .await
    }

    /// 주문 조회 (클라이언트 주문 ID). 주문이 없으면 `Ok(None)`.
    #[instrument(skip(self))]
    pub async fn find_order_by_client_id(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> Result<Option<BinanceOrder>, ExchangeError> {
        let result = self
            .signed(
                Method::GET,
                "/api/v3/order",
                vec![
                    ("symbol", symbol.to_string()),
                    ("origClientOrderId", client_order_id.to_string()),
                ],
            )
            .await;

        match result {
            Ok(order) => Ok(Some(order)),
            Err(ExchangeError::OrderNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 계좌 잔고 조회.
    #[instrument(skip(self))]
    pub async fn get_account(&self) -> Result<BinanceAccount, ExchangeError> {
        self.signed(Method::GET, "/api/v3/account", Vec::new()).await
    }

    /// 캔들 조회.
    #[instrument(skip(self))]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u16,
    ) -> Result<Vec<BinanceKline>, ExchangeError> {
        self.public_get(
            "/api/v3/klines",
            &[
                ("symbol", symbol.to_string()),
                ("interval", interval.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    /// 심볼 거래 규칙 조회.
    #[instrument(skip(self))]
    pub async fn get_exchange_info(&self, symbol: &str) -> Result<BinanceExchangeInfo, ExchangeError> {
        self.public_get("/api/v3/exchangeInfo", &[("symbol", symbol.to_string())])
            .await
    }

    // ========================================================================
    // 주문
    // ========================================================================

    /// 신규 주문 (FULL 응답).
    #[instrument(skip(self))]
    pub async fn new_order(
        &self,
        symbol: &str,
        order: &NewOrder,
        client_order_id: Option<&str>,
    ) -> Result<BinanceOrder, ExchangeError> {
        let mut params = vec![("symbol", symbol.to_string())];
        params.extend(order.params());
        if let Some(id) = client_order_id {
            params.push(("newClientOrderId", id.to_string()));
        }
        params.push(("newOrderRespType", "FULL".to_string()));

        self.signed(Method::POST, "/api/v3/order", params).await
    }

    /// 주문 취소.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<BinanceOrder, ExchangeError> {
        self.signed(
            Method::DELETE,
            "/api/v3/order",
            vec![("symbol", symbol.to_string()), ("orderId", order_id.to_string())],
        )
        .await
    }
}

/// 거래소 에러 코드 분류.
fn classify_api_error(err: BinanceErrorBody) -> ExchangeError {
    match err.code {
        CODE_NO_SUCH_ORDER => ExchangeError::OrderNotFound(err.msg),
        CODE_NEW_ORDER_REJECTED if err.msg.to_ascii_lowercase().contains("insufficient balance") => {
            ExchangeError::InsufficientBalance(err.msg)
        }
        -1022 | -2014 | -2015 => ExchangeError::Unauthorized(err.msg),
        -1003 => ExchangeError::RateLimited {
            retry_after_ms: None,
        },
        code => ExchangeError::ApiError {
            code,
            message: err.msg,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signature_matches_binance_docs() {
        // Binance API 문서의 SIGNED 요청 예시
        let client = BinanceClient::new(BinanceConfig::new(
            "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A",
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
        ))
        .unwrap();
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            client.sign(query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_stop_limit_params() {
        let order = NewOrder::StopLossLimit {
            side: "SELL",
            quantity: dec!(0.12300),
            stop_price: dec!(95.00),
            price: dec!(94.52),
        };
        assert_eq!(
            to_query(&order.params()),
            "side=SELL&type=STOP_LOSS_LIMIT&timeInForce=GTC&quantity=0.123&stopPrice=95&price=94.52"
        );
    }

    #[test]
    fn test_classify_api_error() {
        let err = classify_api_error(BinanceErrorBody {
            code: -2010,
            msg: "Account has insufficient balance for requested action.".to_string(),
        });
        assert!(matches!(err, ExchangeError::InsufficientBalance(_)));

        let err = classify_api_error(BinanceErrorBody {
            code: -1007,
            msg: "Timeout waiting for response from backend server.".to_string(),
        });
        assert!(err.is_indeterminate());
    }
}
