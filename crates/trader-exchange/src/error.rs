//! 거래소 커넥터 내부 에러.
//!
//! 커넥터는 HTTP 상태 코드와 거래소 에러 코드를 이 타입으로 분류하고,
//! Provider 계층에서 `ProviderError`로 변환합니다.

use thiserror::Error;
use trader_core::ProviderError;

/// Binance 에러 코드: 내부 에러로 응답 상태 불명.
pub const CODE_UNKNOWN: i64 = -1006;
/// Binance 에러 코드: 타임아웃, 실행 여부 불명.
pub const CODE_TIMEOUT: i64 = -1007;
/// Binance 에러 코드: 주문 없음.
pub const CODE_NO_SUCH_ORDER: i64 = -2013;
/// Binance 에러 코드: 취소 거부 (이미 종료된 주문 등).
pub const CODE_CANCEL_REJECTED: i64 = -2011;
/// Binance 에러 코드: 신규 주문 거부 (잔고 부족 등).
pub const CODE_NEW_ORDER_REJECTED: i64 = -2010;

/// 거래소 커넥터 에러.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    /// 네트워크 에러 (요청이 거래소에 도달하지 않았을 수 있음)
    #[error("네트워크 에러: {0}")]
    NetworkError(String),

    /// 응답 대기 중 타임아웃
    #[error("타임아웃: {0}")]
    Timeout(String),

    /// 인증 실패 (API 키/서명)
    #[error("인증 실패: {0}")]
    Unauthorized(String),

    /// 요청 한도 초과
    #[error("요청 한도 초과")]
    RateLimited {
        /// 거래소가 알려준 대기 시간 (ms)
        retry_after_ms: Option<u64>,
    },

    /// 잔고 부족
    #[error("잔고 부족: {0}")]
    InsufficientBalance(String),

    /// 주문 없음
    #[error("주문 없음: {0}")]
    OrderNotFound(String),

    /// 거래소 API 에러 응답
    #[error("API 에러 [{code}]: {message}")]
    ApiError { code: i64, message: String },

    /// 응답 파싱 에러
    #[error("파싱 에러: {0}")]
    ParseError(String),

    /// 지원하지 않는 기능
    #[error("지원하지 않는 기능: {0}")]
    NotSupported(String),
}

impl ExchangeError {
    /// 재시도해도 되는 일시적 에러인지.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_)
                | ExchangeError::Timeout(_)
                | ExchangeError::RateLimited { .. }
        ) || matches!(self, ExchangeError::ApiError { code, .. } if *code == CODE_UNKNOWN)
    }

    /// 재시도하면 안 되는 치명적 에러인지.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExchangeError::Unauthorized(_) | ExchangeError::InsufficientBalance(_)
        )
    }

    /// 거래소가 지정한 재시도 대기 시간.
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            ExchangeError::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }

    /// 요청이 접수되었을 수 있지만 결과를 알 수 없는 에러인지.
    ///
    /// 주문/취소 같은 변경 요청에서 이 에러가 나면 실패로 처리하지 않고
    /// 다음 주기에 상태를 재조회합니다.
    pub fn is_indeterminate(&self) -> bool {
        match self {
            ExchangeError::Timeout(_) => true,
            ExchangeError::ApiError { code, .. } => {
                *code == CODE_UNKNOWN || *code == CODE_TIMEOUT
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ExchangeError::Timeout(e.to_string())
        } else if e.is_decode() {
            ExchangeError::ParseError(e.to_string())
        } else {
            ExchangeError::NetworkError(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(e: serde_json::Error) -> Self {
        ExchangeError::ParseError(e.to_string())
    }
}

/// 조회 요청의 ExchangeError → ProviderError 변환.
pub fn to_provider_error(e: ExchangeError) -> ProviderError {
    match e {
        ExchangeError::Unauthorized(msg) => ProviderError::Authentication(msg),
        ExchangeError::NetworkError(msg) | ExchangeError::Timeout(msg) => {
            ProviderError::Network(msg)
        }
        ExchangeError::RateLimited { .. } => ProviderError::Api {
            code: 429,
            message: "Rate limit exceeded".to_string(),
        },
        ExchangeError::ApiError { code, message } => ProviderError::Api { code, message },
        ExchangeError::ParseError(msg) => ProviderError::Parse(msg),
        ExchangeError::NotSupported(msg) => ProviderError::Unsupported(msg),
        other => ProviderError::Other(other.to_string()),
    }
}

/// 변경 요청(주문/취소)의 ExchangeError → ProviderError 변환.
///
/// 결과 불명 에러는 `ProviderError::Indeterminate`로 보고합니다.
pub fn to_provider_error_for_mutation(e: ExchangeError) -> ProviderError {
    if e.is_indeterminate() {
        return ProviderError::Indeterminate(e.to_string());
    }
    match e {
        ExchangeError::InsufficientBalance(message) => ProviderError::Api {
            code: CODE_NEW_ORDER_REJECTED,
            message,
        },
        ExchangeError::OrderNotFound(message) => ProviderError::Api {
            code: CODE_NO_SUCH_ORDER,
            message,
        },
        other => to_provider_error(other),
    }
}
