//! 조회성 거래소 요청 재시도.
//!
//! 네트워크 오류, Rate Limit 같은 일시적 오류에만 재시도합니다.
//! 주문/취소 같은 변경 요청에는 사용하지 않습니다. 변경 요청을 재시도하면
//! 이미 접수된 주문이 중복 생성될 수 있습니다.
//!
//! # 예시
//!
//! ```rust,ignore
//! use trader_exchange::retry::{with_retry, RetryConfig};
//!
//! let balances = with_retry(&RetryConfig::default(), || client.get_account()).await?;
//! ```

use std::{future::Future, time::Duration};

use rand::Rng;
use tracing::{debug, warn};

use crate::ExchangeError;

/// 재시도 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 최대 재시도 횟수 (초기 시도 제외).
    pub max_retries: u32,
    /// 기본 대기 시간 (에러에 지정된 대기 시간이 없을 때 사용).
    pub base_delay: Duration,
    /// 최대 대기 시간.
    pub max_delay: Duration,
    /// 백오프 배수.
    pub backoff_multiplier: f64,
    /// ±25% 지터 추가 여부.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// 빠른 재시도 설정 (짧은 지연, 적은 재시도).
    pub fn fast() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            ..Default::default()
        }
    }

    /// 재시도 없음 (단일 시도).
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// 시도 횟수에 따른 대기 시간.
    fn delay_for(&self, attempt: u32, error: &ExchangeError) -> Duration {
        let base = error
            .retry_delay_ms()
            .map(Duration::from_millis)
            .unwrap_or(self.base_delay);

        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_secs_f64(base.as_secs_f64() * multiplier).min(self.max_delay);

        if !self.add_jitter {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(-0.25..=0.25);
        Duration::from_secs_f64((delay.as_secs_f64() * (1.0 + jitter)).max(0.0))
    }
}

/// 일시적 에러에 대해 재시도하며 비동기 작업을 실행합니다.
///
/// 치명적 에러나 재시도 불가능한 에러는 즉시 반환합니다.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, ExchangeError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ExchangeError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "재시도 후 성공");
                }
                return Ok(result);
            }
            Err(e) if e.is_fatal() || !e.is_retryable() => {
                debug!(error = %e, "재시도 불가능한 에러, 즉시 실패 반환");
                return Err(e);
            }
            Err(e) if attempt >= config.max_retries => {
                warn!(
                    error = %e,
                    attempts = attempt + 1,
                    "최대 재시도 횟수 초과"
                );
                return Err(e);
            }
            Err(e) => {
                let delay = config.delay_for(attempt, &e);
                warn!(
                    error = %e,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "재시도 대기 중"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
