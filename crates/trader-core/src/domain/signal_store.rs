//! 시그널 저장소 추상화.
//!
//! 저장소는 시그널과 주문 상태의 유일한 영속 소유자입니다. 각 쓰기는
//! 독립된 단일 연산이며, 거래소 호출과 하나의 트랜잭션으로 묶이지 않습니다.
//! 같은 시그널 행에 대한 충돌 쓰기의 직렬화는 구현체의 책임입니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{CancelResult, ExitReason, Order, Signal, SignalIdentity};

/// 저장소 에러.
///
/// 쓰기 실패는 거래소와 로컬 기록의 불일치로 이어질 수 있으므로
/// 호출자에게 즉시 전파합니다.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// DB 에러
    #[error("DB 에러: {0}")]
    Database(String),

    /// 대상 시그널 없음
    #[error("시그널 없음: {0}")]
    NotFound(String),

    /// 이미 청산 완료된 시그널에 대한 청산 기록
    #[error("이미 청산된 시그널: {0}")]
    AlreadyExited(String),

    /// 저장된 값 변환 실패
    #[error("데이터 변환 에러: {0}")]
    Decode(String),
}

/// 시그널 저장소 trait.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// 식별자로 시그널 조회.
    async fn get_signal(&self, identity: &SignalIdentity) -> Result<Option<Signal>, StoreError>;

    /// 기록된 모든 시그널 (신규 시그널 계산의 기준 집합).
    async fn all_signals(&self) -> Result<Vec<Signal>, StoreError>;

    /// 포지션이 청산되지 않은 모든 시그널.
    async fn open_signals(&self) -> Result<Vec<Signal>, StoreError>;

    /// 신규 시그널 저장. 이미 있는 식별자는 무시하고 저장된 건수를 반환합니다.
    async fn insert_signals(&self, signals: &[Signal]) -> Result<u64, StoreError>;

    /// 소스에서 사라진 시그널 비활성화.
    async fn switch_off_signal(
        &self,
        identity: &SignalIdentity,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// 진입 주문과 보호 주문 기록.
    async fn record_entry(
        &self,
        identity: &SignalIdentity,
        entry: &Order,
        protective: &Order,
    ) -> Result<(), StoreError>;

    /// 보호 주문 스냅샷 갱신.
    ///
    /// 상태가 FILLED이고 아직 청산 전이면 포지션을 손절 청산 완료로 표시합니다.
    async fn update_protective_order(
        &self,
        identity: &SignalIdentity,
        order: &Order,
    ) -> Result<(), StoreError>;

    /// 보호 주문 취소 결과 기록 (보고된 상태와 무관하게 기록).
    async fn record_cancellation(
        &self,
        identity: &SignalIdentity,
        result: &CancelResult,
    ) -> Result<(), StoreError>;

    /// 시장가 청산 주문 기록. 포지션을 청산 완료로 표시합니다.
    ///
    /// 이미 청산된 시그널이면 `StoreError::AlreadyExited`를 반환하고 아무것도 바꾸지 않습니다.
    async fn record_exit_order(
        &self,
        identity: &SignalIdentity,
        order: &Order,
        reason: ExitReason,
    ) -> Result<(), StoreError>;

    /// 청산할 수량 없이 포지션을 청산 완료로 표시.
    ///
    /// 이미 청산된 시그널이면 `StoreError::AlreadyExited`를 반환합니다.
    async fn mark_position_exited(
        &self,
        identity: &SignalIdentity,
        reason: ExitReason,
    ) -> Result<(), StoreError>;
}
