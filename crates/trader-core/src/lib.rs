//! 차트 패턴 시그널 자동매매의 핵심 도메인.
//!
//! 이 crate는 다음을 제공합니다:
//! - 시그널/주문 도메인 타입과 외부 협력자 trait (거래소, 저장소, 알림, 시계)
//! - 신규 시그널 계산 (`signal_delta`)
//! - 최소 주문 금액을 만족하는 주문 수량 계산 (`sizing`)
//! - 지지/저항 레벨 기반 가격 움직임 분류 (`price_movement`)
//! - 포지션 청산 조건 평가 (`exit_rules`)
//!
//! 거래소 호출이나 DB 접근은 하지 않으며, 모든 계산은 순수 함수입니다.

pub mod domain;
pub mod exit_rules;
pub mod price_movement;
pub mod signal_delta;
pub mod sizing;

// 주요 타입 재내보내기
pub use domain::*;
pub use exit_rules::evaluate_exit;
pub use price_movement::{classify, PriceLevels, PriceMovement, PriceMovementState};
pub use signal_delta::{compute_delta, missing_from};
pub use sizing::{
    decimals_from_step, min_entry_value_usd, min_exit_quantity, round_up, step_size, truncate,
    SizingError, COMMISSION_FACTOR, MAX_STEP_DECIMALS, SLIPPAGE_BUFFER_USD,
};
