//! 신규 시그널 계산 회귀 테스트.
//!
//! 검증 범위:
//! 1. 같은 배치를 두 번 넣으면 신규 시그널이 없음
//! 2. 식별자 외 필드 변경은 무시, 식별자 필드 변경은 신규로 판정
//! 3. 파일 레코드 변환 시 식별 필드 누락 에러

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_core::{
    compute_delta, RawSignal, Signal, SignalError, SignalIdentity, TradeType,
};

// ============================================================================
// 헬퍼 함수
// ============================================================================

const PAIRS: [&str; 4] = ["BTCUSDT", "ETHUSDT", "XRPUSDT", "SOLUSDT"];
const PATTERNS: [&str; 3] = ["Triangle", "Rising Wedge", "Channel Down"];

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
}

fn build(pair: usize, pattern: usize, hours: i64, price: i64) -> Signal {
    let id = SignalIdentity::new(
        PAIRS[pair],
        "1h",
        if hours % 2 == 0 { TradeType::Buy } else { TradeType::Sell },
        PATTERNS[pattern],
        base_time() + Duration::hours(hours),
    )
    .unwrap();
    Signal::new(id, Decimal::from(price))
}

fn signal_batch() -> impl Strategy<Value = Vec<Signal>> {
    prop::collection::vec(
        (0usize..4, 0usize..3, 0i64..48, 1i64..100_000),
        0..40,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .map(|(pair, pattern, hours, price)| build(pair, pattern, hours, price))
            .collect()
    })
}

proptest! {
    #[test]
    fn delta_of_batch_against_itself_is_empty(batch in signal_batch()) {
        prop_assert!(compute_delta(&batch, &batch).is_empty());
    }

    #[test]
    fn delta_never_contains_known_or_duplicate_identities(
        known in signal_batch(),
        candidate in signal_batch(),
    ) {
        let delta = compute_delta(&known, &candidate);
        for (i, signal) in delta.iter().enumerate() {
            prop_assert!(!known.contains(signal));
            prop_assert!(!delta[..i].contains(signal));
            prop_assert!(candidate.contains(signal));
        }
    }
}

#[test]
fn changing_identity_field_makes_signal_new() {
    let known = vec![build(0, 0, 2, 100)];

    let other_time = build(0, 0, 4, 100);
    let other_pattern = build(0, 1, 2, 100);
    let repriced = build(0, 0, 2, 250).with_target(dec!(300), None);

    let delta = compute_delta(&known, &[other_time, other_pattern, repriced]);
    assert_eq!(delta.len(), 2);
    assert_eq!(delta[0].identity().time_of_signal(), base_time() + Duration::hours(4));
    assert_eq!(delta[1].identity().pattern(), "Rising Wedge");
}

#[test]
fn raw_signal_without_identity_field_is_rejected() {
    let raw = RawSignal {
        coin_pair: Some("BTCUSDT".to_string()),
        time_frame: Some("1h".to_string()),
        trade_type: Some("BUY".to_string()),
        pattern: None,
        time_of_signal: Some(base_time()),
        ..Default::default()
    };
    assert_eq!(
        Signal::try_from(raw).unwrap_err(),
        SignalError::MissingField("pattern")
    );

    let blank_pair = RawSignal {
        coin_pair: Some("  ".to_string()),
        time_frame: Some("1h".to_string()),
        trade_type: Some("SELL".to_string()),
        pattern: Some("Flag".to_string()),
        time_of_signal: Some(base_time()),
        ..Default::default()
    };
    assert_eq!(
        Signal::try_from(blank_pair).unwrap_err(),
        SignalError::MissingField("coinPair")
    );
}
