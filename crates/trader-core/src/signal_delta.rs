//! 신규 시그널 계산.
//!
//! 시그널 비교는 식별자(페어, 타임프레임, 방향, 패턴, 발생 시각)만 사용합니다.
//! 목표가나 가격 등 나머지 필드가 바뀌어도 같은 시그널로 취급합니다.

use std::collections::HashSet;

use crate::domain::{Signal, SignalIdentity};

/// `candidate` 중 `known`에 없는 시그널만 반환합니다.
///
/// 결과는 `candidate` 순서를 유지하며, 같은 배치 안에서 식별자가 중복되면
/// 처음 나온 것만 남깁니다.
pub fn compute_delta(known: &[Signal], candidate: &[Signal]) -> Vec<Signal> {
    let known_ids: HashSet<&SignalIdentity> = known.iter().map(Signal::identity).collect();
    let mut seen: HashSet<&SignalIdentity> = HashSet::with_capacity(candidate.len());

    candidate
        .iter()
        .filter(|signal| {
            let id = signal.identity();
            !known_ids.contains(id) && seen.insert(id)
        })
        .cloned()
        .collect()
}

/// `known` 중 시그널이 아직 켜져 있지만 `candidate`에서 사라진 것.
///
/// 소스에서 제거된 시그널을 비활성화할 때 사용합니다.
pub fn missing_from<'a>(known: &'a [Signal], candidate: &[Signal]) -> Vec<&'a Signal> {
    let candidate_ids: HashSet<&SignalIdentity> = candidate.iter().map(Signal::identity).collect();

    known
        .iter()
        .filter(|signal| signal.is_signal_on && !candidate_ids.contains(signal.identity()))
        .collect()
}
