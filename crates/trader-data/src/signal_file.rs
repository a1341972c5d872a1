//! 시그널 소스 파일 읽기.
//!
//! 외부 패턴 인식 서비스가 주기적으로 내려주는 JSON 파일을 읽어 `Signal`로 변환합니다.
//! 파일은 시그널 배열이거나 `{"signals": [...]}` 형태입니다.
//!
//! 식별 필드가 빠진 레코드가 하나라도 있으면 배치 전체를 거부합니다.
//! 일부만 반영한 상태로 신규 시그널을 계산하면 사라진 시그널로 오인해 끄게 되기 때문입니다.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};
use trader_core::{RawSignal, Signal};

use crate::error::{DataError, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum SignalFile {
    List(Vec<RawSignal>),
    Wrapped { signals: Vec<RawSignal> },
}

/// JSON 문자열을 시그널 배치로 변환합니다.
///
/// `source`는 에러 메시지에 표시할 출처입니다.
pub fn parse_signal_batch(source: &str, json: &str) -> Result<Vec<Signal>> {
    let file: SignalFile = serde_json::from_str(json).map_err(|e| DataError::Parse {
        path: source.to_string(),
        message: e.to_string(),
    })?;
    let raw = match file {
        SignalFile::List(list) => list,
        SignalFile::Wrapped { signals } => signals,
    };

    raw.into_iter()
        .enumerate()
        .map(|(index, record)| {
            Signal::try_from(record).map_err(|source_err| DataError::InvalidSignal {
                path: source.to_string(),
                index,
                source: source_err,
            })
        })
        .collect()
}

/// 디렉터리의 모든 `*.json` 파일을 파일명 순서로 읽어 하나의 배치로 합칩니다.
pub async fn read_signal_dir(dir: &Path) -> Result<Vec<Signal>> {
    let io_err = |path: &Path, e: std::io::Error| DataError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| io_err(dir, e))?;
    let mut files: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(dir, e))? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            files.push(path);
        }
    }
    files.sort();

    let mut signals = Vec::new();
    for path in &files {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| io_err(path, e))?;
        let batch = parse_signal_batch(&path.display().to_string(), &content)?;
        debug!(file = %path.display(), count = batch.len(), "시그널 파일 읽기");
        signals.extend(batch);
    }

    info!(
        dir = %dir.display(),
        files = files.len(),
        signals = signals.len(),
        "시그널 디렉터리 읽기 완료"
    );
    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trader_core::SignalError;

    const BATCH: &str = r#"[
        {"coinPair": "btcusdt", "timeFrame": "4h", "tradeType": "BUY", "pattern": "Ascending Triangle",
         "timeOfSignal": "2024-03-01T08:00:00Z", "priceAtTimeOfSignal": 61000.5,
         "priceTarget": "64000", "priceTargetTime": "2024-03-03T08:00:00Z", "profitPotentialPercent": 4.9},
        {"coinPair": "ETHUSDT", "timeFrame": "1h", "tradeType": "SELL", "pattern": "Rising Wedge",
         "time": "2024-03-01T09:00:00Z"}
    ]"#;

    #[test]
    fn test_parse_list() {
        let signals = parse_signal_batch("batch.json", BATCH).unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].coin_pair(), "BTCUSDT");
        assert_eq!(signals[0].price_target, Some(dec!(64000)));
        assert!(signals[0].is_signal_on);
        assert_eq!(signals[1].price_at_time_of_signal, dec!(0));
    }

    #[test]
    fn test_parse_wrapped() {
        let json = format!(r#"{{"signals": {BATCH}}}"#);
        assert_eq!(parse_signal_batch("wrapped.json", &json).unwrap().len(), 2);
    }

    #[test]
    fn test_one_bad_record_rejects_batch() {
        let json = r#"[
            {"coinPair": "BTCUSDT", "timeFrame": "4h", "tradeType": "BUY", "pattern": "Flag",
             "timeOfSignal": "2024-03-01T08:00:00Z"},
            {"coinPair": "ETHUSDT", "tradeType": "BUY", "pattern": "Flag",
             "timeOfSignal": "2024-03-01T08:00:00Z"}
        ]"#;
        let err = parse_signal_batch("bad.json", json).unwrap_err();
        match err {
            DataError::InvalidSignal { index, source, .. } => {
                assert_eq!(index, 1);
                assert_eq!(source, SignalError::MissingField("timeFrame"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            parse_signal_batch("x.json", "{not json"),
            Err(DataError::Parse { .. })
        ));
    }
}
