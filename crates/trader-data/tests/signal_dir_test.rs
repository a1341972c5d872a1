//! 시그널 디렉터리 읽기 통합 테스트.

use std::fs;

use trader_data::{read_signal_dir, DataError};

const FIRST: &str = r#"[
    {"coinPair": "BTCUSDT", "timeFrame": "4h", "tradeType": "BUY", "pattern": "Flag",
     "timeOfSignal": "2024-03-01T08:00:00Z", "priceAtTimeOfSignal": "61000"}
]"#;

const SECOND: &str = r#"{"signals": [
    {"coinPair": "ETHUSDT", "timeFrame": "1h", "tradeType": "BUY", "pattern": "Wedge",
     "timeOfSignal": "2024-03-01T09:00:00Z", "priceAtTimeOfSignal": 3400}
]}"#;

#[tokio::test]
async fn test_reads_json_files_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b.json"), SECOND).unwrap();
    fs::write(dir.path().join("a.json"), FIRST).unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let signals = read_signal_dir(dir.path()).await.unwrap();
    let pairs: Vec<&str> = signals.iter().map(|s| s.coin_pair()).collect();
    assert_eq!(pairs, vec!["BTCUSDT", "ETHUSDT"]);
}

#[tokio::test]
async fn test_bad_file_fails_whole_read() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.json"), FIRST).unwrap();
    fs::write(
        dir.path().join("b.json"),
        r#"[{"coinPair": "ETHUSDT", "timeFrame": "1h", "tradeType": "HOLD", "pattern": "Flag",
             "timeOfSignal": "2024-03-01T09:00:00Z"}]"#,
    )
    .unwrap();

    let err = read_signal_dir(dir.path()).await.unwrap_err();
    assert!(matches!(err, DataError::InvalidSignal { index: 0, .. }));
}

#[tokio::test]
async fn test_missing_dir_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(matches!(
        read_signal_dir(&missing).await,
        Err(DataError::Io { .. })
    ));
}
