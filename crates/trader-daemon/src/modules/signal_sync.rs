//! 시그널 동기화 모듈.
//!
//! 시그널 디렉터리의 JSON 파일을 읽어 저장된 시그널과 비교합니다.
//! 신규 시그널은 저장하고, 소스에서 사라진 활성 시그널은 비활성화합니다.

use std::time::Instant;

use tracing::{error, info, warn};
use trader_core::{compute_delta, missing_from, ExitReason};
use trader_data::read_signal_dir;

use crate::app::App;
use crate::Result;

/// 동기화 통계.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SignalSyncStats {
    /// 소스에서 읽은 시그널 수
    pub read: usize,
    /// 신규 저장 수
    pub inserted: u64,
    /// 비활성화 수
    pub switched_off: usize,
    /// 비활성화 실패 수
    pub failed: usize,
}

/// 시그널 소스 동기화.
///
/// 소스 파일 하나라도 형식이 잘못되면 아무것도 저장하지 않고 에러를 반환합니다.
/// 소스가 비어 있으면 일시적인 소스 장애로 보고 비활성화를 건너뜁니다.
pub async fn sync_signals(app: &App) -> Result<SignalSyncStats> {
    let start = Instant::now();
    let mut stats = SignalSyncStats::default();

    let candidates = read_signal_dir(&app.config.signal_dir).await?;
    stats.read = candidates.len();

    let known = app.store.all_signals().await?;
    let delta = compute_delta(&known, &candidates);
    if !delta.is_empty() {
        stats.inserted = app.store.insert_signals(&delta).await?;
        for signal in &delta {
            info!(signal = %signal.identity(), price = %signal.price_at_time_of_signal, "신규 시그널");
        }
    }

    if candidates.is_empty() {
        warn!(dir = %app.config.signal_dir.display(), "시그널 소스가 비어 있음, 비활성화 건너뜀");
    } else {
        let now = app.clock.now();
        for signal in missing_from(&known, &candidates) {
            match app
                .store
                .switch_off_signal(
                    signal.identity(),
                    ExitReason::RemovedFromSource.as_str(),
                    now,
                )
                .await
            {
                Ok(()) => {
                    stats.switched_off += 1;
                    info!(signal = %signal.identity(), "소스에서 사라진 시그널 비활성화");
                }
                Err(e) => {
                    stats.failed += 1;
                    error!(signal = %signal.identity(), error = %e, "시그널 비활성화 실패");
                }
            }
        }
    }

    info!(
        read = stats.read,
        inserted = stats.inserted,
        switched_off = stats.switched_off,
        failed = stats.failed,
        elapsed = format!("{:.1}s", start.elapsed().as_secs_f64()),
        "시그널 동기화 완료"
    );
    Ok(stats)
}
