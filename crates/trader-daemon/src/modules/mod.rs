//! 주기 작업 모듈.

pub mod entry;
pub mod exit_check;
pub mod price_scan;
pub mod signal_sync;
pub mod utils;

pub use entry::enter_signals;
pub use exit_check::{check_exits, force_exit};
pub use price_scan::{scan_price_levels, LevelScan};
pub use signal_sync::{sync_signals, SignalSyncStats};
