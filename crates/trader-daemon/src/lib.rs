//! 시그널 자동매매 데몬.
//!
//! 주기 작업:
//! - 시그널 동기화 + 신규 시그널 진입
//! - 청산 조건 확인 및 포지션 정리
//! - 지지/저항 레벨 스캔

pub mod app;
pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use app::App;
pub use config::DaemonConfig;
pub use error::{DaemonError, Result};
pub use stats::WorkflowStats;
