//! 시그널 데이터 계층.
//!
//! - `storage`: `SignalStore` 구현 (PostgreSQL, 인메모리)
//! - `signal_file`: 시그널 소스 JSON 파일 읽기
//! - `database`: 연결 풀과 마이그레이션

pub mod database;
pub mod error;
pub mod signal_file;
pub mod storage;

pub use database::{Database, DatabaseConfig};
pub use error::{DataError, Result};
pub use signal_file::{parse_signal_batch, read_signal_dir};
pub use storage::{InMemorySignalStore, PgSignalStore, StoreWrite};
