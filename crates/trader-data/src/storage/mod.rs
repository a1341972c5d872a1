//! `SignalStore` 구현체.

mod memory;
mod postgres;

pub use memory::{InMemorySignalStore, StoreWrite};
pub use postgres::PgSignalStore;
