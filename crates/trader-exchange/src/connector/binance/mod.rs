//! Binance Spot 커넥터.

mod client;
pub mod models;

pub use client::{BinanceClient, BinanceConfig, NewOrder, BINANCE_API_URL};
