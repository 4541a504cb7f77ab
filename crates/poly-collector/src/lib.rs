//! Polymarket order book collector.
//!
//! Daemon that discovers active markets for configured series via the
//! Gamma API, opens one feed session per market, and records every book
//! snapshot and price change to JSONL files until each market ends.

pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
