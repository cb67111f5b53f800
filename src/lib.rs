//! Memebot Library
//!
//! Solana memecoin trading bot: DexScreener discovery, heuristic entry
//! scoring, score-tiered exit strategies, and per-position monitoring.

pub mod cli;
pub mod config;
pub mod dexscreener;
pub mod error;
pub mod ledger;
pub mod monitor;
pub mod scorer;
pub mod strategy;
pub mod trading;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
