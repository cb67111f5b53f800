//! Trade ledger
//!
//! Append-only record of buys and sells per token with derived
//! weighted-average cost and ROI accounting. The store is the single
//! source of truth for holdings; monitors re-read it before every
//! exit decision.

pub mod position;
pub mod store;

pub use position::{LedgerStats, Position, SellOutcome, TradeSide, Transaction};
pub use store::LedgerStore;
