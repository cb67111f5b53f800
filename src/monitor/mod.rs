//! Position monitoring
//!
//! One watch-loop per open position: polls market snapshots, evaluates
//! exit rules against the ledger, and realizes partial or full exits
//! through the execution gateway.

pub mod position;
pub mod shutdown;

pub use position::{ExitReason, ExitRules, MonitorState, PositionMonitor, TickAction, TickContext};
pub use shutdown::{sell_all_positions, SweepSummary};
