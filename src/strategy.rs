//! Exit strategy selection
//!
//! Maps an entry score to a fixed exit-parameter tier. Higher-conviction
//! entries get wider profit targets and more staged exit levels; weak
//! entries get tight stops and fast exits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One staged-exit step: sell `sell_portion` of holdings once ROI
/// reaches `trigger_pct`. Each step fires at most once per position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StagedExit {
    pub trigger_pct: f64,
    /// Fraction of current holdings to sell, in (0, 1]
    pub sell_portion: f64,
}

/// Strategy tier name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Aggressive,
    Balanced,
    Conservative,
}

/// Complete exit-rule parameter set for one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitStrategy {
    pub tier: Tier,
    pub take_profit_pct: f64,
    /// Negative percentage
    pub stop_loss_pct: f64,
    pub max_holding_time_minutes: u64,
    pub trailing_stop_activation_pct: f64,
    pub trailing_stop_pct: f64,
    pub staged_exits: Vec<StagedExit>,
}

impl ExitStrategy {
    pub fn max_holding_time(&self) -> Duration {
        Duration::from_secs(self.max_holding_time_minutes * 60)
    }
}

/// Select the exit parameter set for an entry score
pub fn select_strategy(score: f64) -> ExitStrategy {
    if score >= 75.0 {
        ExitStrategy {
            tier: Tier::Aggressive,
            take_profit_pct: 90.0,
            stop_loss_pct: -15.0,
            max_holding_time_minutes: 120,
            trailing_stop_activation_pct: 30.0,
            trailing_stop_pct: 10.0,
            staged_exits: vec![
                StagedExit { trigger_pct: 20.0, sell_portion: 0.2 },
                StagedExit { trigger_pct: 40.0, sell_portion: 0.3 },
                StagedExit { trigger_pct: 60.0, sell_portion: 0.3 },
                StagedExit { trigger_pct: 90.0, sell_portion: 0.2 },
            ],
        }
    } else if score >= 60.0 {
        ExitStrategy {
            tier: Tier::Balanced,
            take_profit_pct: 50.0,
            stop_loss_pct: -20.0,
            max_holding_time_minutes: 90,
            trailing_stop_activation_pct: 25.0,
            trailing_stop_pct: 15.0,
            staged_exits: vec![
                StagedExit { trigger_pct: 15.0, sell_portion: 0.25 },
                StagedExit { trigger_pct: 30.0, sell_portion: 0.35 },
                StagedExit { trigger_pct: 50.0, sell_portion: 0.4 },
            ],
        }
    } else {
        ExitStrategy {
            tier: Tier::Conservative,
            take_profit_pct: 25.0,
            stop_loss_pct: -10.0,
            max_holding_time_minutes: 60,
            trailing_stop_activation_pct: 15.0,
            trailing_stop_pct: 8.0,
            staged_exits: vec![
                StagedExit { trigger_pct: 10.0, sell_portion: 0.5 },
                StagedExit { trigger_pct: 25.0, sell_portion: 0.5 },
            ],
        }
    }
}
