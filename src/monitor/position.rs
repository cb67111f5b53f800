//! Per-position watch loop and exit rule evaluation
//!
//! The rule evaluation is a pure function over an explicit tick context
//! so the precedence table is testable without time or I/O. The monitor
//! itself is never killed by a transient error: a failed snapshot or
//! swap skips the tick and the loop continues.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::dexscreener::SnapshotProvider;
use crate::error::Result;
use crate::ledger::LedgerStore;
use crate::strategy::ExitStrategy;
use crate::trading::{ExecutionGateway, SwapRequest};

/// ROI above which the trend-reversal guard is considered
const TREND_GUARD_MIN_ROI: f64 = 10.0;

/// Price drop over the sample window that counts as a reversal
const TREND_GUARD_DROP_PCT: f64 = 10.0;

/// Monitor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Polling and evaluating exit rules
    Active,
    /// Sell in flight
    Exiting,
    /// No tokens left or a terminal exit fired
    Closed,
    /// Balance drained to zero outside this monitor
    Abandoned,
}

/// Why a sale was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StagedExit,
    TrailingStop,
    TakeProfit,
    StopLoss,
    MaxHoldTime,
    TrendReversal,
}

/// Outcome of one sell attempt through the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SellResult {
    Sold,
    Failed,
    /// Token flagged permanently; no further trades may be attempted
    Scam,
}

/// At most one action per tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickAction {
    /// Fire one staged-exit step: sell `portion` of current holdings
    StagedSell { step: usize, portion: f64 },
    /// Arm the trailing stop, no sale
    ArmTrailing,
    /// Sell 100% of remaining and close
    SellAll(ExitReason),
    /// Trend-reversal guard: sell half and ratchet the stop-loss
    TrendTrim,
}

/// Inputs to one rule evaluation
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    /// Percentage return at the current price vs ledger average cost
    pub roi: f64,
    /// Percentage distance from the running high, always <= 0
    pub drop_from_high_pct: f64,
    /// Time since first purchase
    pub elapsed: Duration,
    /// Price drop over the trailing sample window, positive = falling
    pub trend_drop_pct: f64,
}

/// Exit rule state for one position.
///
/// Owns the per-position rule bookkeeping: which staged steps have
/// fired, whether the trailing stop is armed, and the (ratchetable)
/// effective stop-loss.
#[derive(Debug, Clone)]
pub struct ExitRules {
    strategy: ExitStrategy,
    /// Effective stop-loss; only ever ratchets upward
    stop_loss_pct: f64,
    fired: Vec<bool>,
    trailing_armed: bool,
}

impl ExitRules {
    pub fn new(strategy: ExitStrategy) -> Self {
        let stop_loss_pct = strategy.stop_loss_pct;
        let fired = vec![false; strategy.staged_exits.len()];
        Self {
            strategy,
            stop_loss_pct,
            fired,
            trailing_armed: false,
        }
    }

    pub fn strategy(&self) -> &ExitStrategy {
        &self.strategy
    }

    pub fn trailing_armed(&self) -> bool {
        self.trailing_armed
    }

    pub fn effective_stop_loss(&self) -> f64 {
        self.stop_loss_pct
    }

    /// Evaluate the precedence table; pure, mutates nothing.
    ///
    /// Staged steps only fire below the take-profit target: once ROI
    /// reaches the final take-profit the full close wins over any
    /// remaining partial step.
    pub fn decide(&self, ctx: &TickContext) -> Option<TickAction> {
        // a. staged exits, one step per tick
        if ctx.roi < self.strategy.take_profit_pct {
            for (i, step) in self.strategy.staged_exits.iter().enumerate() {
                if !self.fired[i] && ctx.roi >= step.trigger_pct {
                    return Some(TickAction::StagedSell {
                        step: i,
                        portion: step.sell_portion,
                    });
                }
            }
        }

        // b. trailing-stop activation
        if !self.trailing_armed && ctx.roi >= self.strategy.trailing_stop_activation_pct {
            return Some(TickAction::ArmTrailing);
        }

        // c. trailing-stop trigger
        if self.trailing_armed && ctx.drop_from_high_pct <= -self.strategy.trailing_stop_pct {
            return Some(TickAction::SellAll(ExitReason::TrailingStop));
        }

        // d. take-profit final
        if ctx.roi >= self.strategy.take_profit_pct {
            return Some(TickAction::SellAll(ExitReason::TakeProfit));
        }

        // e. stop-loss (possibly ratcheted above its configured level)
        if ctx.roi <= self.stop_loss_pct {
            return Some(TickAction::SellAll(ExitReason::StopLoss));
        }

        // f. max holding time
        if ctx.elapsed >= self.strategy.max_holding_time() {
            return Some(TickAction::SellAll(ExitReason::MaxHoldTime));
        }

        // g. trend-reversal guard
        if ctx.roi > TREND_GUARD_MIN_ROI && ctx.trend_drop_pct > TREND_GUARD_DROP_PCT {
            return Some(TickAction::TrendTrim);
        }

        None
    }

    /// Mark a staged step as fired (call after the sale succeeds)
    pub fn mark_step_fired(&mut self, step: usize) {
        if let Some(flag) = self.fired.get_mut(step) {
            *flag = true;
        }
    }

    pub fn arm_trailing(&mut self) {
        self.trailing_armed = true;
    }

    /// Tighten the stop-loss; never loosens
    pub fn ratchet_stop_loss(&mut self, candidate: f64) {
        if candidate > self.stop_loss_pct {
            self.stop_loss_pct = candidate;
        }
    }
}

/// Watch-loop for one open position
pub struct PositionMonitor {
    token_address: String,
    ledger: Arc<LedgerStore>,
    provider: Arc<dyn SnapshotProvider>,
    gateway: Arc<dyn ExecutionGateway>,
    rules: ExitRules,
    poll_interval: Duration,
    trend_window: Duration,
    slippage_pct: f64,
    dry_run: bool,
    state: MonitorState,
    /// Running maximum observed price; never decreases while active
    highest_price: f64,
    /// Recent (timestamp, price) samples for the trend-reversal guard
    samples: VecDeque<(DateTime<Utc>, f64)>,
    /// True once this monitor sold the position down to zero itself
    sold_out: bool,
}

impl PositionMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        token_address: &str,
        strategy: ExitStrategy,
        ledger: Arc<LedgerStore>,
        provider: Arc<dyn SnapshotProvider>,
        gateway: Arc<dyn ExecutionGateway>,
        config: &MonitorConfig,
        slippage_pct: f64,
        dry_run: bool,
    ) -> Self {
        Self {
            token_address: token_address.to_string(),
            ledger,
            provider,
            gateway,
            rules: ExitRules::new(strategy),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            trend_window: Duration::from_secs(config.trend_window_secs),
            slippage_pct,
            dry_run,
            state: MonitorState::Active,
            highest_price: 0.0,
            samples: VecDeque::new(),
            sold_out: false,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn highest_price(&self) -> f64 {
        self.highest_price
    }

    pub fn rules(&self) -> &ExitRules {
        &self.rules
    }

    /// Run until the position closes or the token is cancelled.
    ///
    /// Cancellation is deterministic: once the token fires, no further
    /// ledger writes originate from this monitor.
    pub async fn run(mut self, cancel: CancellationToken) -> MonitorState {
        info!(
            "Monitoring {} ({:?} tier, poll {:?})",
            self.token_address,
            self.rules.strategy().tier,
            self.poll_interval
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Monitor for {} cancelled", self.token_address);
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => {
                            warn!("Tick failed for {}: {}", self.token_address, e);
                        }
                    }
                }
            }
        }

        info!(
            "Monitor for {} finished in state {:?}",
            self.token_address, self.state
        );
        self.state
    }

    /// One poll cycle. Returns true when monitoring is finished.
    pub async fn tick(&mut self) -> Result<bool> {
        // Re-read holdings from the ledger every tick; amounts are
        // never cached across polls.
        let position = match self.ledger.get_position(&self.token_address).await {
            Some(p) => p,
            None => {
                warn!("Position {} missing from ledger", self.token_address);
                self.state = MonitorState::Abandoned;
                return Ok(true);
            }
        };

        if position.scam {
            self.state = MonitorState::Closed;
            return Ok(true);
        }

        if position.is_closed() {
            self.state = if self.sold_out {
                MonitorState::Closed
            } else {
                MonitorState::Abandoned
            };
            return Ok(true);
        }

        // A single missing snapshot skips the tick, nothing more
        let snapshot = match self.provider.snapshot(&self.token_address).await {
            Ok(Some(s)) => s,
            Ok(None) => {
                debug!("No snapshot for {}, skipping tick", self.token_address);
                return Ok(false);
            }
            Err(e) => {
                debug!("Snapshot error for {}: {}, skipping tick", self.token_address, e);
                return Ok(false);
            }
        };

        let price = snapshot.price_native;
        if price <= 0.0 {
            return Ok(false);
        }

        if price > self.highest_price {
            self.highest_price = price;
        }
        self.record_sample(snapshot.observed_at, price);

        let roi = position.roi_at(price);
        let drop_from_high_pct = if self.highest_price > 0.0 {
            ((price - self.highest_price) / self.highest_price) * 100.0
        } else {
            0.0
        };
        let elapsed = (snapshot.observed_at - position.first_purchase_time)
            .to_std()
            .unwrap_or_default();

        let ctx = TickContext {
            roi,
            drop_from_high_pct,
            elapsed,
            trend_drop_pct: self.trend_drop_pct(price),
        };

        let action = match self.rules.decide(&ctx) {
            Some(action) => action,
            None => return Ok(false),
        };

        debug!(
            "{}: roi {:.2}%, drop {:.2}%, action {:?}",
            self.token_address, roi, drop_from_high_pct, action
        );

        match action {
            TickAction::ArmTrailing => {
                self.rules.arm_trailing();
                info!(
                    "Trailing stop armed for {} at roi {:.2}%",
                    self.token_address, roi
                );
                Ok(false)
            }
            TickAction::StagedSell { step, portion } => {
                let amount = position.current_amount * portion;
                match self.execute_sell(amount, ExitReason::StagedExit).await? {
                    SellResult::Sold => {
                        self.rules.mark_step_fired(step);
                        info!(
                            "Staged exit {} fired for {} at roi {:.2}%",
                            step, self.token_address, roi
                        );
                        Ok(false)
                    }
                    SellResult::Failed => Ok(false),
                    SellResult::Scam => {
                        self.state = MonitorState::Closed;
                        Ok(true)
                    }
                }
            }
            TickAction::TrendTrim => {
                let amount = position.current_amount * 0.5;
                match self.execute_sell(amount, ExitReason::TrendReversal).await? {
                    SellResult::Sold => {
                        self.rules.ratchet_stop_loss(roi * 0.5);
                        info!(
                            "Trend reversal trim for {}; stop-loss ratcheted to {:.2}%",
                            self.token_address,
                            self.rules.effective_stop_loss()
                        );
                        Ok(false)
                    }
                    SellResult::Failed => Ok(false),
                    SellResult::Scam => {
                        self.state = MonitorState::Closed;
                        Ok(true)
                    }
                }
            }
            TickAction::SellAll(reason) => {
                self.state = MonitorState::Exiting;
                match self.execute_sell(position.current_amount, reason).await? {
                    SellResult::Sold => {
                        self.sold_out = true;
                        self.state = MonitorState::Closed;
                        info!("Position {} closed: {:?}", self.token_address, reason);
                        Ok(true)
                    }
                    SellResult::Scam => {
                        self.state = MonitorState::Closed;
                        Ok(true)
                    }
                    SellResult::Failed => {
                        // Failed sell: stay active and retry next qualifying tick
                        self.state = MonitorState::Active;
                        Ok(false)
                    }
                }
            }
        }
    }

    /// Execute one sell through the gateway and record it.
    ///
    /// A scam detection is terminal for the token: it is recorded
    /// permanently and the caller must stop monitoring, whatever rule
    /// triggered the sale.
    async fn execute_sell(&mut self, amount: f64, reason: ExitReason) -> Result<SellResult> {
        if amount <= 0.0 {
            return Ok(SellResult::Failed);
        }

        let request = SwapRequest::sell(&self.token_address, amount, self.slippage_pct);
        match self.gateway.swap(&request).await {
            Ok(receipt) => {
                let metadata = serde_json::json!({
                    "reason": reason,
                    "signature": receipt.signature,
                });
                self.ledger
                    .record_sell(
                        &self.token_address,
                        amount,
                        receipt.output_amount,
                        Some(metadata),
                        self.dry_run,
                    )
                    .await?;
                Ok(SellResult::Sold)
            }
            Err(e) if e.is_scam() => {
                warn!("Scam detected for {}: {}", self.token_address, e);
                self.ledger.record_scam(&self.token_address).await?;
                Ok(SellResult::Scam)
            }
            Err(e) => {
                warn!("Sell failed for {}: {}", self.token_address, e);
                Ok(SellResult::Failed)
            }
        }
    }

    fn record_sample(&mut self, at: DateTime<Utc>, price: f64) {
        self.samples.push_back((at, price));
        let window =
            chrono::Duration::from_std(self.trend_window).unwrap_or_else(|_| chrono::Duration::zero());
        while let Some((ts, _)) = self.samples.front() {
            if at - *ts > window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Drop from the oldest in-window sample to the current price,
    /// positive when the price is falling
    fn trend_drop_pct(&self, current: f64) -> f64 {
        match self.samples.front() {
            Some((_, oldest)) if *oldest > 0.0 => ((oldest - current) / oldest) * 100.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::select_strategy;

    fn ctx(roi: f64) -> TickContext {
        TickContext {
            roi,
            drop_from_high_pct: 0.0,
            elapsed: Duration::from_secs(60),
            trend_drop_pct: 0.0,
        }
    }

    fn balanced_rules() -> ExitRules {
        // score 65 -> balanced: TP 50, SL -20, stages {15,30,50}
        ExitRules::new(select_strategy(65.0))
    }

    #[test]
    fn test_no_action_near_entry() {
        let rules = balanced_rules();
        assert_eq!(rules.decide(&ctx(5.0)), None);
        assert_eq!(rules.decide(&ctx(-5.0)), None);
    }

    #[test]
    fn test_staged_exit_fires_in_order() {
        let rules = balanced_rules();
        assert_eq!(
            rules.decide(&ctx(20.0)),
            Some(TickAction::StagedSell { step: 0, portion: 0.25 })
        );
    }

    #[test]
    fn test_staged_exit_fires_at_most_once() {
        let mut rules = balanced_rules();
        rules.mark_step_fired(0);

        // ROI still above the first trigger across many ticks; the
        // fired step stays quiet and the next one takes over at 30
        assert_eq!(rules.decide(&ctx(20.0)), None);
        assert_eq!(rules.decide(&ctx(22.0)), None);
        assert_eq!(
            rules.decide(&ctx(31.0)),
            Some(TickAction::StagedSell { step: 1, portion: 0.35 })
        );
    }

    #[test]
    fn test_one_staged_step_per_tick() {
        let rules = balanced_rules();
        // ROI past two triggers at once: only the first unfired fires
        assert_eq!(
            rules.decide(&ctx(35.0)),
            Some(TickAction::StagedSell { step: 0, portion: 0.25 })
        );
    }

    #[test]
    fn test_take_profit_beats_remaining_stages() {
        let mut rules = balanced_rules();
        rules.mark_step_fired(0);
        rules.mark_step_fired(1);

        // roi 51 >= TP 50: full close wins over the unfired 50% stage
        assert_eq!(
            rules.decide(&ctx(51.0)),
            Some(TickAction::SellAll(ExitReason::TakeProfit))
        );
    }

    #[test]
    fn test_trailing_arms_then_triggers() {
        let mut rules = balanced_rules();
        rules.mark_step_fired(0);
        rules.mark_step_fired(1);

        // Activation at +25
        assert_eq!(rules.decide(&ctx(26.0)), Some(TickAction::ArmTrailing));
        rules.arm_trailing();

        // No trigger while close to the high
        let mut c = ctx(26.0);
        c.drop_from_high_pct = -5.0;
        assert_eq!(rules.decide(&c), None);

        // 15% retreat from high fires
        c.drop_from_high_pct = -15.0;
        assert_eq!(
            rules.decide(&c),
            Some(TickAction::SellAll(ExitReason::TrailingStop))
        );
    }

    #[test]
    fn test_stop_loss() {
        let rules = balanced_rules();
        assert_eq!(
            rules.decide(&ctx(-25.0)),
            Some(TickAction::SellAll(ExitReason::StopLoss))
        );
    }

    #[test]
    fn test_max_hold_time() {
        let rules = balanced_rules();
        let mut c = ctx(2.0);
        c.elapsed = Duration::from_secs(91 * 60);
        assert_eq!(
            rules.decide(&c),
            Some(TickAction::SellAll(ExitReason::MaxHoldTime))
        );
    }

    #[test]
    fn test_trend_reversal_guard() {
        let mut rules = balanced_rules();
        rules.mark_step_fired(0);

        let mut c = ctx(12.0);
        c.trend_drop_pct = 12.0;
        assert_eq!(rules.decide(&c), Some(TickAction::TrendTrim));

        // Not in enough profit: guard stays quiet
        let mut c = ctx(8.0);
        c.trend_drop_pct = 12.0;
        assert_eq!(rules.decide(&c), None);
    }

    #[test]
    fn test_stop_loss_ratchet_never_loosens() {
        let mut rules = balanced_rules();
        assert_eq!(rules.effective_stop_loss(), -20.0);

        rules.ratchet_stop_loss(6.0);
        assert_eq!(rules.effective_stop_loss(), 6.0);

        // Attempts to loosen are ignored
        rules.ratchet_stop_loss(-20.0);
        rules.ratchet_stop_loss(2.0);
        assert_eq!(rules.effective_stop_loss(), 6.0);

        // Ratcheted stop now locks in profit
        assert_eq!(
            rules.decide(&ctx(5.0)),
            Some(TickAction::SellAll(ExitReason::StopLoss))
        );
    }
}
