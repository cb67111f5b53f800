//! Position and transaction records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// A single executed trade, immutable once appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub side: TradeSide,
    /// Token quantity
    pub amount: f64,
    /// Quote-currency value of the trade
    pub price_sol: f64,
    /// price_sol / amount, 0 when amount is 0
    pub price_per_token: f64,
    pub timestamp: DateTime<Utc>,
    /// SELL only: percentage return against the weighted-average buy
    /// price in effect at the moment of sale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roi: Option<f64>,
    #[serde(default)]
    pub is_dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Transaction {
    fn new(side: TradeSide, amount: f64, price_sol: f64, timestamp: DateTime<Utc>) -> Self {
        let price_per_token = if amount > 0.0 { price_sol / amount } else { 0.0 };
        Self {
            side,
            amount,
            price_sol,
            price_per_token,
            timestamp,
            roi: None,
            is_dry_run: false,
            metadata: None,
        }
    }
}

/// Result of applying a sell to a position
#[derive(Debug, Clone, PartialEq)]
pub struct SellOutcome {
    /// Quantity actually sold (clamped to available holdings)
    pub amount_sold: f64,
    pub sol_received: f64,
    pub roi: f64,
    pub remaining_amount: f64,
    /// True if the request exceeded holdings and was clamped
    pub clamped: bool,
}

/// The bot's holding of a single token, with cost basis and history.
///
/// Created on first buy and never deleted; a position with zero
/// `current_amount` is closed but kept for historical analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub token_address: String,
    pub token_name: String,
    /// Cumulative quantity bought over the position's lifetime
    pub initial_amount: f64,
    /// Quantity currently held
    pub current_amount: f64,
    /// Cumulative SOL spent on buys
    pub initial_investment: f64,
    /// Cumulative quantity sold
    pub total_sold: f64,
    /// Cumulative SOL received from sells
    pub total_received: f64,
    /// initial_investment / initial_amount; recomputed on buys only
    pub avg_buy_price: f64,
    /// total_received / total_sold
    pub avg_sell_price: f64,
    /// Permanently flagged non-tradable token
    #[serde(default)]
    pub scam: bool,
    pub first_purchase_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    /// Chronological, append-only trade history
    pub transactions: Vec<Transaction>,
}

impl Position {
    pub fn new(token_address: &str, token_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            token_address: token_address.to_string(),
            token_name: token_name.to_string(),
            initial_amount: 0.0,
            current_amount: 0.0,
            initial_investment: 0.0,
            total_sold: 0.0,
            total_received: 0.0,
            avg_buy_price: 0.0,
            avg_sell_price: 0.0,
            scam: false,
            first_purchase_time: now,
            last_update_time: now,
            transactions: Vec::new(),
        }
    }

    /// Position holds no tokens
    pub fn is_closed(&self) -> bool {
        self.current_amount <= 0.0
    }

    /// Percentage return at a given price relative to average cost
    pub fn roi_at(&self, price: f64) -> f64 {
        if self.avg_buy_price > 0.0 {
            ((price - self.avg_buy_price) / self.avg_buy_price) * 100.0
        } else {
            0.0
        }
    }

    /// Apply a buy, recomputing the weighted-average cost
    pub fn apply_buy(
        &mut self,
        token_amount: f64,
        sol_spent: f64,
        now: DateTime<Utc>,
        dry_run: bool,
    ) {
        self.initial_amount += token_amount;
        self.current_amount += token_amount;
        self.initial_investment += sol_spent;
        if self.initial_amount > 0.0 {
            self.avg_buy_price = self.initial_investment / self.initial_amount;
        }
        self.last_update_time = now;

        let mut tx = Transaction::new(TradeSide::Buy, token_amount, sol_spent, now);
        tx.is_dry_run = dry_run;
        self.transactions.push(tx);
    }

    /// Apply a sell, clamping over-requests to current holdings.
    ///
    /// ROI is computed against `avg_buy_price` before any mutation;
    /// sells never change the average buy price.
    pub fn apply_sell(
        &mut self,
        amount_requested: f64,
        sol_received: f64,
        now: DateTime<Utc>,
        metadata: Option<serde_json::Value>,
        dry_run: bool,
    ) -> SellOutcome {
        let clamped = amount_requested > self.current_amount;
        let amount_sold = amount_requested.min(self.current_amount).max(0.0);

        let price_per_token = if amount_sold > 0.0 {
            sol_received / amount_sold
        } else {
            0.0
        };
        let roi = self.roi_at(price_per_token);

        self.current_amount -= amount_sold;
        self.total_sold += amount_sold;
        self.total_received += sol_received;
        if self.total_sold > 0.0 {
            self.avg_sell_price = self.total_received / self.total_sold;
        }
        self.last_update_time = now;

        let mut tx = Transaction::new(TradeSide::Sell, amount_sold, sol_received, now);
        tx.roi = Some(roi);
        tx.is_dry_run = dry_run;
        tx.metadata = metadata;
        self.transactions.push(tx);

        SellOutcome {
            amount_sold,
            sol_received,
            roi,
            remaining_amount: self.current_amount,
            clamped,
        }
    }
}

/// Global monotonic accumulators, updated atomically with each write
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_invested: f64,
    pub total_returned: f64,
    pub successful_trades: u64,
    pub failed_trades: u64,
}

impl LedgerStats {
    /// Net realized result across all positions
    pub fn net_sol(&self) -> f64 {
        self.total_returned - self.total_invested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buy(pos: &mut Position, amount: f64, sol: f64) {
        pos.apply_buy(amount, sol, Utc::now(), false);
    }

    #[test]
    fn test_weighted_average_over_buys() {
        let mut pos = Position::new("mint", "Test", Utc::now());

        buy(&mut pos, 1000.0, 1.0);
        assert!((pos.avg_buy_price - 0.001).abs() < 1e-9);

        buy(&mut pos, 1000.0, 3.0);
        assert!((pos.initial_amount - 2000.0).abs() < 1e-9);
        assert!((pos.initial_investment - 4.0).abs() < 1e-9);
        assert!((pos.avg_buy_price - 0.002).abs() < 1e-9);
    }

    #[test]
    fn test_avg_buy_price_invariant_over_sequences() {
        let mut pos = Position::new("mint", "Test", Utc::now());
        let buys = [(500.0, 0.4), (1200.0, 2.2), (10.0, 0.05), (3000.0, 1.0)];

        for (amount, sol) in buys {
            buy(&mut pos, amount, sol);
            let expected = pos.initial_investment / pos.initial_amount;
            assert!((pos.avg_buy_price - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sell_roi_against_cost_basis() {
        let mut pos = Position::new("mint", "Test", Utc::now());
        buy(&mut pos, 1000.0, 1.0); // avg 0.001

        // 500 tokens for 0.75 SOL = 0.0015 per token
        let outcome = pos.apply_sell(500.0, 0.75, Utc::now(), None, false);
        assert!((outcome.roi - 50.0).abs() < 1e-9);
        assert!((outcome.remaining_amount - 500.0).abs() < 1e-9);
        // Sell does not move the average buy price
        assert!((pos.avg_buy_price - 0.001).abs() < 1e-9);
    }

    #[test]
    fn test_roi_sign_consistency() {
        let mut pos = Position::new("mint", "Test", Utc::now());
        buy(&mut pos, 1000.0, 1.0);

        let profit = pos.apply_sell(100.0, 0.2, Utc::now(), None, false);
        assert!(profit.roi > 0.0);

        let loss = pos.apply_sell(100.0, 0.05, Utc::now(), None, false);
        assert!(loss.roi < 0.0);
    }

    #[test]
    fn test_over_request_clamped() {
        let mut pos = Position::new("mint", "Test", Utc::now());
        buy(&mut pos, 1000.0, 1.0);

        let outcome = pos.apply_sell(1200.0, 1.5, Utc::now(), None, false);
        assert!(outcome.clamped);
        assert!((outcome.amount_sold - 1000.0).abs() < 1e-9);
        assert_eq!(outcome.remaining_amount, 0.0);
        assert!(pos.current_amount >= 0.0);
        assert!(pos.is_closed());
    }

    #[test]
    fn test_holdings_never_negative() {
        let mut pos = Position::new("mint", "Test", Utc::now());
        let ops: [(bool, f64, f64); 6] = [
            (true, 100.0, 0.1),
            (false, 60.0, 0.08),
            (false, 500.0, 0.2), // over-request
            (true, 40.0, 0.02),
            (false, 39.0, 0.03),
            (false, 10.0, 0.01), // over-request again
        ];

        for (is_buy, amount, sol) in ops {
            if is_buy {
                buy(&mut pos, amount, sol);
            } else {
                pos.apply_sell(amount, sol, Utc::now(), None, false);
            }
            assert!(pos.current_amount >= 0.0);
        }
    }

    #[test]
    fn test_roi_uses_avg_price_at_sale_time() {
        let mut pos = Position::new("mint", "Test", Utc::now());
        buy(&mut pos, 1000.0, 1.0); // avg 0.001

        let first = pos.apply_sell(100.0, 0.15, Utc::now(), None, false);
        assert!((first.roi - 50.0).abs() < 1e-9);

        // A later buy moves the cost basis; subsequent sells use the new one
        buy(&mut pos, 900.0, 2.6); // avg = 3.6 / 1900
        let avg = 3.6 / 1900.0;
        let second = pos.apply_sell(100.0, 0.15, Utc::now(), None, false);
        let expected = ((0.0015 - avg) / avg) * 100.0;
        assert!((second.roi - expected).abs() < 1e-9);
    }

    #[test]
    fn test_transactions_append_only_in_order() {
        let mut pos = Position::new("mint", "Test", Utc::now());
        buy(&mut pos, 1000.0, 1.0);
        pos.apply_sell(200.0, 0.3, Utc::now(), None, false);
        buy(&mut pos, 100.0, 0.2);

        assert_eq!(pos.transactions.len(), 3);
        assert_eq!(pos.transactions[0].side, TradeSide::Buy);
        assert_eq!(pos.transactions[1].side, TradeSide::Sell);
        assert_eq!(pos.transactions[2].side, TradeSide::Buy);
        assert!(pos.transactions[1].roi.is_some());
        assert!(pos.transactions[2].roi.is_none());
    }

    #[test]
    fn test_price_per_token_zero_amount() {
        let tx = Transaction::new(TradeSide::Sell, 0.0, 0.0, Utc::now());
        assert_eq!(tx.price_per_token, 0.0);
    }
}
