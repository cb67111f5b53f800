//! Execution gateway trait and dry-run implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::dexscreener::SnapshotProvider;
use crate::error::{Error, Result};

/// Swap direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapDirection {
    Buy,
    Sell,
}

/// A swap order.
///
/// `amount` is denominated in SOL for buys and in tokens for sells.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
    pub direction: SwapDirection,
    pub token_address: String,
    pub amount: f64,
    pub slippage_pct: f64,
}

impl SwapRequest {
    pub fn buy(token_address: &str, sol_amount: f64, slippage_pct: f64) -> Self {
        Self {
            direction: SwapDirection::Buy,
            token_address: token_address.to_string(),
            amount: sol_amount,
            slippage_pct,
        }
    }

    pub fn sell(token_address: &str, token_amount: f64, slippage_pct: f64) -> Self {
        Self {
            direction: SwapDirection::Sell,
            token_address: token_address.to_string(),
            amount: token_amount,
            slippage_pct,
        }
    }
}

/// Realized result of a swap.
///
/// `output_amount` is tokens received for buys, SOL received for sells.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapReceipt {
    pub output_amount: f64,
    pub signature: String,
}

/// Opaque, possibly-failing swap executor.
///
/// A scam token (non-executable program, invalid account owner)
/// surfaces as `Error::ScamDetected` and must never be retried.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    async fn swap(&self, request: &SwapRequest) -> Result<SwapReceipt>;
}

/// Dry-run gateway that fills orders at the current snapshot price
pub struct SimulatedGateway {
    provider: Arc<dyn SnapshotProvider>,
    fill_counter: AtomicU64,
}

impl SimulatedGateway {
    pub fn new(provider: Arc<dyn SnapshotProvider>) -> Self {
        Self {
            provider,
            fill_counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl ExecutionGateway for SimulatedGateway {
    async fn swap(&self, request: &SwapRequest) -> Result<SwapReceipt> {
        let snapshot = self
            .provider
            .snapshot(&request.token_address)
            .await?
            .ok_or_else(|| Error::SwapFailed(format!("no pair for {}", request.token_address)))?;

        if snapshot.price_native <= 0.0 {
            return Err(Error::SwapFailed(format!(
                "no price for {}",
                request.token_address
            )));
        }

        let output_amount = match request.direction {
            SwapDirection::Buy => request.amount / snapshot.price_native,
            SwapDirection::Sell => request.amount * snapshot.price_native,
        };

        let n = self.fill_counter.fetch_add(1, Ordering::SeqCst);
        let receipt = SwapReceipt {
            output_amount,
            signature: format!("dry-run-{}", n),
        };

        info!(
            "Simulated {:?} of {}: {} in, {} out",
            request.direction, request.token_address, request.amount, receipt.output_amount
        );

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::dexscreener::PairSnapshot;

    struct FixedPriceProvider {
        price: f64,
    }

    #[async_trait]
    impl SnapshotProvider for FixedPriceProvider {
        async fn snapshot(&self, token: &str) -> Result<Option<PairSnapshot>> {
            let now = Utc::now();
            Ok(Some(PairSnapshot {
                token_address: token.to_string(),
                token_name: "Test".to_string(),
                token_symbol: "TEST".to_string(),
                price_native: self.price,
                price_usd: self.price * 150.0,
                liquidity_usd: 10_000.0,
                volume_h24: 5_000.0,
                change_m5: 0.0,
                change_h1: 0.0,
                change_h24: 0.0,
                buys_m5: 0,
                sells_m5: 0,
                buys_h1: 0,
                sells_h1: 0,
                pair_created_at: now,
                observed_at: now,
            }))
        }
    }

    #[tokio::test]
    async fn test_simulated_buy_fills_at_quote() {
        let gateway = SimulatedGateway::new(Arc::new(FixedPriceProvider { price: 0.001 }));

        let receipt = gateway
            .swap(&SwapRequest::buy("mint", 1.0, 5.0))
            .await
            .unwrap();
        assert!((receipt.output_amount - 1000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_simulated_sell_fills_at_quote() {
        let gateway = SimulatedGateway::new(Arc::new(FixedPriceProvider { price: 0.002 }));

        let receipt = gateway
            .swap(&SwapRequest::sell("mint", 500.0, 5.0))
            .await
            .unwrap();
        assert!((receipt.output_amount - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_signatures_are_unique() {
        let gateway = SimulatedGateway::new(Arc::new(FixedPriceProvider { price: 0.001 }));

        let a = gateway.swap(&SwapRequest::buy("mint", 0.1, 5.0)).await.unwrap();
        let b = gateway.swap(&SwapRequest::buy("mint", 0.1, 5.0)).await.unwrap();
        assert_ne!(a.signature, b.signature);
    }
}
