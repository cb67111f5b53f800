//! Shutdown sell-sweep
//!
//! On process termination every open position is force-sold at market,
//! sequentially, tolerating individual failures. The caller guards
//! against running the sweep more than once.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::ledger::LedgerStore;
use crate::trading::{ExecutionGateway, SwapRequest};

/// Outcome of a shutdown sweep
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepSummary {
    pub sold: usize,
    pub failed: usize,
    pub total_proceeds_sol: f64,
}

/// Sell 100% of every open position, one at a time.
///
/// Individual failures are logged and counted; the sweep always runs
/// to completion.
pub async fn sell_all_positions(
    ledger: Arc<LedgerStore>,
    gateway: Arc<dyn ExecutionGateway>,
    slippage_pct: f64,
    dry_run: bool,
    inter_sale_delay: Duration,
) -> SweepSummary {
    let positions = ledger.open_positions().await;
    info!("Shutdown sweep: {} open positions to sell", positions.len());

    let mut summary = SweepSummary::default();

    for (i, position) in positions.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(inter_sale_delay).await;
        }

        let request = SwapRequest::sell(
            &position.token_address,
            position.current_amount,
            slippage_pct,
        );

        match gateway.swap(&request).await {
            Ok(receipt) => {
                let metadata = serde_json::json!({
                    "reason": "shutdown",
                    "signature": receipt.signature,
                });
                match ledger
                    .record_sell(
                        &position.token_address,
                        position.current_amount,
                        receipt.output_amount,
                        Some(metadata),
                        dry_run,
                    )
                    .await
                {
                    Ok(outcome) => {
                        summary.sold += 1;
                        summary.total_proceeds_sol += outcome.sol_received;
                        info!(
                            "Swept {}: {:.6} SOL (roi {:.2}%)",
                            position.token_address, outcome.sol_received, outcome.roi
                        );
                    }
                    Err(e) => {
                        summary.failed += 1;
                        warn!("Sweep ledger write failed for {}: {}", position.token_address, e);
                    }
                }
            }
            Err(e) if e.is_scam() => {
                summary.failed += 1;
                warn!("Sweep: {} flagged as scam", position.token_address);
                if let Err(e) = ledger.record_scam(&position.token_address).await {
                    warn!("Failed to record scam for {}: {}", position.token_address, e);
                }
            }
            Err(e) => {
                summary.failed += 1;
                warn!("Sweep sale failed for {}: {}", position.token_address, e);
            }
        }
    }

    info!(
        "Shutdown sweep complete: {} sold, {} failed, {:.6} SOL proceeds",
        summary.sold, summary.failed, summary.total_proceeds_sol
    );

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::error::{Error, Result};
    use crate::trading::SwapReceipt;
    use tempfile::tempdir;

    /// Sells everything at a fixed price; optionally fails for one token
    struct FixedFillGateway {
        price: f64,
        fail_token: Option<String>,
        scam_token: Option<String>,
    }

    #[async_trait]
    impl ExecutionGateway for FixedFillGateway {
        async fn swap(&self, request: &SwapRequest) -> Result<SwapReceipt> {
            if self.fail_token.as_deref() == Some(request.token_address.as_str()) {
                return Err(Error::SwapFailed("route unavailable".to_string()));
            }
            if self.scam_token.as_deref() == Some(request.token_address.as_str()) {
                return Err(Error::ScamDetected(request.token_address.clone()));
            }
            Ok(SwapReceipt {
                output_amount: request.amount * self.price,
                signature: "sweep-sig".to_string(),
            })
        }
    }

    async fn seeded_ledger(dir: &tempfile::TempDir) -> Arc<LedgerStore> {
        let ledger = Arc::new(
            LedgerStore::open(dir.path().join("ledger.json")).await.unwrap(),
        );
        ledger.record_buy("aaa", "A", 1000.0, 1.0, false).await.unwrap();
        ledger.record_buy("bbb", "B", 2000.0, 1.0, false).await.unwrap();
        ledger.record_buy("ccc", "C", 500.0, 0.5, false).await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_sweep_sells_everything() {
        let dir = tempdir().unwrap();
        let ledger = seeded_ledger(&dir).await;
        let gateway = Arc::new(FixedFillGateway {
            price: 0.002,
            fail_token: None,
            scam_token: None,
        });

        let summary =
            sell_all_positions(ledger.clone(), gateway, 5.0, false, Duration::ZERO).await;

        assert_eq!(summary.sold, 3);
        assert_eq!(summary.failed, 0);
        // 1000*0.002 + 2000*0.002 + 500*0.002
        assert!((summary.total_proceeds_sol - 7.0).abs() < 1e-9);
        assert!(ledger.open_positions().await.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_tolerates_individual_failures() {
        let dir = tempdir().unwrap();
        let ledger = seeded_ledger(&dir).await;
        let gateway = Arc::new(FixedFillGateway {
            price: 0.002,
            fail_token: Some("bbb".to_string()),
            scam_token: None,
        });

        let summary =
            sell_all_positions(ledger.clone(), gateway, 5.0, false, Duration::ZERO).await;

        assert_eq!(summary.sold, 2);
        assert_eq!(summary.failed, 1);
        // The failed position still holds its tokens
        let remaining = ledger.open_positions().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].token_address, "bbb");
    }

    #[tokio::test]
    async fn test_sweep_records_scams() {
        let dir = tempdir().unwrap();
        let ledger = seeded_ledger(&dir).await;
        let gateway = Arc::new(FixedFillGateway {
            price: 0.002,
            fail_token: None,
            scam_token: Some("ccc".to_string()),
        });

        let summary =
            sell_all_positions(ledger.clone(), gateway, 5.0, false, Duration::ZERO).await;

        assert_eq!(summary.sold, 2);
        assert_eq!(summary.failed, 1);
        assert!(ledger.is_blacklisted("ccc").await);
    }

    #[tokio::test]
    async fn test_sweep_empty_ledger() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(
            LedgerStore::open(dir.path().join("ledger.json")).await.unwrap(),
        );
        let gateway = Arc::new(FixedFillGateway {
            price: 0.002,
            fail_token: None,
            scam_token: None,
        });

        let summary = sell_all_positions(ledger, gateway, 5.0, false, Duration::ZERO).await;
        assert_eq!(summary, SweepSummary::default());
    }
}
