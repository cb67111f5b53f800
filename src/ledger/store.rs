//! JSON-backed ledger store
//!
//! Whole-document read-modify-write behind a single async mutex; every
//! mutation persists via temp-file write plus atomic rename. A corrupt
//! file on load is preserved under a timestamped name and the store
//! restarts empty.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ledger::position::{LedgerStats, Position, SellOutcome};

/// Persisted ledger shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerDocument {
    positions: HashMap<String, Position>,
    stats: LedgerStats,
}

/// Serialized-writer ledger store
pub struct LedgerStore {
    path: PathBuf,
    doc: Mutex<LedgerDocument>,
}

impl LedgerStore {
    /// Open a store, loading existing state from disk.
    ///
    /// A missing file yields an empty ledger. An unparseable file is
    /// moved aside with a timestamp suffix and the store starts empty;
    /// the parse error is never propagated.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let doc = match tokio::fs::read_to_string(&path).await {
            Ok(data) => match serde_json::from_str::<LedgerDocument>(&data) {
                Ok(doc) => {
                    info!("Loaded {} positions from {}", doc.positions.len(), path.display());
                    doc
                }
                Err(e) => {
                    let backup = corrupt_backup_path(&path);
                    warn!(
                        "Ledger file {} is corrupt ({}); preserving as {}",
                        path.display(),
                        e,
                        backup.display()
                    );
                    tokio::fs::rename(&path, &backup)
                        .await
                        .map_err(|e| Error::LedgerPersistence(e.to_string()))?;
                    LedgerDocument::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No ledger file at {}, starting empty", path.display());
                LedgerDocument::default()
            }
            Err(e) => return Err(Error::LedgerPersistence(e.to_string())),
        };

        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    /// Record a buy, creating the position on first purchase
    pub async fn record_buy(
        &self,
        token_address: &str,
        token_name: &str,
        token_amount: f64,
        sol_spent: f64,
        dry_run: bool,
    ) -> Result<()> {
        let mut doc = self.doc.lock().await;
        let now = Utc::now();

        let position = doc
            .positions
            .entry(token_address.to_string())
            .or_insert_with(|| Position::new(token_address, token_name, now));
        position.apply_buy(token_amount, sol_spent, now, dry_run);
        let avg_buy_price = position.avg_buy_price;
        doc.stats.total_invested += sol_spent;

        info!(
            "BUY {} {:.4} tokens for {:.6} SOL (avg {:.9})",
            token_address, token_amount, sol_spent, avg_buy_price
        );

        self.persist(&doc).await
    }

    /// Record a sell against an existing position.
    ///
    /// Over-requests are clamped to current holdings with a warning;
    /// selling an unknown token is a typed failure with no mutation.
    pub async fn record_sell(
        &self,
        token_address: &str,
        amount_requested: f64,
        sol_received: f64,
        metadata: Option<serde_json::Value>,
        dry_run: bool,
    ) -> Result<SellOutcome> {
        let mut doc = self.doc.lock().await;
        let now = Utc::now();

        let position = doc
            .positions
            .get_mut(token_address)
            .ok_or_else(|| Error::TokenNotFound(token_address.to_string()))?;

        let outcome = position.apply_sell(amount_requested, sol_received, now, metadata, dry_run);
        if outcome.clamped {
            warn!(
                "Sell request for {} exceeded holdings ({} > available), clamped to {}",
                token_address, amount_requested, outcome.amount_sold
            );
        }

        doc.stats.total_returned += sol_received;
        doc.stats.successful_trades += 1;

        info!(
            "SELL {} {:.4} tokens for {:.6} SOL (roi {:.2}%, remaining {:.4})",
            token_address, outcome.amount_sold, sol_received, outcome.roi, outcome.remaining_amount
        );

        self.persist(&doc).await?;
        Ok(outcome)
    }

    /// Permanently flag a token whose program is not executable.
    ///
    /// The position is kept with zero proceeds; discovery treats
    /// flagged tokens as blacklisted. Idempotent: re-flagging an
    /// already-flagged token changes nothing.
    pub async fn record_scam(&self, token_address: &str) -> Result<()> {
        let mut doc = self.doc.lock().await;

        let position = doc
            .positions
            .get_mut(token_address)
            .ok_or_else(|| Error::TokenNotFound(token_address.to_string()))?;

        if position.scam {
            return Ok(());
        }

        position.scam = true;
        position.last_update_time = Utc::now();
        doc.stats.failed_trades += 1;

        warn!("Token {} flagged as scam", token_address);

        self.persist(&doc).await
    }

    /// Get a position by token address
    pub async fn get_position(&self, token_address: &str) -> Option<Position> {
        let doc = self.doc.lock().await;
        doc.positions.get(token_address).cloned()
    }

    /// Positions still holding tokens, scams excluded
    pub async fn open_positions(&self) -> Vec<Position> {
        let doc = self.doc.lock().await;
        doc.positions
            .values()
            .filter(|p| !p.is_closed() && !p.scam)
            .cloned()
            .collect()
    }

    /// All positions, including closed and flagged ones
    pub async fn all_positions(&self) -> Vec<Position> {
        let doc = self.doc.lock().await;
        doc.positions.values().cloned().collect()
    }

    /// Whether a token was ever flagged as a scam
    pub async fn is_blacklisted(&self, token_address: &str) -> bool {
        let doc = self.doc.lock().await;
        doc.positions.get(token_address).map(|p| p.scam).unwrap_or(false)
    }

    /// Global accumulators
    pub async fn stats(&self) -> LedgerStats {
        let doc = self.doc.lock().await;
        doc.stats.clone()
    }

    /// Full-document replace: write a temp file, then rename over the
    /// target so readers never observe a partial write.
    async fn persist(&self, doc: &LedgerDocument) -> Result<()> {
        let data = serde_json::to_string_pretty(doc)
            .map_err(|e| Error::LedgerPersistence(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| Error::LedgerPersistence(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::LedgerPersistence(e.to_string()))?;

        debug!("Persisted ledger to {}", self.path.display());
        Ok(())
    }
}

fn corrupt_backup_path(path: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "ledger.json".to_string());
    path.with_file_name(format!("{}.corrupt.{}", name, stamp))
}
