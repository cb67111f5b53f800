//! Command implementations: discovery loop, manual sell, status

use anyhow::{Context, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dexscreener::{CachedSnapshotProvider, DexScreenerClient, SnapshotProvider};
use crate::ledger::LedgerStore;
use crate::monitor::{sell_all_positions, PositionMonitor};
use crate::scorer;
use crate::strategy::{select_strategy, ExitStrategy};
use crate::trading::{
    ExecutionGateway, RetryingGateway, SimulatedGateway, SwapApiClient, SwapRequest,
};

/// Shared runtime wiring for the trading commands
struct Runtime {
    ledger: Arc<LedgerStore>,
    provider: Arc<dyn SnapshotProvider>,
    gateway: Arc<dyn ExecutionGateway>,
    dry_run: bool,
}

async fn build_runtime(config: &Config, dry_run: bool) -> Result<Runtime> {
    let ledger = Arc::new(
        LedgerStore::open(&config.ledger.path)
            .await
            .context("Failed to open ledger")?,
    );

    let provider: Arc<dyn SnapshotProvider> = Arc::new(CachedSnapshotProvider::new(
        DexScreenerClient::new(&config.snapshot),
        Duration::from_secs(config.snapshot.cache_ttl_secs),
    ));

    let dry_run = dry_run || config.trading.dry_run;
    let gateway: Arc<dyn ExecutionGateway> = if dry_run {
        info!("Dry-run mode: swaps are simulated");
        Arc::new(SimulatedGateway::new(provider.clone()))
    } else {
        Arc::new(RetryingGateway::new(
            SwapApiClient::new(&config.swap_api),
            &config.swap_api,
        ))
    };

    Ok(Runtime {
        ledger,
        provider,
        gateway,
        dry_run,
    })
}

/// Start the discovery loop and position monitors
pub async fn start(config: &Config, dry_run: bool) -> Result<()> {
    let rt = build_runtime(config, dry_run).await?;
    let cancel = CancellationToken::new();
    // Token addresses with a live monitor task
    let monitored: Arc<DashMap<String, ()>> = Arc::new(DashMap::new());

    // Resume monitors for positions still open in the ledger
    for position in rt.ledger.open_positions().await {
        let strategy = resume_strategy(&rt, &position.token_address).await;
        info!(
            "Resuming monitor for {} ({:?} tier)",
            position.token_address, strategy.tier
        );
        spawn_monitor(config, &rt, &monitored, &cancel, &position.token_address, strategy);
    }

    let mut scan_timer = tokio::time::interval(Duration::from_secs(config.scan.interval_secs));
    scan_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // The sweep must run exactly once however shutdown is reached
    let swept = AtomicBool::new(false);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Termination signal received");
                break;
            }
            _ = scan_timer.tick() => {
                if !config.scan.enabled {
                    continue;
                }
                if let Err(e) = scan_once(config, &rt, &monitored, &cancel).await {
                    warn!("Discovery scan failed: {}", e);
                }
            }
        }
    }

    cancel.cancel();

    if !swept.swap(true, Ordering::SeqCst) {
        let summary = sell_all_positions(
            rt.ledger.clone(),
            rt.gateway.clone(),
            config.trading.slippage_pct,
            rt.dry_run,
            Duration::from_millis(config.monitor.sweep_delay_ms),
        )
        .await;
        info!(
            "Exit sweep: {} sold, {} failed, {:.6} SOL",
            summary.sold, summary.failed, summary.total_proceeds_sol
        );
    }

    Ok(())
}

/// One discovery pass: fetch fresh listings, score, and enter
async fn scan_once(
    config: &Config,
    rt: &Runtime,
    monitored: &Arc<DashMap<String, ()>>,
    cancel: &CancellationToken,
) -> Result<()> {
    if monitored.len() >= config.scan.max_open_positions {
        return Ok(());
    }

    let client = DexScreenerClient::new(&config.snapshot);
    let profiles = client.latest_profiles().await?;

    let candidates: Vec<_> = profiles
        .into_iter()
        .filter(|p| p.chain_id == "solana")
        .take(config.scan.profile_limit)
        .collect();

    info!("Scanning {} Solana token profiles", candidates.len());

    for profile in candidates {
        if monitored.len() >= config.scan.max_open_positions {
            break;
        }
        let token = &profile.token_address;
        if monitored.contains_key(token) || rt.ledger.is_blacklisted(token).await {
            continue;
        }
        if rt
            .ledger
            .get_position(token)
            .await
            .map(|p| !p.is_closed())
            .unwrap_or(false)
        {
            continue;
        }

        let snapshot = match rt.provider.snapshot(token).await {
            Ok(Some(s)) => s,
            Ok(None) => continue,
            Err(e) => {
                warn!("Snapshot failed for {}: {}", token, e);
                continue;
            }
        };

        let outcome = scorer::score(&snapshot);
        if !outcome.accepted {
            continue;
        }

        info!(
            "Candidate {} ({}) scored {:.1}: {}",
            snapshot.token_symbol,
            token,
            outcome.score,
            outcome.reasons.join("; ")
        );

        let request = SwapRequest::buy(token, config.trading.buy_amount_sol, config.trading.slippage_pct);
        let receipt = match rt.gateway.swap(&request).await {
            Ok(r) => r,
            Err(e) if e.is_scam() => {
                warn!("Entry blocked, scam token {}: {}", token, e);
                continue;
            }
            Err(e) => {
                warn!("Entry swap failed for {}: {}", token, e);
                continue;
            }
        };

        rt.ledger
            .record_buy(
                token,
                &snapshot.token_name,
                receipt.output_amount,
                config.trading.buy_amount_sol,
                rt.dry_run,
            )
            .await?;

        let strategy = select_strategy(outcome.score);
        spawn_monitor(config, rt, monitored, cancel, token, strategy);

        // Rate limiting between entries
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    Ok(())
}

fn spawn_monitor(
    config: &Config,
    rt: &Runtime,
    monitored: &Arc<DashMap<String, ()>>,
    cancel: &CancellationToken,
    token_address: &str,
    strategy: ExitStrategy,
) {
    if monitored.insert(token_address.to_string(), ()).is_some() {
        return;
    }

    let monitor = PositionMonitor::new(
        token_address,
        strategy,
        rt.ledger.clone(),
        rt.provider.clone(),
        rt.gateway.clone(),
        &config.monitor,
        config.trading.slippage_pct,
        rt.dry_run,
    );

    let token = token_address.to_string();
    let monitored = monitored.clone();
    let cancel = cancel.child_token();
    tokio::spawn(async move {
        let state = monitor.run(cancel).await;
        info!("Monitor task for {} ended: {:?}", token, state);
        monitored.remove(&token);
    });
}

/// Strategy for a position resumed from a previous run.
///
/// The exit strategy is not persisted, so resumed positions are
/// re-scored from the current snapshot; with no snapshot available
/// the conservative tier applies.
async fn resume_strategy(rt: &Runtime, token_address: &str) -> ExitStrategy {
    match rt.provider.snapshot(token_address).await {
        Ok(Some(snapshot)) => select_strategy(scorer::score(&snapshot).score),
        _ => select_strategy(0.0),
    }
}

/// Manually sell part or all of a position
pub async fn sell(config: &Config, token: &str, amount: &str, dry_run: bool) -> Result<()> {
    let rt = build_runtime(config, dry_run).await?;

    let position = rt
        .ledger
        .get_position(token)
        .await
        .with_context(|| format!("No position for {}", token))?;

    if position.is_closed() {
        anyhow::bail!("Position for {} is already closed", token);
    }

    let token_amount = parse_sell_amount(amount, position.current_amount)?;

    let request = SwapRequest::sell(token, token_amount, config.trading.slippage_pct);
    match rt.gateway.swap(&request).await {
        Ok(receipt) => {
            let metadata = serde_json::json!({
                "reason": "manual",
                "signature": receipt.signature,
            });
            let outcome = rt
                .ledger
                .record_sell(token, token_amount, receipt.output_amount, Some(metadata), rt.dry_run)
                .await?;
            println!(
                "Sold {:.4} of {} for {:.6} SOL (roi {:.2}%, remaining {:.4})",
                outcome.amount_sold, token, outcome.sol_received, outcome.roi, outcome.remaining_amount
            );
            Ok(())
        }
        Err(e) if e.is_scam() => {
            rt.ledger.record_scam(token).await?;
            error!("Token {} flagged as scam", token);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Parse "50%" or an absolute token amount against current holdings
fn parse_sell_amount(amount: &str, available: f64) -> Result<f64> {
    if let Some(pct) = amount.strip_suffix('%') {
        let pct: f64 = pct.trim().parse().context("Invalid percentage")?;
        if !(0.0..=100.0).contains(&pct) {
            anyhow::bail!("Percentage must be between 0 and 100");
        }
        Ok(available * pct / 100.0)
    } else {
        let value: f64 = amount.trim().parse().context("Invalid amount")?;
        if value <= 0.0 {
            anyhow::bail!("Amount must be positive");
        }
        Ok(value)
    }
}

/// Show positions and global statistics
pub async fn status(config: &Config) -> Result<()> {
    let ledger = Arc::new(
        LedgerStore::open(&config.ledger.path)
            .await
            .context("Failed to open ledger")?,
    );
    let provider = CachedSnapshotProvider::new(
        DexScreenerClient::new(&config.snapshot),
        Duration::from_secs(config.snapshot.cache_ttl_secs),
    );

    let mut positions = ledger.all_positions().await;
    positions.sort_by(|a, b| a.first_purchase_time.cmp(&b.first_purchase_time));

    println!("{:<44} {:>14} {:>12} {:>12} {:>9}", "TOKEN", "HELD", "AVG BUY", "INVESTED", "ROI");
    for position in &positions {
        let roi = match provider.snapshot(&position.token_address).await {
            Ok(Some(snap)) if !position.is_closed() => {
                format!("{:>8.2}%", position.roi_at(snap.price_native))
            }
            _ if position.scam => "scam".to_string(),
            _ if position.is_closed() => "closed".to_string(),
            _ => "-".to_string(),
        };
        println!(
            "{:<44} {:>14.4} {:>12.9} {:>12.6} {:>9}",
            position.token_address,
            position.current_amount,
            position.avg_buy_price,
            position.initial_investment,
            roi
        );
    }

    let stats = ledger.stats().await;
    println!();
    println!(
        "Invested {:.6} SOL, returned {:.6} SOL, net {:+.6} SOL ({} sells, {} failed)",
        stats.total_invested,
        stats.total_returned,
        stats.net_sol(),
        stats.successful_trades,
        stats.failed_trades
    );

    Ok(())
}

/// Print the effective configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{:#?}", config);
    Ok(())
}
