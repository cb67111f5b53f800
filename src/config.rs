//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub swap_api: SwapApiConfig,
}

/// Ledger persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Path to the JSON ledger file
    #[serde(default = "default_ledger_path")]
    pub path: String,
}

/// Token discovery scan configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between discovery scans
    #[serde(default = "default_scan_interval_secs")]
    pub interval_secs: u64,
    /// How many latest profiles to check per scan
    #[serde(default = "default_profile_limit")]
    pub profile_limit: usize,
    /// Maximum concurrently open positions
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
}

/// Trade sizing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// SOL spent per entry
    #[serde(default = "default_buy_amount_sol")]
    pub buy_amount_sol: f64,
    /// Slippage tolerance in percent
    #[serde(default = "default_slippage_pct")]
    pub slippage_pct: f64,
    /// Simulate swaps instead of executing them
    #[serde(default)]
    pub dry_run: bool,
}

/// Position monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Milliseconds between price polls per position
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Trailing sample window for the trend-reversal guard
    #[serde(default = "default_trend_window_secs")]
    pub trend_window_secs: u64,
    /// Delay between sales during the shutdown sweep
    #[serde(default = "default_sweep_delay_ms")]
    pub sweep_delay_ms: u64,
}

/// Market snapshot cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// HTTP request timeout in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

/// Swap-routing API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SwapApiConfig {
    #[serde(default = "default_swap_api_url")]
    pub base_url: String,
    /// API key for the swap-routing service
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Maximum elapsed retry time in milliseconds
    #[serde(default = "default_retry_max_elapsed_ms")]
    pub retry_max_elapsed_ms: u64,
}

fn default_ledger_path() -> String {
    "ledger.json".to_string()
}

fn default_scan_interval_secs() -> u64 {
    60
}

fn default_profile_limit() -> usize {
    30
}

fn default_max_open_positions() -> usize {
    5
}

fn default_buy_amount_sol() -> f64 {
    0.1
}

fn default_slippage_pct() -> f64 {
    5.0
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_trend_window_secs() -> u64 {
    30
}

fn default_sweep_delay_ms() -> u64 {
    500
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_swap_api_url() -> String {
    "https://pumpportal.fun/api".to_string()
}

fn default_retry_base_delay_ms() -> u64 {
    250
}

fn default_retry_max_elapsed_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_scan_interval_secs(),
            profile_limit: default_profile_limit(),
            max_open_positions: default_max_open_positions(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            buy_amount_sol: default_buy_amount_sol(),
            slippage_pct: default_slippage_pct(),
            dry_run: false,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            trend_window_secs: default_trend_window_secs(),
            sweep_delay_ms: default_sweep_delay_ms(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Default for SwapApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_swap_api_url(),
            api_key: String::new(),
            timeout_secs: default_http_timeout_secs(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_elapsed_ms: default_retry_max_elapsed_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            scan: ScanConfig::default(),
            trading: TradingConfig::default(),
            monitor: MonitorConfig::default(),
            snapshot: SnapshotConfig::default(),
            swap_api: SwapApiConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix MEMEBOT_)
            .add_source(
                config::Environment::with_prefix("MEMEBOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.trading.buy_amount_sol <= 0.0 {
            anyhow::bail!("buy_amount_sol must be positive");
        }

        if self.trading.slippage_pct <= 0.0 || self.trading.slippage_pct > 100.0 {
            anyhow::bail!("slippage_pct must be between 0 and 100");
        }

        if self.monitor.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be positive");
        }

        if self.scan.max_open_positions == 0 {
            anyhow::bail!("max_open_positions must be positive");
        }

        if self.ledger.path.is_empty() {
            anyhow::bail!("ledger path cannot be empty");
        }

        Ok(())
    }
}
