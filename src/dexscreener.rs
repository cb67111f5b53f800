// DexScreener API client: token discovery and market snapshots
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::SnapshotConfig;
use crate::error::{Error, Result};

const DEXSCREENER_BASE: &str = "https://api.dexscreener.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenProfile {
    pub url: Option<String>,
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "tokenAddress")]
    pub token_address: String,
    pub icon: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChange {
    pub m5: Option<f64>,
    pub h1: Option<f64>,
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Txns {
    pub m5: Option<TxnCount>,
    pub h1: Option<TxnCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxnCount {
    pub buys: u32,
    pub sells: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Liquidity {
    pub usd: Option<f64>,
    pub base: Option<f64>,
    pub quote: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    pub h24: Option<f64>,
    pub h1: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexPair {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "dexId")]
    pub dex_id: String,
    #[serde(rename = "pairAddress")]
    pub pair_address: String,
    #[serde(rename = "baseToken")]
    pub base_token: BaseToken,
    #[serde(rename = "priceNative")]
    pub price_native: Option<String>,
    #[serde(rename = "priceUsd")]
    pub price_usd: Option<String>,
    #[serde(rename = "priceChange")]
    pub price_change: Option<PriceChange>,
    pub txns: Option<Txns>,
    pub volume: Option<Volume>,
    pub liquidity: Option<Liquidity>,
    #[serde(rename = "pairCreatedAt")]
    pub pair_created_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPairsResponse {
    pub pairs: Option<Vec<DexPair>>,
}

/// Point-in-time read of a token pair's market metrics.
///
/// All scoring inputs are embedded here, including the observation
/// timestamp, so downstream consumers never need a clock.
#[derive(Debug, Clone, PartialEq)]
pub struct PairSnapshot {
    pub token_address: String,
    pub token_name: String,
    pub token_symbol: String,
    pub price_native: f64,
    pub price_usd: f64,
    pub liquidity_usd: f64,
    pub volume_h24: f64,
    pub change_m5: f64,
    pub change_h1: f64,
    pub change_h24: f64,
    pub buys_m5: u32,
    pub sells_m5: u32,
    pub buys_h1: u32,
    pub sells_h1: u32,
    pub pair_created_at: DateTime<Utc>,
    pub observed_at: DateTime<Utc>,
}

impl PairSnapshot {
    /// Pair age in hours at observation time
    pub fn age_hours(&self) -> f64 {
        let secs = (self.observed_at - self.pair_created_at).num_seconds();
        (secs.max(0) as f64) / 3600.0
    }

    /// Buy/sell ratio over the last 5 minutes
    pub fn buy_sell_ratio_m5(&self) -> f64 {
        ratio(self.buys_m5, self.sells_m5)
    }

    /// Buy/sell ratio over the last hour
    pub fn buy_sell_ratio_h1(&self) -> f64 {
        ratio(self.buys_h1, self.sells_h1)
    }

    /// 24h volume relative to pooled liquidity
    pub fn volume_liquidity_ratio(&self) -> f64 {
        if self.liquidity_usd > 0.0 {
            self.volume_h24 / self.liquidity_usd
        } else {
            0.0
        }
    }
}

fn ratio(buys: u32, sells: u32) -> f64 {
    if sells > 0 {
        buys as f64 / sells as f64
    } else {
        buys as f64
    }
}

/// Pull-based source of market snapshots
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Fetch the current snapshot for a token, `None` if no pair is listed
    async fn snapshot(&self, token_address: &str) -> Result<Option<PairSnapshot>>;
}

/// HTTP client for the DexScreener API
pub struct DexScreenerClient {
    client: reqwest::Client,
    base_url: String,
}

impl DexScreenerClient {
    pub fn new(config: &SnapshotConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: DEXSCREENER_BASE.to_string(),
        }
    }

    /// Fetch latest token profiles (discovery feed)
    pub async fn latest_profiles(&self) -> Result<Vec<TokenProfile>> {
        let url = format!("{}/token-profiles/latest/v1", self.base_url);
        let resp = self.client.get(&url).send().await?;
        let profiles: Vec<TokenProfile> = resp.json().await?;
        Ok(profiles)
    }

    /// Fetch the most liquid pair for a token
    pub async fn token_pair(&self, token_address: &str) -> Result<Option<DexPair>> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, token_address);
        let resp = self.client.get(&url).send().await?;
        let data: TokenPairsResponse = resp.json().await?;

        Ok(data.pairs.and_then(|pairs| pairs.into_iter().next()))
    }

    /// Convert a wire pair into a snapshot observed now
    fn pair_to_snapshot(token_address: &str, pair: &DexPair) -> PairSnapshot {
        let observed_at = Utc::now();
        let pair_created_at = pair
            .pair_created_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or(observed_at);

        let (buys_m5, sells_m5) = pair
            .txns
            .as_ref()
            .and_then(|t| t.m5.as_ref())
            .map(|c| (c.buys, c.sells))
            .unwrap_or((0, 0));

        let (buys_h1, sells_h1) = pair
            .txns
            .as_ref()
            .and_then(|t| t.h1.as_ref())
            .map(|c| (c.buys, c.sells))
            .unwrap_or((0, 0));

        PairSnapshot {
            token_address: token_address.to_string(),
            token_name: pair
                .base_token
                .name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            token_symbol: pair
                .base_token
                .symbol
                .clone()
                .unwrap_or_else(|| "???".to_string()),
            price_native: pair
                .price_native
                .as_ref()
                .and_then(|p| p.parse::<f64>().ok())
                .unwrap_or(0.0),
            price_usd: pair
                .price_usd
                .as_ref()
                .and_then(|p| p.parse::<f64>().ok())
                .unwrap_or(0.0),
            liquidity_usd: pair.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0),
            volume_h24: pair.volume.as_ref().and_then(|v| v.h24).unwrap_or(0.0),
            change_m5: pair
                .price_change
                .as_ref()
                .and_then(|pc| pc.m5)
                .unwrap_or(0.0),
            change_h1: pair
                .price_change
                .as_ref()
                .and_then(|pc| pc.h1)
                .unwrap_or(0.0),
            change_h24: pair
                .price_change
                .as_ref()
                .and_then(|pc| pc.h24)
                .unwrap_or(0.0),
            buys_m5,
            sells_m5,
            buys_h1,
            sells_h1,
            pair_created_at,
            observed_at,
        }
    }
}

#[async_trait]
impl SnapshotProvider for DexScreenerClient {
    async fn snapshot(&self, token_address: &str) -> Result<Option<PairSnapshot>> {
        match self.token_pair(token_address).await {
            Ok(Some(pair)) => Ok(Some(Self::pair_to_snapshot(token_address, &pair))),
            Ok(None) => {
                debug!("No pair listed for {}", token_address);
                Ok(None)
            }
            Err(e) => {
                warn!("Snapshot fetch failed for {}: {}", token_address, e);
                Err(Error::SnapshotUnavailable(token_address.to_string()))
            }
        }
    }
}

/// Read-through snapshot cache with a short TTL.
///
/// Entries are cloned out on read, never mutated in place, so concurrent
/// readers need no coordination beyond the map itself.
pub struct CachedSnapshotProvider<P> {
    inner: P,
    ttl: Duration,
    cache: DashMap<String, (Instant, PairSnapshot)>,
}

impl<P: SnapshotProvider> CachedSnapshotProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: DashMap::new(),
        }
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl<P: SnapshotProvider> SnapshotProvider for CachedSnapshotProvider<P> {
    async fn snapshot(&self, token_address: &str) -> Result<Option<PairSnapshot>> {
        if let Some(entry) = self.cache.get(token_address) {
            let (fetched_at, snapshot) = entry.value();
            if fetched_at.elapsed() < self.ttl {
                return Ok(Some(snapshot.clone()));
            }
        }

        let snapshot = self.inner.snapshot(token_address).await?;
        if let Some(ref snap) = snapshot {
            self.cache
                .insert(token_address.to_string(), (Instant::now(), snap.clone()));
        }
        Ok(snapshot)
    }
}
