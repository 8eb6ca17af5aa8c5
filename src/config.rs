//! Runtime configuration.
//!
//! A single `Config` is built once at startup and handed to each component.
//! The master key is deliberately not part of it (see `vault::MasterKey`).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Upper bound for every timeout and delay setting (one day).
pub const MAX_DURATION_MS: u64 = 86_400_000;

/// Swap aggregator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Base URL of the aggregator API (`/quote` and `/swap` are appended)
    pub base_url: String,
    /// Highest slippage tolerance a quote may carry, in basis points
    pub max_slippage_bps: u16,
    /// Slippage used when a request does not specify one
    pub default_slippage_bps: u16,
    pub quote_timeout_ms: u64,
    pub build_timeout_ms: u64,
    /// How long a quote may be used to build a transaction
    pub quote_ttl_ms: u64,
    pub requests_per_second: u32,
}

/// Chain RPC settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub rpc_timeout_ms: u64,
    pub broadcast_timeout_ms: u64,
    /// Retries after the first broadcast attempt, transient failures only
    pub broadcast_retries: usize,
    pub broadcast_backoff_base_ms: u64,
    /// Minimum blocks of validity an unsigned transaction must have left
    pub min_remaining_blocks: u64,
    pub confirmation_timeout_ms: u64,
    pub confirmation_poll_ms: u64,
}

/// Anti-front-running delay. Adds latency only; it does not prevent front-running.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub enabled: bool,
    pub min_ms: u64,
    pub max_ms: u64,
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
    pub max_connections: u32,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aggregator: AggregatorConfig,
    pub chain: ChainConfig,
    pub delay: DelayConfig,
    pub storage: StorageConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://quote-api.jup.ag/v6".to_string(),
            max_slippage_bps: 300,
            default_slippage_bps: 50,
            quote_timeout_ms: 5_000,
            build_timeout_ms: 10_000,
            quote_ttl_ms: 30_000,
            requests_per_second: 10,
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            rpc_timeout_ms: 10_000,
            broadcast_timeout_ms: 15_000,
            broadcast_retries: 3,
            broadcast_backoff_base_ms: 200,
            min_remaining_blocks: 20,
            confirmation_timeout_ms: 60_000,
            confirmation_poll_ms: 1_000,
        }
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_ms: 100,
            max_ms: 2_000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./swapvault.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl AggregatorConfig {
    pub fn quote_timeout(&self) -> Duration {
        Duration::from_millis(self.quote_timeout_ms)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_millis(self.build_timeout_ms)
    }

    pub fn quote_ttl(&self) -> Duration {
        Duration::from_millis(self.quote_ttl_ms)
    }
}

impl ChainConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_millis(self.broadcast_timeout_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn confirmation_poll(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_ms)
    }
}

impl Config {
    /// Load configuration from a JSON file. Missing fields fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `SWAPVAULT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SWAPVAULT_*` overrides on top of the current values.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("SWAPVAULT_AGGREGATOR_URL") {
            self.aggregator.base_url = url;
        }
        if let Ok(url) = std::env::var("SWAPVAULT_RPC_URL") {
            self.chain.rpc_url = url;
        }
        if let Ok(url) = std::env::var("SWAPVAULT_DATABASE_URL") {
            self.storage.database_url = url;
        }
        if let Ok(raw) = std::env::var("SWAPVAULT_MAX_SLIPPAGE_BPS") {
            self.aggregator.max_slippage_bps = raw
                .parse()
                .context("SWAPVAULT_MAX_SLIPPAGE_BPS must be an integer")?;
        }
        if let Ok(raw) = std::env::var("SWAPVAULT_ANTI_FRONTRUN") {
            self.delay.enabled = matches!(raw.as_str(), "1" | "true" | "yes" | "on");
        }
        Ok(())
    }

    /// Reject configurations that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.delay.min_ms > self.delay.max_ms {
            bail!(
                "delay.min_ms ({}) must not exceed delay.max_ms ({})",
                self.delay.min_ms,
                self.delay.max_ms
            );
        }
        if self.aggregator.max_slippage_bps > 10_000 {
            bail!("aggregator.max_slippage_bps must be at most 10000");
        }
        if self.aggregator.default_slippage_bps > self.aggregator.max_slippage_bps {
            bail!("aggregator.default_slippage_bps exceeds aggregator.max_slippage_bps");
        }
        if self.aggregator.requests_per_second == 0 {
            bail!("aggregator.requests_per_second must be positive");
        }
        if self.chain.confirmation_poll_ms == 0 {
            bail!("chain.confirmation_poll_ms must be positive");
        }
        let durations = [
            ("aggregator.quote_timeout_ms", self.aggregator.quote_timeout_ms),
            ("aggregator.build_timeout_ms", self.aggregator.build_timeout_ms),
            ("aggregator.quote_ttl_ms", self.aggregator.quote_ttl_ms),
            ("chain.rpc_timeout_ms", self.chain.rpc_timeout_ms),
            ("chain.broadcast_timeout_ms", self.chain.broadcast_timeout_ms),
            ("chain.broadcast_backoff_base_ms", self.chain.broadcast_backoff_base_ms),
            ("chain.confirmation_timeout_ms", self.chain.confirmation_timeout_ms),
            ("chain.confirmation_poll_ms", self.chain.confirmation_poll_ms),
            ("delay.max_ms", self.delay.max_ms),
        ];
        for (name, value) in durations {
            if value > MAX_DURATION_MS {
                bail!("{} ({}) must be at most {} ms", name, value, MAX_DURATION_MS);
            }
        }
        Ok(())
    }
}

/// Builder for `Config` with sensible defaults.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_aggregator_url(mut self, url: impl Into<String>) -> Self {
        self.config.aggregator.base_url = url.into();
        self
    }

    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.config.chain.rpc_url = url.into();
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.config.storage.database_url = url.into();
        self
    }

    pub fn with_max_slippage_bps(mut self, bps: u16) -> Self {
        self.config.aggregator.max_slippage_bps = bps;
        self
    }

    pub fn with_quote_ttl(mut self, ttl: Duration) -> Self {
        self.config.aggregator.quote_ttl_ms = ttl.as_millis() as u64;
        self
    }

    /// Set the anti-front-running delay range; `None` disables it.
    pub fn with_delay(mut self, range_ms: Option<(u64, u64)>) -> Self {
        match range_ms {
            Some((min_ms, max_ms)) => {
                self.config.delay = DelayConfig {
                    enabled: true,
                    min_ms,
                    max_ms,
                };
            }
            None => self.config.delay.enabled = false,
        }
        self
    }

    pub fn with_broadcast_retries(mut self, retries: usize, backoff_base_ms: u64) -> Self {
        self.config.chain.broadcast_retries = retries;
        self.config.chain.broadcast_backoff_base_ms = backoff_base_ms;
        self
    }

    pub fn with_min_remaining_blocks(mut self, blocks: u64) -> Self {
        self.config.chain.min_remaining_blocks = blocks;
        self
    }

    pub fn with_confirmation(mut self, timeout: Duration, poll: Duration) -> Self {
        self.config.chain.confirmation_timeout_ms = timeout.as_millis() as u64;
        self.config.chain.confirmation_poll_ms = poll.as_millis().max(1) as u64;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
