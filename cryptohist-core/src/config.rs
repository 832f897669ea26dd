//! Harvest configuration.
//!
//! Everything has a default, so an empty TOML document (or no file at all) is
//! a valid configuration. Example:
//!
//! ```toml
//! top_n = 100
//! window_days = 365
//! output_path = "data/crypto_historical_data.csv"
//!
//! [http]
//! base_url = "https://api.coingecko.com/api/v3"
//! max_retries = 3
//!
//! [pacing]
//! request_delay_ms = 1200
//! rate_limit_cooldown_ms = 10000
//! ```

use crate::data::normalize::Alignment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_OUTPUT_PATH: &str = "data/crypto_historical_data.csv";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration for one harvest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Number of coins to take from the market-cap ranking.
    pub top_n: usize,
    /// Trailing window requested per coin, in days.
    pub window_days: u32,
    /// Quote currency for prices, market caps and volumes.
    pub vs_currency: String,
    /// Where the CSV table is written. Replaced on every successful run.
    pub output_path: PathBuf,
    /// How market cap / volume series are matched to price points.
    pub alignment: Alignment,
    pub http: HttpConfig,
    pub pacing: PacingConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            top_n: 100,
            window_days: 365,
            vs_currency: "usd".to_string(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            alignment: Alignment::Positional,
            http: HttpConfig::default(),
            pacing: PacingConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Load a config from a TOML file and validate it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_n == 0 {
            return Err(ConfigError::Invalid("top_n must be at least 1".into()));
        }
        if self.window_days == 0 {
            return Err(ConfigError::Invalid("window_days must be at least 1".into()));
        }
        if self.vs_currency.trim().is_empty() {
            return Err(ConfigError::Invalid("vs_currency must not be empty".into()));
        }
        if self.http.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("http.base_url must not be empty".into()));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output_path must not be empty".into()));
        }
        Ok(())
    }
}

/// HTTP session settings, including the transport-level retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: String,
    /// Sent as `x-cg-demo-api-key` when present.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Retries after the first attempt on 429/500/502/503/504 and connect errors.
    pub max_retries: u32,
    /// Backoff before retry `n` is `backoff_base_ms * 2^(n-1)`.
    pub backoff_base_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 30,
            user_agent: concat!("cryptohist/", env!("CARGO_PKG_VERSION")).to_string(),
            max_retries: 3,
            backoff_base_ms: 1000,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backoff before the given retry (1-based). Doubles each time.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Delays that keep the run under the provider's rate limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Fixed pause after every coin, success or not.
    pub request_delay_ms: u64,
    /// Pause after a 429 before the coin is retried from the start.
    pub rate_limit_cooldown_ms: u64,
    /// Cooldown rounds allowed per coin before it is skipped.
    pub max_rate_limit_retries: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 1200,
            rate_limit_cooldown_ms: 10_000,
            max_rate_limit_retries: 5,
        }
    }
}

impl PacingConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }
}
