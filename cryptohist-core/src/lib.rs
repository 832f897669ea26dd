//! cryptohist core: historical market data for the top coins by market cap.
//!
//! This crate contains the whole retrieval pipeline:
//! - CoinGecko HTTP client with bounded retry and exponential backoff
//! - Coin universe resolution (top N by market capitalization)
//! - Normalization of market chart payloads into flat rows
//! - Per-coin fetch with max-range fallback and rate-limit cooldown
//! - Sequential, rate-limited harvest over the universe
//! - CSV export with a metadata sidecar

pub mod config;
pub mod data;

pub use config::{ConfigError, HarvestConfig, HttpConfig, PacingConfig};
