//! Per-coin retrieval with max-range fallback and rate-limit cooldown.
//!
//! Fallback policy for one coin:
//! 1. Request the trailing window (daily) → normalize if it has prices
//! 2. No prices → request the full history, normalize, keep the trailing window
//!    (nothing left inside the window → the coin is skipped)
//! 3. HTTP 429 at either step → cool down, restart from step 1 (bounded)
//! 4. Anything else → the coin is skipped

use super::normalize::{filter_trailing, normalize_with, Alignment, CoinRecord, NormalizeError};
use super::pacing::Pacer;
use super::provider::{ChartRange, CoinId, FetchError, MarketDataSource};
use crate::config::HarvestConfig;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Which request of the fallback policy an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Window,
    Max,
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPhase::Window => f.write_str("window"),
            FetchPhase::Max => f.write_str("max"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoinFetchError {
    #[error("{phase} request failed: {source}")]
    Request {
        phase: FetchPhase,
        #[source]
        source: FetchError,
    },

    #[error("{phase} payload rejected: {source}")]
    Normalize {
        phase: FetchPhase,
        #[source]
        source: NormalizeError,
    },

    #[error("no data available even with max range")]
    NoData,

    #[error("still rate limited after {0} cooldowns")]
    RateLimitExhausted(u32),
}

/// Records for one coin and the range they were served from.
#[derive(Debug, Clone, PartialEq)]
pub struct CoinHistory {
    pub coin: CoinId,
    pub range: ChartRange,
    pub records: Vec<CoinRecord>,
}

impl CoinHistory {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Knobs for [`CoinFetcher`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub window_days: u32,
    pub alignment: Alignment,
    pub rate_limit_cooldown: Duration,
    pub max_rate_limit_retries: u32,
}

impl FetchOptions {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            window_days: config.window_days,
            alignment: config.alignment,
            rate_limit_cooldown: config.pacing.rate_limit_cooldown(),
            max_rate_limit_retries: config.pacing.max_rate_limit_retries,
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&HarvestConfig::default())
    }
}

/// Fetches one coin at a time from a [`MarketDataSource`].
pub struct CoinFetcher<'a> {
    source: &'a dyn MarketDataSource,
    pacer: &'a dyn Pacer,
    options: FetchOptions,
    clock: fn() -> DateTime<Utc>,
}

impl<'a> CoinFetcher<'a> {
    pub fn new(source: &'a dyn MarketDataSource, pacer: &'a dyn Pacer, options: FetchOptions) -> Self {
        Self {
            source,
            pacer,
            options,
            clock: Utc::now,
        }
    }

    /// Override the wall clock used to cut the trailing window after a fallback.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Fetch a coin, logging and swallowing any failure.
    ///
    /// `None` means the coin should be skipped.
    pub fn fetch(&self, coin: &str) -> Option<CoinHistory> {
        match self.try_fetch(coin) {
            Ok(history) => Some(history),
            Err(e) => {
                error!(coin, error = %e, "failed to retrieve coin data");
                None
            }
        }
    }

    /// Fetch a coin, retrying the whole policy after each rate-limit cooldown.
    pub fn try_fetch(&self, coin: &str) -> Result<CoinHistory, CoinFetchError> {
        let mut cooldowns = 0u32;
        loop {
            match self.attempt(coin) {
                Err(CoinFetchError::Request {
                    phase,
                    source: FetchError::RateLimited,
                }) => {
                    if cooldowns >= self.options.max_rate_limit_retries {
                        return Err(CoinFetchError::RateLimitExhausted(cooldowns));
                    }
                    cooldowns += 1;
                    warn!(
                        coin,
                        %phase,
                        cooldown = ?self.options.rate_limit_cooldown,
                        round = cooldowns,
                        "rate limit detected, backing off"
                    );
                    self.pacer.pause(self.options.rate_limit_cooldown);
                }
                other => return other,
            }
        }
    }

    fn attempt(&self, coin: &str) -> Result<CoinHistory, CoinFetchError> {
        let window = ChartRange::Days(self.options.window_days);
        let chart = self
            .source
            .market_chart(coin, window)
            .map_err(|source| CoinFetchError::Request {
                phase: FetchPhase::Window,
                source,
            })?;

        if chart.has_prices() {
            let records = normalize_with(&chart, coin, self.options.alignment).map_err(|source| {
                CoinFetchError::Normalize {
                    phase: FetchPhase::Window,
                    source,
                }
            })?;
            return Ok(CoinHistory {
                coin: coin.to_string(),
                range: window,
                records,
            });
        }

        info!(coin, days = self.options.window_days, "no data for window, trying max range");

        let chart = self
            .source
            .market_chart(coin, ChartRange::Max)
            .map_err(|source| CoinFetchError::Request {
                phase: FetchPhase::Max,
                source,
            })?;

        if !chart.has_prices() {
            warn!(coin, "no data available even with max range");
            return Err(CoinFetchError::NoData);
        }

        let records = normalize_with(&chart, coin, self.options.alignment).map_err(|source| {
            CoinFetchError::Normalize {
                phase: FetchPhase::Max,
                source,
            }
        })?;
        let records = filter_trailing(records, self.options.window_days, (self.clock)());
        if records.is_empty() {
            warn!(
                coin,
                days = self.options.window_days,
                "max range has no data inside the trailing window"
            );
            return Err(CoinFetchError::NoData);
        }

        Ok(CoinHistory {
            coin: coin.to_string(),
            range: ChartRange::Max,
            records,
        })
    }
}
