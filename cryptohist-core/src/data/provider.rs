//! Market data source trait and structured error types.
//!
//! The MarketDataSource trait abstracts over the upstream API so the resolver,
//! the per-coin fetcher and the batch driver can run against a scripted source
//! in tests. The HTTP client is the only production implementation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque identifier naming one coin in the data source (e.g. `"bitcoin"`).
pub type CoinId = String;

/// Structured error types for upstream requests.
///
/// Rate limiting is a separate variant because the fetcher recovers from it
/// with a cooldown instead of skipping the coin.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("rate limited by provider (HTTP 429)")]
    RateLimited,

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("response format changed: {0}")]
    Decode(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// How much history to request for a coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartRange {
    /// Trailing number of days.
    Days(u32),
    /// Entire available history.
    Max,
}

impl ChartRange {
    /// Value of the `days` query parameter.
    pub fn as_query(&self) -> String {
        match self {
            ChartRange::Days(n) => n.to_string(),
            ChartRange::Max => "max".to_string(),
        }
    }
}

impl fmt::Display for ChartRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartRange::Days(n) => write!(f, "{n}d"),
            ChartRange::Max => f.write_str("max"),
        }
    }
}

/// One `[timestamp_ms, value]` pair from a market chart series.
///
/// Values are independently optional: the API sends `null` for gaps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, Option<f64>)", into = "(f64, Option<f64>)")]
pub struct ChartPoint {
    pub timestamp_ms: i64,
    pub value: Option<f64>,
}

impl ChartPoint {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value: Some(value),
        }
    }
}

impl From<(f64, Option<f64>)> for ChartPoint {
    fn from((ts, value): (f64, Option<f64>)) -> Self {
        Self {
            timestamp_ms: ts as i64,
            value,
        }
    }
}

impl From<ChartPoint> for (f64, Option<f64>) {
    fn from(p: ChartPoint) -> Self {
        (p.timestamp_ms as f64, p.value)
    }
}

/// Raw `/coins/{id}/market_chart` payload.
///
/// `prices` is mandatory for normalization; it is still an `Option` here so a
/// structurally missing field can be reported instead of failing the decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketChart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prices: Option<Vec<ChartPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_caps: Option<Vec<ChartPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_volumes: Option<Vec<ChartPoint>>,
}

impl MarketChart {
    /// True when the payload carries at least one price point.
    pub fn has_prices(&self) -> bool {
        self.prices.as_ref().is_some_and(|p| !p.is_empty())
    }
}

/// One entry of the `/coins/markets` ranking. Only `id` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinMarket {
    pub id: CoinId,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

/// Trait for market data sources.
///
/// Implementations handle transport-level retries themselves; callers only
/// see the final outcome of each logical request.
pub trait MarketDataSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Top `count` coins by market capitalization, in rank order.
    fn top_coins(&self, count: usize) -> Result<Vec<CoinMarket>, FetchError>;

    /// Daily price / market cap / volume series for one coin.
    fn market_chart(&self, coin: &str, range: ChartRange) -> Result<MarketChart, FetchError>;
}

impl<T: MarketDataSource + ?Sized> MarketDataSource for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn top_coins(&self, count: usize) -> Result<Vec<CoinMarket>, FetchError> {
        (**self).top_coins(count)
    }

    fn market_chart(&self, coin: &str, range: ChartRange) -> Result<MarketChart, FetchError> {
        (**self).market_chart(coin, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_range_query_values() {
        assert_eq!(ChartRange::Days(365).as_query(), "365");
        assert_eq!(ChartRange::Max.as_query(), "max");
    }

    #[test]
    fn decodes_market_chart_with_nulls_and_integer_timestamps() {
        let json = r#"{
            "prices": [[1700000000000, 37000.5], [1700086400000, null]],
            "total_volumes": [[1700000000000, 1.5e10]]
        }"#;
        let chart: MarketChart = serde_json::from_str(json).unwrap();
        let prices = chart.prices.as_ref().unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].timestamp_ms, 1_700_000_000_000);
        assert_eq!(prices[0].value, Some(37000.5));
        assert_eq!(prices[1].value, None);
        assert!(chart.market_caps.is_none());
        assert_eq!(chart.total_volumes.as_ref().unwrap().len(), 1);
        assert!(chart.has_prices());
    }

    #[test]
    fn missing_prices_field_still_decodes() {
        let chart: MarketChart = serde_json::from_str(r#"{"market_caps": []}"#).unwrap();
        assert!(chart.prices.is_none());
        assert!(!chart.has_prices());
    }

    #[test]
    fn empty_prices_means_no_data() {
        let chart: MarketChart = serde_json::from_str(r#"{"prices": []}"#).unwrap();
        assert!(!chart.has_prices());
    }

    #[test]
    fn coin_market_tolerates_sparse_entries() {
        let coins: Vec<CoinMarket> =
            serde_json::from_str(r#"[{"id": "bitcoin", "symbol": "btc"}, {"id": "ethereum"}]"#)
                .unwrap();
        assert_eq!(coins[0].id, "bitcoin");
        assert_eq!(coins[1].symbol, "");
        assert!(coins[1].market_cap_rank.is_none());
    }
}
