//! Market chart normalization.
//!
//! Flattens the three parallel `[timestamp, value]` series of a market chart
//! payload into one row per price point:
//!
//! `date, coin, price, market_cap, volume`
//!
//! Market caps and volumes are matched to prices by position by default. The
//! upstream API emits the three series on the same timestamps, so positional
//! matching is exact for well-formed payloads; a length mismatch is logged and
//! the unmatched rows are left null rather than failing the coin.

use super::provider::{ChartPoint, CoinId, MarketChart};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

/// Below this many price points a coin is noted as having a short history.
pub const FULL_YEAR_POINTS: usize = 365;

/// How the market cap and volume series are matched to price points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Row `i` takes element `i` of each series.
    #[default]
    Positional,
    /// Row takes the series element with the same timestamp.
    Timestamp,
}

/// One normalized row of the result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinRecord {
    pub date: NaiveDate,
    pub coin: CoinId,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("missing expected data field 'prices' for {coin}")]
    MissingPrices { coin: CoinId },

    #[error("invalid timestamp {timestamp_ms} for {coin}")]
    InvalidTimestamp { coin: CoinId, timestamp_ms: i64 },
}

/// Normalize with positional alignment.
pub fn normalize(chart: &MarketChart, coin: &str) -> Result<Vec<CoinRecord>, NormalizeError> {
    normalize_with(chart, coin, Alignment::Positional)
}

/// Normalize a market chart payload into rows for `coin`.
///
/// Rows come out in timestamp order, one per UTC date; when two price points
/// share a date the later one is kept. Fails only when `prices` is absent.
pub fn normalize_with(
    chart: &MarketChart,
    coin: &str,
    alignment: Alignment,
) -> Result<Vec<CoinRecord>, NormalizeError> {
    let prices = chart
        .prices
        .as_deref()
        .ok_or_else(|| NormalizeError::MissingPrices {
            coin: coin.to_string(),
        })?;

    if prices.len() < FULL_YEAR_POINTS {
        info!(coin, points = prices.len(), "coin has only {} days of data", prices.len());
    }

    let market_caps = align_series(prices, chart.market_caps.as_deref(), alignment, coin, "market_caps");
    let volumes = align_series(prices, chart.total_volumes.as_deref(), alignment, coin, "total_volumes");

    let mut rows: Vec<(i64, CoinRecord)> = Vec::with_capacity(prices.len());
    for (i, point) in prices.iter().enumerate() {
        let date = date_of(point.timestamp_ms).ok_or_else(|| NormalizeError::InvalidTimestamp {
            coin: coin.to_string(),
            timestamp_ms: point.timestamp_ms,
        })?;
        rows.push((
            point.timestamp_ms,
            CoinRecord {
                date,
                coin: coin.to_string(),
                price: point.value,
                market_cap: market_caps[i],
                volume: volumes[i],
            },
        ));
    }

    // Stable: points with equal timestamps keep payload order.
    rows.sort_by_key(|(ts, _)| *ts);

    let mut records: Vec<CoinRecord> = Vec::with_capacity(rows.len());
    for (_, record) in rows {
        if let Some(last) = records.last_mut() {
            if last.date == record.date {
                *last = record;
                continue;
            }
        }
        records.push(record);
    }

    if records.len() < prices.len() {
        debug!(
            coin,
            dropped = prices.len() - records.len(),
            "collapsed price points sharing a date"
        );
    }

    Ok(records)
}

/// Keep only records inside the trailing `window_days` ending at `now`.
pub fn filter_trailing(
    records: Vec<CoinRecord>,
    window_days: u32,
    now: DateTime<Utc>,
) -> Vec<CoinRecord> {
    let cutoff = trailing_cutoff(window_days, now);
    records.into_iter().filter(|r| r.date >= cutoff).collect()
}

/// First date inside the trailing window.
pub fn trailing_cutoff(window_days: u32, now: DateTime<Utc>) -> NaiveDate {
    (now - Duration::days(i64::from(window_days))).date_naive()
}

fn date_of(timestamp_ms: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(timestamp_ms).map(|dt| dt.date_naive())
}

fn align_series(
    prices: &[ChartPoint],
    series: Option<&[ChartPoint]>,
    alignment: Alignment,
    coin: &str,
    field: &str,
) -> Vec<Option<f64>> {
    let Some(series) = series else {
        return vec![None; prices.len()];
    };

    if series.len() != prices.len() {
        info!(
            coin,
            field,
            expected = prices.len(),
            got = series.len(),
            "series length differs from prices"
        );
    }

    match alignment {
        Alignment::Positional => (0..prices.len())
            .map(|i| series.get(i).and_then(|p| p.value))
            .collect(),
        Alignment::Timestamp => {
            let by_ts: HashMap<i64, Option<f64>> =
                series.iter().map(|p| (p.timestamp_ms, p.value)).collect();
            prices
                .iter()
                .map(|p| by_ts.get(&p.timestamp_ms).copied().flatten())
                .collect()
        }
    }
}
