//! Shared fixtures: a scripted market data source and daily series builders.

#![allow(dead_code)]

use chrono::{NaiveDate, Utc};
use cryptohist_core::data::{
    ChartPoint, ChartRange, CoinMarket, FetchError, MarketChart, MarketDataSource,
};
use cryptohist_core::HarvestConfig;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

pub const DAY_MS: i64 = 86_400_000;

/// Market data source that replays per-coin responses in order.
///
/// Unscripted chart requests fail with a network error.
pub struct ScriptedSource {
    ranking: Result<Vec<String>, u16>,
    charts: Mutex<HashMap<String, VecDeque<Result<MarketChart, FetchError>>>>,
    requests: Mutex<Vec<(String, ChartRange)>>,
}

impl ScriptedSource {
    pub fn with_ranking(ids: &[&str]) -> Self {
        Self {
            ranking: Ok(ids.iter().map(|s| s.to_string()).collect()),
            charts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_ranking(status: u16) -> Self {
        Self {
            ranking: Err(status),
            charts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response for the next chart request of `coin`.
    pub fn then(self, coin: &str, response: Result<MarketChart, FetchError>) -> Self {
        self.charts
            .lock()
            .unwrap()
            .entry(coin.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<(String, ChartRange)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, coin: &str) -> Vec<ChartRange> {
        self.requests()
            .into_iter()
            .filter(|(c, _)| c == coin)
            .map(|(_, r)| r)
            .collect()
    }
}

impl MarketDataSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn top_coins(&self, count: usize) -> Result<Vec<CoinMarket>, FetchError> {
        match &self.ranking {
            Ok(ids) => Ok(ids
                .iter()
                .take(count)
                .enumerate()
                .map(|(i, id)| CoinMarket {
                    id: id.clone(),
                    symbol: id.chars().take(3).collect(),
                    name: id.clone(),
                    market_cap_rank: Some(i as u32 + 1),
                    market_cap: None,
                })
                .collect()),
            Err(status) => Err(FetchError::HttpStatus {
                status: *status,
                url: "/coins/markets".into(),
            }),
        }
    }

    fn market_chart(&self, coin: &str, range: ChartRange) -> Result<MarketChart, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((coin.to_string(), range));
        self.charts
            .lock()
            .unwrap()
            .get_mut(coin)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| Err(FetchError::Network(format!("no scripted response for {coin}"))))
    }
}

/// Midnight UTC of today, in epoch milliseconds.
pub fn today_ms() -> i64 {
    Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis()
}

/// `n` consecutive daily points ending today, all three series populated.
pub fn daily_chart(n: usize, base_price: f64) -> MarketChart {
    daily_chart_ending(n, base_price, today_ms())
}

/// `n` consecutive daily points ending at `end` (epoch milliseconds).
pub fn daily_chart_ending(n: usize, base_price: f64, end: i64) -> MarketChart {
    let points = |scale: f64| -> Vec<ChartPoint> {
        (0..n)
            .map(|i| {
                ChartPoint::new(
                    end - (n - 1 - i) as i64 * DAY_MS,
                    scale * (base_price + i as f64),
                )
            })
            .collect()
    };
    MarketChart {
        prices: Some(points(1.0)),
        market_caps: Some(points(1e6)),
        total_volumes: Some(points(1e3)),
    }
}

pub fn empty_chart() -> MarketChart {
    MarketChart {
        prices: Some(vec![]),
        market_caps: Some(vec![]),
        total_volumes: Some(vec![]),
    }
}

/// Default config writing into `dir`.
pub fn config_in(dir: &Path) -> HarvestConfig {
    HarvestConfig {
        output_path: dir.join("data/crypto_historical_data.csv"),
        ..HarvestConfig::default()
    }
}

pub fn date_of_ms(ms: i64) -> NaiveDate {
    chrono::DateTime::from_timestamp_millis(ms).unwrap().date_naive()
}
