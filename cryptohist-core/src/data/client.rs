//! CoinGecko v3 HTTP client.
//!
//! One blocking session per process, with a bounded retry policy on transient
//! statuses (429, 500, 502, 503, 504) and connect/timeout failures. Backoff
//! doubles per retry; a `Retry-After` header in seconds lengthens the wait but
//! never shortens it. Only GET is issued, so every retried request is
//! idempotent. When retries run out the last error is returned as-is; a final
//! 429 surfaces as [`FetchError::RateLimited`] so the fetcher can apply its
//! own cooldown.

use super::pacing::{Pacer, ThreadPacer};
use super::provider::{ChartRange, CoinMarket, FetchError, MarketChart, MarketDataSource};
use crate::config::{HarvestConfig, HttpConfig};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Statuses retried by the transport layer.
pub const RETRY_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// CoinGecko data source.
pub struct CoinGeckoClient {
    client: reqwest::blocking::Client,
    http: HttpConfig,
    vs_currency: String,
    pacer: Arc<dyn Pacer + Send + Sync>,
}

impl CoinGeckoClient {
    pub fn new(http: HttpConfig, vs_currency: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(http.timeout())
            .user_agent(http.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            http,
            vs_currency: vs_currency.into(),
            pacer: Arc::new(ThreadPacer),
        })
    }

    pub fn from_config(config: &HarvestConfig) -> Result<Self, FetchError> {
        Self::new(config.http.clone(), config.vs_currency.clone())
    }

    /// Replace the pacer used for retry backoff.
    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer + Send + Sync>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url.trim_end_matches('/')
    }

    /// GET `{base_url}{path}` and decode the JSON body, retrying transient failures.
    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{path}", self.base_url());
        let mut last_error = None;
        let mut retry_after = None;

        for attempt in 0..=self.http.max_retries {
            if attempt > 0 {
                let backoff = self.http.backoff(attempt);
                let delay = retry_after
                    .take()
                    .map_or(backoff, |wait: Duration| wait.max(backoff));
                debug!(%url, attempt, ?delay, "retrying request");
                self.pacer.pause(delay);
            }

            let mut request = self.client.get(&url).query(query);
            if let Some(key) = &self.http.api_key {
                request = request.header(API_KEY_HEADER, key);
            }

            match request.send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        return resp
                            .json::<T>()
                            .map_err(|e| FetchError::Decode(format!("{url}: {e}")));
                    }

                    let error = if status == StatusCode::TOO_MANY_REQUESTS {
                        FetchError::RateLimited
                    } else {
                        FetchError::HttpStatus {
                            status: status.as_u16(),
                            url: url.clone(),
                        }
                    };

                    if !RETRY_STATUS_CODES.contains(&status.as_u16()) {
                        return Err(error);
                    }

                    retry_after = parse_retry_after(resp.headers());
                    warn!(
                        %url,
                        status = status.as_u16(),
                        attempt,
                        ?retry_after,
                        "transient HTTP status"
                    );
                    last_error = Some(error);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        warn!(%url, attempt, error = %e, "transient network failure");
                        last_error = Some(FetchError::Network(e.to_string()));
                        continue;
                    }
                    return Err(FetchError::Network(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Network("max retries exceeded".into())))
    }
}

/// `Retry-After` as delta-seconds. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}

impl MarketDataSource for CoinGeckoClient {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn top_coins(&self, count: usize) -> Result<Vec<CoinMarket>, FetchError> {
        self.get_json(
            "/coins/markets",
            &[
                ("vs_currency", self.vs_currency.clone()),
                ("order", "market_cap_desc".to_string()),
                ("per_page", count.to_string()),
                ("page", "1".to_string()),
            ],
        )
    }

    fn market_chart(&self, coin: &str, range: ChartRange) -> Result<MarketChart, FetchError> {
        self.get_json(
            &format!("/coins/{coin}/market_chart"),
            &[
                ("vs_currency", self.vs_currency.clone()),
                ("days", range.as_query()),
                ("interval", "daily".to_string()),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_default_config() {
        let client = CoinGeckoClient::from_config(&HarvestConfig::default()).unwrap();
        assert_eq!(client.name(), "coingecko");
        assert_eq!(client.base_url(), "https://api.coingecko.com/api/v3");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let http = HttpConfig {
            base_url: "http://localhost:1234/api/".into(),
            ..Default::default()
        };
        let client = CoinGeckoClient::new(http, "usd").unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234/api");
    }

    #[test]
    fn retry_set_matches_transient_statuses() {
        for code in [429, 500, 502, 503, 504] {
            assert!(RETRY_STATUS_CODES.contains(&code));
        }
        assert!(!RETRY_STATUS_CODES.contains(&404));
        assert!(!RETRY_STATUS_CODES.contains(&401));
    }

    #[test]
    fn retry_after_accepts_only_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, " 7 ".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), None);
    }
}
