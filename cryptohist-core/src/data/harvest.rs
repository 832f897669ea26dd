//! Harvest orchestrator. Resolves the coin universe, fetches every coin in
//! rank order with a fixed delay between coins, and writes the combined table.
//!
//! Requests are strictly sequential. The delay after each coin applies whether
//! the coin succeeded or not, and one coin's failure never stops the batch.

use super::export::{write_table, ExportError, TableMeta};
use super::fetch::{CoinFetcher, CoinHistory, FetchOptions};
use super::normalize::CoinRecord;
use super::pacing::Pacer;
use super::provider::{CoinId, MarketDataSource};
use super::universe::resolve_top_coins;
use crate::config::HarvestConfig;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("failed to retrieve coin ids, nothing to harvest")]
    EmptyUniverse,

    #[error("failed to save table: {0}")]
    Export(#[from] ExportError),
}

/// Progress callback for a harvest run.
pub trait HarvestProgress {
    /// Called when starting to fetch a coin.
    fn on_start(&self, coin: &str, index: usize, total: usize);

    /// Called when a coin is done. `rows` is `None` when the coin was skipped.
    fn on_complete(&self, coin: &str, index: usize, total: usize, rows: Option<usize>);

    /// Called once after the last coin.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that emits `tracing` events.
pub struct LogProgress;

impl HarvestProgress for LogProgress {
    fn on_start(&self, coin: &str, index: usize, total: usize) {
        info!(coin, "processing {coin} ({}/{total})", index + 1);
    }

    fn on_complete(&self, coin: &str, _index: usize, _total: usize, rows: Option<usize>) {
        match rows {
            Some(rows) => info!(coin, rows, "retrieved {rows} records for {coin}"),
            None => warn!(coin, "failed to retrieve data for {coin}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        info!(succeeded, failed, total, "harvest complete: {succeeded}/{total} coins retrieved");
    }
}

/// Summary of a harvest run.
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<CoinId>,
    pub rows: usize,
    /// Where the table was written; `None` when no coin returned data.
    pub output: Option<PathBuf>,
    pub meta: Option<TableMeta>,
}

impl HarvestSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn wrote_output(&self) -> bool {
        self.output.is_some()
    }
}

/// Runs the whole pipeline once.
pub struct Harvester<'a> {
    source: &'a dyn MarketDataSource,
    pacer: &'a dyn Pacer,
    progress: &'a dyn HarvestProgress,
    config: &'a HarvestConfig,
}

impl<'a> Harvester<'a> {
    pub fn new(
        source: &'a dyn MarketDataSource,
        pacer: &'a dyn Pacer,
        progress: &'a dyn HarvestProgress,
        config: &'a HarvestConfig,
    ) -> Self {
        Self {
            source,
            pacer,
            progress,
            config,
        }
    }

    /// Resolve, fetch, and write.
    ///
    /// Returns `Err` only when the universe is empty or the write fails. A run
    /// in which every coin failed is `Ok` with `output: None`.
    pub fn run(&self) -> Result<HarvestSummary, HarvestError> {
        info!(source = self.source.name(), "starting data retrieval");

        let coins = resolve_top_coins(self.source, self.config.top_n);
        if coins.is_empty() {
            error!("failed to retrieve coin ids, exiting");
            return Err(HarvestError::EmptyUniverse);
        }
        info!(coins = coins.len(), "retrieved {} coin ids", coins.len());

        let (histories, failed) = self.collect(&coins);
        let succeeded = histories.len();
        self.progress
            .on_batch_complete(succeeded, failed.len(), coins.len());

        let table: Vec<CoinRecord> = histories.into_iter().flat_map(|h| h.records).collect();

        if succeeded == 0 || table.is_empty() {
            error!("no data collected, table not written");
            return Ok(HarvestSummary {
                total: coins.len(),
                succeeded,
                failed,
                rows: 0,
                output: None,
                meta: None,
            });
        }

        let path = self.config.output_path.clone();
        let meta = write_table(&path, &table).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to save table");
            e
        })?;
        info!(path = %path.display(), rows = table.len(), "saved data with {} records", table.len());

        Ok(HarvestSummary {
            total: coins.len(),
            succeeded,
            failed,
            rows: table.len(),
            output: Some(path),
            meta: Some(meta),
        })
    }

    /// Fetch every coin in order, pausing after each one.
    pub fn collect(&self, coins: &[CoinId]) -> (Vec<CoinHistory>, Vec<CoinId>) {
        let fetcher = CoinFetcher::new(self.source, self.pacer, FetchOptions::from_config(self.config));
        let delay = self.config.pacing.request_delay();
        let total = coins.len();

        let mut histories = Vec::new();
        let mut failed = Vec::new();

        for (i, coin) in coins.iter().enumerate() {
            self.progress.on_start(coin, i, total);

            match fetcher.fetch(coin) {
                Some(history) => {
                    self.progress.on_complete(coin, i, total, Some(history.len()));
                    histories.push(history);
                }
                None => {
                    self.progress.on_complete(coin, i, total, None);
                    failed.push(coin.clone());
                }
            }

            self.pacer.pause(delay);
        }

        (histories, failed)
    }
}
