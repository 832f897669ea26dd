//! Market data acquisition: client, universe, normalization, fetch, harvest, export

pub mod client;
pub mod export;
pub mod fetch;
pub mod harvest;
pub mod normalize;
pub mod pacing;
pub mod provider;
pub mod universe;

pub use client::CoinGeckoClient;
pub use export::{read_csv, write_csv, write_table, ExportError, TableMeta};
pub use fetch::{CoinFetchError, CoinFetcher, CoinHistory, FetchOptions, FetchPhase};
pub use harvest::{HarvestError, HarvestProgress, HarvestSummary, Harvester, LogProgress};
pub use normalize::{filter_trailing, normalize, normalize_with, Alignment, CoinRecord, NormalizeError};
pub use pacing::{Pacer, RecordingPacer, ThreadPacer};
pub use provider::{ChartPoint, ChartRange, CoinId, CoinMarket, FetchError, MarketChart, MarketDataSource};
pub use universe::resolve_top_coins;
