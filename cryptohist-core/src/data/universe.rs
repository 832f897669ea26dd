//! Coin universe: the top coins by market capitalization.
//!
//! Resolved fresh on every run with a single ranking request. Failure yields
//! an empty universe, which the harvester treats as fatal.

use super::provider::{CoinId, MarketDataSource};
use tracing::{error, info, warn};

/// Ids of the top `count` coins in rank order, or an empty vector on failure.
pub fn resolve_top_coins(source: &dyn MarketDataSource, count: usize) -> Vec<CoinId> {
    match source.top_coins(count) {
        Ok(coins) => {
            if coins.len() != count {
                warn!(
                    requested = count,
                    received = coins.len(),
                    "received {} coins instead of {count}",
                    coins.len()
                );
            }
            let ids: Vec<CoinId> = coins.into_iter().map(|c| c.id).collect();
            info!(source = source.name(), coins = ids.len(), "resolved coin universe");
            ids
        }
        Err(e) => {
            error!(source = source.name(), error = %e, "failed to fetch top {count} coins");
            Vec::new()
        }
    }
}
