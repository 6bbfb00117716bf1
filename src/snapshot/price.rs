//! Block-keyed memoization of resolved USD rates.

use alloy::primitives::Address;
use moka::future::Cache;

/// Append-only (token, block) -> USD rate store.
///
/// Resolution is deterministic for a given block, so concurrent writers for
/// the same key always insert the same value and idempotence holds.
pub struct PriceSnapshotCache {
    cache: Cache<(Address, u64), f64>,
}

impl PriceSnapshotCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::new(100_000),
        }
    }

    pub async fn get(&self, token: Address, block: u64) -> Option<f64> {
        self.cache.get(&(token, block)).await
    }

    pub async fn insert(&self, token: Address, block: u64, rate: f64) {
        self.cache.insert((token, block), rate).await;
    }
}

impl Default for PriceSnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}
