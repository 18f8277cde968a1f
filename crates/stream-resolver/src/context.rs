//! Shared mutable state of the pipeline.

use crate::cache::{CacheConfig, ResultCache};
use crate::stats::{ResolverStats, StatsSnapshot};

/// The cache and counters shared by every extraction.
///
/// One instance is created by the application's composition root and handed to
/// the engine behind an `Arc`; tests build a fresh one per case.
#[derive(Debug, Default)]
pub struct ResolverContext {
    pub cache: ResultCache,
    pub stats: ResolverStats,
}

impl ResolverContext {
    pub fn new(cache_config: CacheConfig) -> Self {
        Self {
            cache: ResultCache::new(cache_config),
            stats: ResolverStats::new(),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let mut snapshot = self.stats.snapshot();
        snapshot.cache_size = self.cache.len();
        snapshot.failure_cache_size = self.cache.failure_len();
        snapshot
    }

    /// Zeroes the counters and empties both cache stores.
    pub fn reset(&self) {
        self.stats.reset();
        self.cache.clear();
    }
}
