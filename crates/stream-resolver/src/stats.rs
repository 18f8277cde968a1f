//! Usage counters for the resolution pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::info;

/// Running counters for resolution outcomes.
///
/// All counters use atomic operations so concurrent extractions can record
/// outcomes without a lock.
#[derive(Debug)]
pub struct ResolverStats {
    /// Every `extract` call, whatever its outcome
    total_requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    cache_hits: AtomicU64,
    /// Calls short-circuited by the failure cache
    recent_failure_skips: AtomicU64,
    /// Sum and count of latencies of calls that went to the network
    latency_sum_ms: AtomicU64,
    latency_samples: AtomicU64,
    episode_requests: AtomicU64,
    episode_failures: AtomicU64,
    last_reset: Mutex<Instant>,
}

impl Default for ResolverStats {
    fn default() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            recent_failure_skips: AtomicU64::new(0),
            latency_sum_ms: AtomicU64::new(0),
            latency_samples: AtomicU64::new(0),
            episode_requests: AtomicU64::new(0),
            episode_failures: AtomicU64::new(0),
            last_reset: Mutex::new(Instant::now()),
        }
    }
}

impl ResolverStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a success. Direct URLs pass `None`: they cost nothing to resolve.
    pub fn record_success(&self, latency: Option<Duration>) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = latency {
            self.record_latency(latency);
        }
    }

    pub fn record_failure(&self, latency: Duration) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recent_failure_skip(&self) {
        self.recent_failure_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_episode(&self, succeeded: bool) {
        self.episode_requests.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.episode_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_sum_ms.fetch_add(ms, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.recent_failure_skips.store(0, Ordering::Relaxed);
        self.latency_sum_ms.store(0, Ordering::Relaxed);
        self.latency_samples.store(0, Ordering::Relaxed);
        self.episode_requests.store(0, Ordering::Relaxed);
        self.episode_failures.store(0, Ordering::Relaxed);
        *self.last_reset.lock() = Instant::now();
        info!("Resolver statistics reset");
    }

    /// Counters and derived rates as of now. Cache sizes are filled in by the caller
    /// that owns the cache.
    pub fn snapshot(&self) -> StatsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let successes = self.successes.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let samples = self.latency_samples.load(Ordering::Relaxed);
        let avg_latency_ms = if samples > 0 {
            self.latency_sum_ms.load(Ordering::Relaxed) / samples
        } else {
            0
        };

        StatsSnapshot {
            total_requests: total,
            successes,
            failures: self.failures.load(Ordering::Relaxed),
            cache_hits,
            recent_failure_skips: self.recent_failure_skips.load(Ordering::Relaxed),
            episode_requests: self.episode_requests.load(Ordering::Relaxed),
            episode_failures: self.episode_failures.load(Ordering::Relaxed),
            avg_latency_ms,
            success_rate: rate(successes, total),
            cache_hit_rate: rate(cache_hits, total),
            cache_size: 0,
            failure_cache_size: 0,
            uptime_secs: self.last_reset.lock().elapsed().as_secs(),
        }
    }
}

fn rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Point-in-time view of [`ResolverStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub recent_failure_skips: u64,
    pub episode_requests: u64,
    pub episode_failures: u64,
    pub avg_latency_ms: u64,
    /// successes / total requests, in `[0, 1]`
    pub success_rate: f64,
    /// cache hits / total requests, in `[0, 1]`
    pub cache_hit_rate: f64,
    pub cache_size: usize,
    pub failure_cache_size: usize,
    /// Seconds since the counters were last reset
    pub uptime_secs: u64,
}
