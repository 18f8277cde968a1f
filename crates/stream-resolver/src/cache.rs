//! In-memory expiring cache of extraction outcomes.
//!
//! Two stores share one key space: successful results and short-lived failure
//! marks. Both are bounded by size and evict in insertion order once the bound is
//! exceeded. Entries past their TTL are treated as absent and dropped lazily on
//! lookup, or eagerly when a store is pruned.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::media::ExtractionResult;

/// Cache sizing and expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of a successful result.
    pub ttl: Duration,
    /// Lifetime of a failure mark.
    pub failure_ttl: Duration,
    /// Size above which the oldest `evict_batch` results are dropped.
    pub max_entries: usize,
    pub evict_batch: usize,
    /// Size above which the oldest `failure_evict_batch` failure marks are dropped.
    pub max_failures: usize,
    pub failure_evict_batch: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            failure_ttl: Duration::from_secs(5 * 60),
            max_entries: 200,
            evict_batch: 50,
            max_failures: 100,
            failure_evict_batch: 20,
        }
    }
}

/// 32-bit rolling hash of a URL (`h = h * 31 + unit` over UTF-16 code units).
///
/// Collisions are possible. Entries also remember their URL, so a collision
/// surfaces as a cache miss rather than a wrong result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(u32);

impl CacheKey {
    pub fn from_url(url: &str) -> Self {
        let hash = url.encode_utf16().fold(0i32, |hash, unit| {
            hash.wrapping_shl(5)
                .wrapping_sub(hash)
                .wrapping_add(i32::from(unit))
        });
        Self(hash.unsigned_abs())
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CacheKey {
    /// Base-36, the compact form used in log lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let mut n = self.0;
        let mut buf = [0u8; 7];
        let mut pos = buf.len();
        loop {
            pos -= 1;
            buf[pos] = DIGITS[(n % 36) as usize];
            n /= 36;
            if n == 0 {
                break;
            }
        }
        // all bytes come from DIGITS
        f.write_str(std::str::from_utf8(&buf[pos..]).unwrap_or_default())
    }
}

#[derive(Debug)]
struct Entry<V> {
    url: String,
    payload: V,
    inserted_at: Instant,
    ttl: Duration,
    seq: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

/// Size-bounded TTL map with insertion-order eviction.
#[derive(Debug)]
struct TtlStore<V> {
    entries: FxHashMap<CacheKey, Entry<V>>,
    order: BTreeMap<u64, CacheKey>,
    next_seq: u64,
    max_entries: usize,
    evict_batch: usize,
}

impl<V: Clone> TtlStore<V> {
    fn new(max_entries: usize, evict_batch: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            order: BTreeMap::new(),
            next_seq: 0,
            max_entries,
            evict_batch: evict_batch.max(1),
        }
    }

    fn get(&mut self, key: CacheKey, url: &str, now: Instant) -> Option<V> {
        let entry = self.entries.get(&key)?;
        if entry.is_expired(now) {
            self.remove(key);
            return None;
        }
        if entry.url != url {
            debug!(key = %key, "Cache key collision, treating as miss");
            return None;
        }
        Some(entry.payload.clone())
    }

    fn insert(&mut self, key: CacheKey, url: &str, payload: V, ttl: Duration, now: Instant) {
        self.remove(key);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key);
        self.entries.insert(
            key,
            Entry {
                url: url.to_string(),
                payload,
                inserted_at: now,
                ttl,
                seq,
            },
        );

        if self.entries.len() > self.max_entries {
            self.prune_expired(now);
        }
        if self.entries.len() > self.max_entries {
            self.evict_oldest(self.evict_batch);
        }
    }

    fn remove(&mut self, key: CacheKey) {
        if let Some(entry) = self.entries.remove(&key) {
            self.order.remove(&entry.seq);
        }
    }

    fn prune_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| *key)
            .collect();
        for key in &expired {
            self.remove(*key);
        }
        expired.len()
    }

    fn evict_oldest(&mut self, count: usize) {
        for _ in 0..count {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&key);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Process-wide cache of extraction results and recent failures.
#[derive(Debug)]
pub struct ResultCache {
    config: CacheConfig,
    results: Mutex<TtlStore<ExtractionResult>>,
    failures: Mutex<TtlStore<()>>,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            results: Mutex::new(TtlStore::new(config.max_entries, config.evict_batch)),
            failures: Mutex::new(TtlStore::new(
                config.max_failures,
                config.failure_evict_batch,
            )),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the cached result for `url` if present and unexpired.
    pub fn get(&self, url: &str) -> Option<ExtractionResult> {
        self.results
            .lock()
            .get(CacheKey::from_url(url), url, Instant::now())
    }

    /// Stores a result with the default TTL.
    pub fn set(&self, url: &str, result: ExtractionResult) {
        self.set_with_ttl(url, result, self.config.ttl);
    }

    pub fn set_with_ttl(&self, url: &str, result: ExtractionResult, ttl: Duration) {
        self.results
            .lock()
            .insert(CacheKey::from_url(url), url, result, ttl, Instant::now());
    }

    /// Records that `url` just exhausted its attempts.
    pub fn set_failure(&self, url: &str) {
        self.failures.lock().insert(
            CacheKey::from_url(url),
            url,
            (),
            self.config.failure_ttl,
            Instant::now(),
        );
    }

    pub fn has_recent_failure(&self, url: &str) -> bool {
        self.failures
            .lock()
            .get(CacheKey::from_url(url), url, Instant::now())
            .is_some()
    }

    /// Drops expired entries from both stores, returning how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        self.results.lock().prune_expired(now) + self.failures.lock().prune_expired(now)
    }

    pub fn clear(&self) {
        self.results.lock().clear();
        self.failures.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn failure_len(&self) -> usize {
        self.failures.lock().len()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
