//! Cache storage.
//!
//! One map owns both values and access-tracking metadata, so tracking can
//! never drift from membership: every key has exactly one entry record by
//! construction. Reads, writes, and the sweeper all go through the same
//! mutex, which keeps the sweep from removing an entry mid-read.

use std::collections::HashMap;
use std::mem;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::counter;
use tracing::debug;

use super::config::{CacheConfig, EvictionPolicy};
use super::lock::mutex_lock;

const METRIC_CACHE_HIT_TOTAL: &str = "calcengine_cache_hit_total";
const METRIC_CACHE_MISS_TOTAL: &str = "calcengine_cache_miss_total";
const METRIC_CACHE_EVICT_TOTAL: &str = "calcengine_cache_evict_total";
const METRIC_CACHE_EXPIRED_TOTAL: &str = "calcengine_cache_expired_total";

/// Time source for TTL arithmetic. Injected so tests run on a simulated
/// clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time source used outside tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
    access_count: u64,
    last_accessed_at: Instant,
    /// Monotonic insertion sequence, the FIFO ordering.
    seq: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }
}

struct StoreInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    next_seq: u64,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    /// Hits over all lookups, 0.0 when nothing was looked up yet.
    pub hit_rate: f64,
    /// Shallow estimate: key bytes plus per-entry bookkeeping. Heap data
    /// owned by values is not traversed.
    pub approx_memory_bytes: u64,
}

/// Bounded key/value store with per-entry TTL and configurable eviction.
pub struct CacheStore<V> {
    inner: Mutex<StoreInner<V>>,
    config: CacheConfig,
    clock: Box<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> CacheStore<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    /// Construct with an explicit time source.
    pub fn with_clock(config: CacheConfig, clock: impl Clock + 'static) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
            config,
            clock: Box::new(clock),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a value, refreshing access tracking on a hit.
    ///
    /// An entry past its TTL is removed and reported absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut inner = mutex_lock(&self.inner, "get");

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            inner.entries.remove(key);
            counter!(METRIC_CACHE_EXPIRED_TOTAL).increment(1);
            counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let entry = inner.entries.get_mut(key)?;
        entry.access_count += 1;
        entry.last_accessed_at = now;
        counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// Insert or overwrite an entry.
    ///
    /// When the key is new and the store is at capacity, exactly one entry
    /// chosen by the configured policy is evicted first. Overwriting an
    /// existing key never evicts; a key holds at most one entry at any time.
    pub fn insert(&self, key: String, value: V, ttl: Option<Duration>) {
        let now = self.clock.now();
        let ttl = ttl.unwrap_or_else(|| self.config.default_ttl());
        let mut inner = mutex_lock(&self.inner, "insert");

        let is_new = !inner.entries.contains_key(&key);
        if is_new && inner.entries.len() >= self.config.max_entries_non_zero() {
            self.evict_one(&mut inner);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                ttl,
                access_count: 0,
                last_accessed_at: now,
                seq,
            },
        );
    }

    fn evict_one(&self, inner: &mut StoreInner<V>) {
        let policy = self.config.eviction_policy;
        let victim = match policy {
            EvictionPolicy::Lru => inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed_at),
            EvictionPolicy::Lfu => inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.access_count, entry.last_accessed_at)),
            EvictionPolicy::Fifo => inner.entries.iter().min_by_key(|(_, entry)| entry.seq),
        }
        .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            inner.entries.remove(&key);
            counter!(METRIC_CACHE_EVICT_TOTAL, "policy" => policy.as_str()).increment(1);
            debug!(key = %key, policy = policy.as_str(), "cache entry evicted at capacity");
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = mutex_lock(&self.inner, "sweep_expired");

        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - inner.entries.len();

        if removed > 0 {
            counter!(METRIC_CACHE_EXPIRED_TOTAL).increment(removed as u64);
            debug!(removed, remaining = inner.entries.len(), "cache sweep");
        }
        removed
    }

    /// Remove all entries.
    pub fn clear(&self) {
        mutex_lock(&self.inner, "clear").entries.clear();
    }

    /// Remove every entry whose key starts with `prefix`. Returns how many
    /// were removed.
    pub fn clear_prefix(&self, prefix: &str) -> usize {
        let mut inner = mutex_lock(&self.inner, "clear_prefix");
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !key.starts_with(prefix));
        before - inner.entries.len()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.inner, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = mutex_lock(&self.inner, "stats");
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        let entry_overhead = mem::size_of::<CacheEntry<V>>() as u64;
        let approx_memory_bytes = inner
            .entries
            .keys()
            .map(|key| key.len() as u64 + entry_overhead)
            .sum();

        CacheStats {
            size: inner.entries.len(),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            approx_memory_bytes,
        }
    }
}
