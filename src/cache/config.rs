//! Cache configuration.

use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_MAX_ENTRIES: usize = 500;
const DEFAULT_TTL_MS: u64 = 300_000;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60_000;

/// Eviction policy applied when the store is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Evict the entry with the oldest last access.
    Lru,
    /// Evict the entry with the lowest access count, ties broken by oldest
    /// last access.
    Lfu,
    /// Evict the entry inserted earliest, ignoring access.
    Fifo,
}

impl EvictionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Lfu => "lfu",
            EvictionPolicy::Fifo => "fifo",
        }
    }
}

/// Cache behavior settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries before eviction kicks in.
    pub max_entries: usize,
    /// TTL applied when neither caller nor descriptor supplies one.
    pub default_ttl_ms: u64,
    /// Which entry to drop when at capacity.
    pub eviction_policy: EvictionPolicy,
    /// Background sweep cadence; 0 disables the sweeper.
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl_ms: DEFAULT_TTL_MS,
            eviction_policy: EvictionPolicy::Lru,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
        }
    }
}

impl CacheConfig {
    /// Effective capacity, clamping 0 to 1 so the store stays usable.
    pub fn max_entries_non_zero(&self) -> usize {
        self.max_entries.max(1)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Sweep interval, or `None` when active expiry is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }
}
