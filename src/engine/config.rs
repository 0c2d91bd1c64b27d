//! Engine configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;

const DEFAULT_FLIGHT_WAIT_MS: u64 = 5_000;
const DEFAULT_MONITOR_WINDOW: usize = 256;

/// Engine behavior settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    /// How long a coalesced caller waits on an in-flight calculation
    /// before failing.
    pub flight_wait_ms: u64,
    /// Rolling sample window per calculator for percentile statistics.
    pub monitor_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            flight_wait_ms: DEFAULT_FLIGHT_WAIT_MS,
            monitor_window: DEFAULT_MONITOR_WINDOW,
        }
    }
}

impl EngineConfig {
    pub fn flight_wait(&self) -> Duration {
        Duration::from_millis(self.flight_wait_ms)
    }
}
