//! Per-calculator performance statistics.
//!
//! Samples are write-once and folded into per-id aggregates. Percentiles
//! come from a bounded rolling window (nearest-rank over the most recent
//! samples), so memory stays flat regardless of call volume; lifetime
//! counters back throughput, hit rate, and error rate.

use std::collections::VecDeque;

use dashmap::DashMap;

const DEFAULT_WINDOW: usize = 256;

#[derive(Debug, Default)]
struct Track {
    /// Rolling duration window feeding average and percentiles.
    recent_ms: VecDeque<f64>,
    /// Lifetime successful samples.
    samples: u64,
    /// Lifetime sum of successful durations.
    total_ms: f64,
    hits: u64,
    failures: u64,
    inputs_seen: u64,
}

/// Aggregate statistics for one calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorStats {
    /// Rolling average over the recent window.
    pub average_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    /// Lifetime number of recorded samples.
    pub throughput: u64,
    /// Failures over all attempts.
    pub error_rate: f64,
    /// Cache hits over all recorded samples.
    pub hit_rate: f64,
}

/// Process-wide aggregates across every calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStats {
    pub calculators: usize,
    pub total_samples: u64,
    pub total_failures: u64,
    /// Lifetime average across all calculators.
    pub average_ms: f64,
    pub hit_rate: f64,
    pub error_rate: f64,
}

/// Records duration/cache-hit samples per calculator id.
pub struct PerformanceMonitor {
    tracks: DashMap<String, Track>,
    window: usize,
}

impl PerformanceMonitor {
    pub fn new(window: usize) -> Self {
        Self {
            tracks: DashMap::new(),
            window: window.max(1),
        }
    }

    /// Record one completed calculation.
    pub fn record(&self, calculator_id: &str, duration_ms: f64, input_count: usize, cache_hit: bool) {
        let mut track = self.tracks.entry(calculator_id.to_string()).or_default();
        if track.recent_ms.len() == self.window {
            track.recent_ms.pop_front();
        }
        track.recent_ms.push_back(duration_ms);
        track.samples += 1;
        track.total_ms += duration_ms;
        track.inputs_seen += input_count as u64;
        if cache_hit {
            track.hits += 1;
        }
    }

    /// Record one failed calculation attempt.
    ///
    /// Failures are kept out of the duration window so percentiles describe
    /// successful work only.
    pub fn record_failure(&self, calculator_id: &str, _duration_ms: f64) {
        self.tracks
            .entry(calculator_id.to_string())
            .or_default()
            .failures += 1;
    }

    /// Statistics for one calculator, `None` when nothing was recorded.
    pub fn stats_for(&self, calculator_id: &str) -> Option<CalculatorStats> {
        let track = self.tracks.get(calculator_id)?;
        let attempts = track.samples + track.failures;
        if attempts == 0 {
            return None;
        }

        let window_len = track.recent_ms.len();
        let average_ms = if window_len == 0 {
            0.0
        } else {
            track.recent_ms.iter().sum::<f64>() / window_len as f64
        };

        Some(CalculatorStats {
            average_ms,
            p95_ms: percentile(&track.recent_ms, 95.0),
            p99_ms: percentile(&track.recent_ms, 99.0),
            throughput: track.samples,
            error_rate: track.failures as f64 / attempts as f64,
            hit_rate: if track.samples == 0 {
                0.0
            } else {
                track.hits as f64 / track.samples as f64
            },
        })
    }

    pub fn system_stats(&self) -> SystemStats {
        let mut total_samples = 0u64;
        let mut total_failures = 0u64;
        let mut total_ms = 0.0f64;
        let mut total_hits = 0u64;

        for track in self.tracks.iter() {
            total_samples += track.samples;
            total_failures += track.failures;
            total_ms += track.total_ms;
            total_hits += track.hits;
        }

        let attempts = total_samples + total_failures;
        SystemStats {
            calculators: self.tracks.len(),
            total_samples,
            total_failures,
            average_ms: if total_samples == 0 {
                0.0
            } else {
                total_ms / total_samples as f64
            },
            hit_rate: if total_samples == 0 {
                0.0
            } else {
                total_hits as f64 / total_samples as f64
            },
            error_rate: if attempts == 0 {
                0.0
            } else {
                total_failures as f64 / attempts as f64
            },
        }
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

/// Nearest-rank percentile over an unsorted window. Monotonic under
/// repeated identical-duration samples: adding more of the same value
/// never lowers any percentile.
fn percentile(window: &VecDeque<f64>, p: f64) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = window.iter().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_calculator_has_no_stats() {
        let monitor = PerformanceMonitor::default();
        assert!(monitor.stats_for("missing").is_none());
    }

    #[test]
    fn mixed_durations_aggregate() {
        let monitor = PerformanceMonitor::default();
        monitor.record("x", 50.0, 3, false);
        let first = monitor.stats_for("x").expect("stats after first sample");

        monitor.record("x", 600.0, 2, false);
        let second = monitor.stats_for("x").expect("stats after second sample");

        // one high-accuracy and one low-accuracy sample both count
        assert_eq!(second.throughput, 2);
        assert!(second.average_ms > first.average_ms);
        assert_eq!(second.average_ms, 325.0);
        assert_eq!(second.error_rate, 0.0);
    }

    #[test]
    fn cache_hits_feed_hit_rate() {
        let monitor = PerformanceMonitor::default();
        monitor.record("x", 10.0, 1, false);
        monitor.record("x", 0.1, 1, true);

        let stats = monitor.stats_for("x").expect("stats");
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn failures_feed_error_rate_but_not_percentiles() {
        let monitor = PerformanceMonitor::default();
        monitor.record("x", 10.0, 1, false);
        monitor.record_failure("x", 9999.0);

        let stats = monitor.stats_for("x").expect("stats");
        assert_eq!(stats.error_rate, 0.5);
        assert_eq!(stats.p99_ms, 10.0);
        assert_eq!(stats.throughput, 1);
    }

    #[test]
    fn percentiles_are_nearest_rank() {
        let monitor = PerformanceMonitor::default();
        for duration in 1..=100 {
            monitor.record("x", duration as f64, 1, false);
        }

        let stats = monitor.stats_for("x").expect("stats");
        assert_eq!(stats.p95_ms, 95.0);
        assert_eq!(stats.p99_ms, 99.0);
    }

    #[test]
    fn identical_samples_keep_percentiles_flat() {
        let monitor = PerformanceMonitor::default();
        for _ in 0..10 {
            monitor.record("x", 42.0, 1, false);
        }

        let stats = monitor.stats_for("x").expect("stats");
        assert_eq!(stats.average_ms, 42.0);
        assert_eq!(stats.p95_ms, 42.0);
        assert_eq!(stats.p99_ms, 42.0);
    }

    #[test]
    fn window_is_bounded() {
        let monitor = PerformanceMonitor::new(4);
        for duration in [1.0, 2.0, 3.0, 4.0, 100.0] {
            monitor.record("x", duration, 1, false);
        }

        let stats = monitor.stats_for("x").expect("stats");
        // the 1.0 sample rolled out of the window
        assert_eq!(stats.average_ms, (2.0 + 3.0 + 4.0 + 100.0) / 4.0);
        // throughput still counts every sample
        assert_eq!(stats.throughput, 5);
    }

    #[test]
    fn system_stats_aggregate_across_calculators() {
        let monitor = PerformanceMonitor::default();
        monitor.record("a", 10.0, 1, false);
        monitor.record("a", 20.0, 1, true);
        monitor.record("b", 30.0, 1, false);
        monitor.record_failure("b", 5.0);

        let stats = monitor.system_stats();
        assert_eq!(stats.calculators, 2);
        assert_eq!(stats.total_samples, 3);
        assert_eq!(stats.total_failures, 1);
        assert_eq!(stats.average_ms, 20.0);
        assert_eq!(stats.error_rate, 0.25);
    }
}
