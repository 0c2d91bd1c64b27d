//! Calculation engine: validate, consult the cache, dispatch, record.
//!
//! One explicitly constructed instance per process, created at startup and
//! passed by reference to consumers. Collaborating parts (cache store,
//! registry, monitor) are injectable for tests and embedders.

mod builtins;
mod config;
mod error;
mod flight;
mod monitor;
mod registry;
mod validator;

pub use builtins::{BUILTIN_DESCRIPTORS, Builtin};
pub use config::EngineConfig;
pub use error::EngineError;
pub use monitor::{CalculatorStats, PerformanceMonitor, SystemStats};
pub use registry::{AlgorithmRegistry, CalculatorAlgorithm, ComputeError};
pub use validator::{ValidationIssue, validate};

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::lock::{mutex_lock, rw_read, rw_write};
use crate::cache::{CacheStats, CacheStore, SweepHandle, key};
use crate::domain::{CalculationResult, CalculatorDescriptor, InputMap, ResultMetadata};
use crate::util::bytes::format_bytes;

use flight::{FlightPosition, FlightTable};

const METRIC_COMPUTE_MS: &str = "calcengine_compute_ms";
const METRIC_VALIDATION_REJECT_TOTAL: &str = "calcengine_validation_reject_total";
const METRIC_FLIGHT_COALESCED_TOTAL: &str = "calcengine_flight_coalesced_total";

/// Orchestrates one calculation per call.
///
/// Per-call flow: descriptor lookup → cache key → cache probe → on miss,
/// validate → dispatch (registry, then builtins) → cache write → metrics.
/// A cached result was already validated and is immutable, so hits skip
/// validation and dispatch entirely.
pub struct CalculationEngine {
    config: EngineConfig,
    descriptors: RwLock<HashMap<String, CalculatorDescriptor>>,
    registry: AlgorithmRegistry,
    cache: Arc<CacheStore<CalculationResult>>,
    monitor: PerformanceMonitor,
    flight: FlightTable,
    sweeper: Mutex<Option<SweepHandle>>,
}

impl CalculationEngine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = Arc::new(CacheStore::new(config.cache.clone()));
        let registry = AlgorithmRegistry::new();
        let monitor = PerformanceMonitor::new(config.monitor_window);
        Self::with_parts(config, cache, registry, monitor)
    }

    /// Construct with injected collaborators.
    pub fn with_parts(
        config: EngineConfig,
        cache: Arc<CacheStore<CalculationResult>>,
        registry: AlgorithmRegistry,
        monitor: PerformanceMonitor,
    ) -> Self {
        let sweeper = config
            .cache
            .sweep_interval()
            .map(|interval| SweepHandle::spawn(Arc::clone(&cache), interval));

        let engine = Self {
            config,
            descriptors: RwLock::new(HashMap::new()),
            registry,
            cache,
            monitor,
            flight: FlightTable::new(),
            sweeper: Mutex::new(sweeper),
        };

        for descriptor in BUILTIN_DESCRIPTORS.iter() {
            engine.register_calculator(descriptor.clone());
        }
        engine
    }

    /// Register (or replace) a calculator's declared input schema.
    pub fn register_calculator(&self, descriptor: CalculatorDescriptor) {
        debug!(calculator = %descriptor.id, inputs = descriptor.inputs.len(), "calculator registered");
        rw_write(&self.descriptors, "register_calculator").insert(descriptor.id.clone(), descriptor);
    }

    /// Register (or replace) the algorithm for a calculator id.
    pub fn register(&self, id: impl Into<String>, algorithm: impl CalculatorAlgorithm + 'static) {
        self.registry.register(id, algorithm);
    }

    /// Closure convenience over [`register`](Self::register).
    pub fn register_algorithm<F>(&self, id: impl Into<String>, compute: F)
    where
        F: Fn(&InputMap) -> Result<CalculationResult, ComputeError> + Send + Sync + 'static,
    {
        self.registry.register_fn(id, compute);
    }

    pub fn has_calculator(&self, id: &str) -> bool {
        rw_read(&self.descriptors, "has_calculator").contains_key(id)
    }

    /// Run one calculation.
    pub fn calculate(
        &self,
        calculator_id: &str,
        inputs: &InputMap,
        context: Option<&Value>,
    ) -> Result<CalculationResult, EngineError> {
        let call_started = Instant::now();

        let descriptor = rw_read(&self.descriptors, "calculate.descriptor")
            .get(calculator_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(calculator_id))?;

        // The cache is never a correctness dependency: a canonicalization
        // failure degrades this call to compute-without-cache.
        let cache_key = match key::encode(calculator_id, inputs, context) {
            Ok(cache_key) => Some(cache_key),
            Err(err) => {
                warn!(calculator = %calculator_id, error = %err, "cache key derivation failed; computing uncached");
                None
            }
        };

        let Some(cache_key) = cache_key else {
            return self.compute_validated(&descriptor, inputs, None, call_started);
        };

        if let Some(result) = self.cache.get(&cache_key) {
            debug!(calculator = %calculator_id, "cache hit");
            self.monitor
                .record(calculator_id, elapsed_ms(call_started), inputs.len(), true);
            return Ok(result);
        }

        match self.flight.join(&cache_key) {
            FlightPosition::Leader(slot) => {
                let outcome =
                    self.compute_validated(&descriptor, inputs, Some(&cache_key), call_started);
                self.flight.complete(&cache_key, &slot, &outcome);
                outcome
            }
            FlightPosition::Follower(slot) => {
                counter!(METRIC_FLIGHT_COALESCED_TOTAL).increment(1);
                match slot.wait(self.config.flight_wait()) {
                    Some(outcome) => {
                        // the leader did the work; for this caller it is a hit
                        if outcome.is_ok() {
                            self.monitor.record(
                                calculator_id,
                                elapsed_ms(call_started),
                                inputs.len(),
                                true,
                            );
                        }
                        outcome
                    }
                    None => Err(EngineError::Computation {
                        calculator_id: calculator_id.to_string(),
                        duration_ms: elapsed_ms(call_started),
                        message: "timed out waiting for in-flight calculation".to_string(),
                    }),
                }
            }
        }
    }

    fn compute_validated(
        &self,
        descriptor: &CalculatorDescriptor,
        inputs: &InputMap,
        cache_key: Option<&str>,
        call_started: Instant,
    ) -> Result<CalculationResult, EngineError> {
        let issues = validate(descriptor, inputs);
        if !issues.is_empty() {
            counter!(METRIC_VALIDATION_REJECT_TOTAL).increment(1);
            debug!(calculator = %descriptor.id, violations = issues.len(), "inputs rejected");
            return Err(EngineError::Validation(issues));
        }

        let algorithm = self.registry.get(&descriptor.id).or_else(|| {
            Builtin::lookup(&descriptor.id)
                .map(|builtin| Arc::new(builtin) as Arc<dyn CalculatorAlgorithm>)
        });
        let Some(algorithm) = algorithm else {
            return Err(EngineError::Computation {
                calculator_id: descriptor.id.clone(),
                duration_ms: elapsed_ms(call_started),
                message: "not implemented".to_string(),
            });
        };

        // Algorithm bodies are untrusted; a panic must not poison the
        // single-flight slot or tear down the caller.
        let compute_started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| algorithm.compute(inputs)));
        let duration_ms = elapsed_ms(compute_started);
        histogram!(METRIC_COMPUTE_MS, "calculator" => descriptor.id.clone()).record(duration_ms);

        match outcome {
            Ok(Ok(mut result)) => {
                result.metadata = ResultMetadata::from_duration_ms(duration_ms);
                if let Some(cache_key) = cache_key {
                    self.cache
                        .insert(cache_key.to_string(), result.clone(), descriptor.cache_ttl);
                }
                self.monitor
                    .record(&descriptor.id, duration_ms, inputs.len(), false);
                Ok(result)
            }
            Ok(Err(err)) => {
                self.monitor.record_failure(&descriptor.id, duration_ms);
                warn!(calculator = %descriptor.id, error = %err, "algorithm failed");
                Err(EngineError::Computation {
                    calculator_id: descriptor.id.clone(),
                    duration_ms: elapsed_ms(call_started),
                    message: err.message,
                })
            }
            Err(panic) => {
                self.monitor.record_failure(&descriptor.id, duration_ms);
                let message = panic_message(panic.as_ref());
                warn!(calculator = %descriptor.id, detail = %message, "algorithm panicked");
                Err(EngineError::Computation {
                    calculator_id: descriptor.id.clone(),
                    duration_ms: elapsed_ms(call_started),
                    message: format!("algorithm panicked: {message}"),
                })
            }
        }
    }

    /// Drop every cached result of one calculator. Returns how many
    /// entries were removed.
    pub fn invalidate_calculator(&self, calculator_id: &str) -> usize {
        self.cache.clear_prefix(&key::calculator_prefix(calculator_id))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn stats_for(&self, calculator_id: &str) -> Option<CalculatorStats> {
        self.monitor.stats_for(calculator_id)
    }

    pub fn system_stats(&self) -> SystemStats {
        self.monitor.system_stats()
    }

    /// Stop the background sweeper and release it. Idempotent; also runs
    /// on drop.
    pub fn close(&self) {
        if let Some(mut sweeper) = mutex_lock(&self.sweeper, "close").take() {
            sweeper.stop();
            let stats = self.cache.stats();
            debug!(
                entries = stats.size,
                memory = %format_bytes(stats.approx_memory_bytes),
                "engine closed"
            );
        }
    }
}

impl Drop for CalculationEngine {
    fn drop(&mut self) {
        self.close();
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
