//! Algorithm registration and dispatch.
//!
//! Algorithms are opaque computation units behind the `CalculatorAlgorithm`
//! capability: the engine only sees their declared input schema and the
//! shape of their result.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use thiserror::Error;
use tracing::debug;

use crate::cache::lock::{rw_read, rw_write};
use crate::domain::{CalculationResult, InputMap};

use super::error::EngineError;

/// Failure reported by an algorithm body.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ComputeError {
    pub message: String,
}

impl ComputeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A pure computation unit: validated inputs in, result out, no other
/// observable effects.
pub trait CalculatorAlgorithm: Send + Sync {
    fn compute(&self, inputs: &InputMap) -> Result<CalculationResult, ComputeError>;
}

struct FnAlgorithm<F>(F);

impl<F> CalculatorAlgorithm for FnAlgorithm<F>
where
    F: Fn(&InputMap) -> Result<CalculationResult, ComputeError> + Send + Sync,
{
    fn compute(&self, inputs: &InputMap) -> Result<CalculationResult, ComputeError> {
        (self.0)(inputs)
    }
}

/// Maps calculator ids to registered algorithms.
pub struct AlgorithmRegistry {
    algorithms: RwLock<HashMap<String, Arc<dyn CalculatorAlgorithm>>>,
}

impl AlgorithmRegistry {
    pub fn new() -> Self {
        Self {
            algorithms: RwLock::new(HashMap::new()),
        }
    }

    /// Register an algorithm. Re-registering an id replaces the previous
    /// unit.
    pub fn register(&self, id: impl Into<String>, algorithm: impl CalculatorAlgorithm + 'static) {
        let id = id.into();
        debug!(calculator = %id, "algorithm registered");
        rw_write(&self.algorithms, "register").insert(id, Arc::new(algorithm));
    }

    /// Closure convenience over [`register`](Self::register).
    pub fn register_fn<F>(&self, id: impl Into<String>, compute: F)
    where
        F: Fn(&InputMap) -> Result<CalculationResult, ComputeError> + Send + Sync + 'static,
    {
        self.register(id, FnAlgorithm(compute));
    }

    pub fn has(&self, id: &str) -> bool {
        rw_read(&self.algorithms, "has").contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn CalculatorAlgorithm>> {
        rw_read(&self.algorithms, "get").get(id).cloned()
    }

    /// Run the registered algorithm for `id`, failing NotFound when none
    /// exists. Compute failures carry the measured duration.
    pub fn execute(&self, id: &str, inputs: &InputMap) -> Result<CalculationResult, EngineError> {
        let algorithm = self.get(id).ok_or_else(|| EngineError::not_found(id))?;

        let started = Instant::now();
        algorithm
            .compute(inputs)
            .map_err(|err| EngineError::Computation {
                calculator_id: id.to_string(),
                duration_ms: started.elapsed().as_secs_f64() * 1000.0,
                message: err.message,
            })
    }

    pub fn len(&self) -> usize {
        rw_read(&self.algorithms, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn constant(value: f64) -> impl Fn(&InputMap) -> Result<CalculationResult, ComputeError> {
        move |_inputs| Ok(CalculationResult::new(value, "kg", "Total"))
    }

    #[test]
    fn register_and_execute() {
        let registry = AlgorithmRegistry::new();
        registry.register_fn("x", constant(7.0));

        assert!(registry.has("x"));
        let result = registry
            .execute("x", &InputMap::new())
            .expect("registered algorithm executes");
        assert_eq!(result.primary_value, 7.0);
    }

    #[test]
    fn execute_unregistered_is_not_found() {
        let registry = AlgorithmRegistry::new();
        let error = registry
            .execute("missing", &InputMap::new())
            .expect_err("unregistered id fails");
        assert!(matches!(error, EngineError::NotFound { .. }));
    }

    #[test]
    fn re_registering_replaces() {
        let registry = AlgorithmRegistry::new();
        registry.register_fn("x", constant(1.0));
        registry.register_fn("x", constant(2.0));

        assert_eq!(registry.len(), 1);
        let result = registry
            .execute("x", &InputMap::new())
            .expect("replacement executes");
        assert_eq!(result.primary_value, 2.0);
    }

    #[test]
    fn compute_failure_carries_message_and_id() {
        let registry = AlgorithmRegistry::new();
        registry.register_fn("x", |inputs: &InputMap| {
            let divisor = inputs.get("d").and_then(|v| v.as_f64()).unwrap_or(0.0);
            if divisor == 0.0 {
                return Err(ComputeError::new("division by zero"));
            }
            Ok(CalculationResult::new(1.0 / divisor, "", "Quotient"))
        });

        let mut inputs = InputMap::new();
        inputs.insert("d".to_string(), json!(0));
        let error = registry
            .execute("x", &inputs)
            .expect_err("zero divisor fails");

        match error {
            EngineError::Computation {
                calculator_id,
                message,
                ..
            } => {
                assert_eq!(calculator_id, "x");
                assert_eq!(message, "division by zero");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
