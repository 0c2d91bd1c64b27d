//! Calcengine
//!
//! Calculation dispatch and caching core for form-driven business
//! calculators (steel, HVAC, pricing, and the like). Domain modules
//! declare an input schema and register a pure algorithm; the engine
//! validates raw form input, memoizes results behind an order-independent
//! cache key, bounds memory with TTL and policy-driven eviction, and keeps
//! per-calculator performance statistics.
//!
//! ```no_run
//! use calcengine::{CalculationEngine, EngineConfig};
//! use serde_json::json;
//!
//! let engine = CalculationEngine::new(EngineConfig::default());
//!
//! let mut inputs = calcengine::InputMap::new();
//! inputs.insert("length_mm".into(), json!(1000));
//! inputs.insert("width_mm".into(), json!(1000));
//! inputs.insert("thickness_mm".into(), json!(10));
//!
//! let result = engine.calculate("steel-plate-weight", &inputs, None)?;
//! assert_eq!(result.primary_unit, "kg");
//! # Ok::<(), calcengine::EngineError>(())
//! ```

pub mod cache;
pub mod config;
pub mod domain;
pub mod engine;
pub mod infra;
pub mod util;

pub use cache::{CacheConfig, CacheError, CacheStats, CacheStore, EvictionPolicy};
pub use domain::{
    Accuracy, BreakdownLine, CalculationResult, CalculatorDescriptor, CustomRule, InputKind,
    InputMap, InputSpec, ResultMetadata,
};
pub use engine::{
    AlgorithmRegistry, Builtin, CalculationEngine, CalculatorAlgorithm, CalculatorStats,
    ComputeError, EngineConfig, EngineError, PerformanceMonitor, SystemStats, ValidationIssue,
};
