//! Domain model: calculator descriptors, input maps, and calculation results.

pub mod descriptor;
pub mod result;

pub use descriptor::{CalculatorDescriptor, CustomRule, InputKind, InputSpec};
pub use result::{Accuracy, BreakdownLine, CalculationResult, ResultMetadata};

/// Raw form input: input id → dynamically typed value.
///
/// Key enumeration order carries no meaning and never affects the derived
/// cache key.
pub type InputMap = serde_json::Map<String, serde_json::Value>;
