use thiserror::Error;

use super::validator::ValidationIssue;

/// Failure taxonomy for `calculate`.
///
/// `NotFound` and `Validation` are terminal and surfaced verbatim.
/// `Computation` carries the calculator id and duration-so-far as context.
/// Cache trouble never appears here: the engine degrades to recomputation
/// instead of failing the call.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("calculator `{calculator_id}` is not registered")]
    NotFound { calculator_id: String },

    #[error("input validation failed with {} violation(s)", .0.len())]
    Validation(Vec<ValidationIssue>),

    #[error("calculation `{calculator_id}` failed after {duration_ms:.1}ms: {message}")]
    Computation {
        calculator_id: String,
        duration_ms: f64,
        message: String,
    },
}

impl EngineError {
    pub fn not_found(calculator_id: impl Into<String>) -> Self {
        Self::NotFound {
            calculator_id: calculator_id.into(),
        }
    }

    /// The violation list, empty for non-validation errors.
    pub fn validation_issues(&self) -> &[ValidationIssue] {
        match self {
            Self::Validation(issues) => issues,
            _ => &[],
        }
    }
}
