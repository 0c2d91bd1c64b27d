//! Declarative input schemas for calculators.
//!
//! A descriptor describes *what a calculator accepts*, separate from the
//! algorithm that computes its output. The UI layer renders forms from it;
//! the validator enforces it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::InputMap;

/// Kind of a declared form input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Number,
    Select,
    Text,
    Boolean,
}

impl InputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::Number => "number",
            InputKind::Select => "select",
            InputKind::Text => "text",
            InputKind::Boolean => "boolean",
        }
    }
}

/// One declared input: id, kind, and constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    pub id: String,
    pub kind: InputKind,
    #[serde(default)]
    pub required: bool,
    /// Lower bound for `Number` inputs.
    #[serde(default)]
    pub min: Option<f64>,
    /// Upper bound for `Number` inputs.
    #[serde(default)]
    pub max: Option<f64>,
    /// Allowed values for `Select` inputs.
    #[serde(default)]
    pub options: Vec<String>,
}

impl InputSpec {
    pub fn new(id: impl Into<String>, kind: InputKind) -> Self {
        Self {
            id: id.into(),
            kind,
            required: false,
            min: None,
            max: None,
            options: Vec::new(),
        }
    }

    pub fn number(id: impl Into<String>) -> Self {
        Self::new(id, InputKind::Number)
    }

    pub fn select(id: impl Into<String>, options: impl IntoIterator<Item = &'static str>) -> Self {
        let mut spec = Self::new(id, InputKind::Select);
        spec.options = options.into_iter().map(str::to_string).collect();
        spec
    }

    pub fn text(id: impl Into<String>) -> Self {
        Self::new(id, InputKind::Text)
    }

    pub fn boolean(id: impl Into<String>) -> Self {
        Self::new(id, InputKind::Boolean)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }
}

/// Check function of a custom rule: (declared input's value, whole input map)
/// → violation message or `None`.
pub type RuleFn = dyn Fn(&Value, &InputMap) -> Option<String> + Send + Sync;

/// A descriptor-supplied validation rule bound to one declared input.
///
/// Rules run after structural checks and see the entire input map, so they
/// can express cross-field constraints.
#[derive(Clone)]
pub struct CustomRule {
    pub input_id: String,
    pub check: Arc<RuleFn>,
}

impl CustomRule {
    pub fn new<F>(input_id: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value, &InputMap) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            input_id: input_id.into(),
            check: Arc::new(check),
        }
    }
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule")
            .field("input_id", &self.input_id)
            .finish_non_exhaustive()
    }
}

/// Declarative schema for one calculator.
#[derive(Debug, Clone)]
pub struct CalculatorDescriptor {
    /// Unique calculator id, also the dispatch key.
    pub id: String,
    /// Declared inputs in form order.
    pub inputs: Vec<InputSpec>,
    /// Custom validation rules, run after structural checks.
    pub rules: Vec<CustomRule>,
    /// Per-calculator cache TTL; the store default applies when absent.
    pub cache_ttl: Option<Duration>,
}

impl CalculatorDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inputs: Vec::new(),
            rules: Vec::new(),
            cache_ttl: None,
        }
    }

    pub fn with_input(mut self, spec: InputSpec) -> Self {
        self.inputs.push(spec);
        self
    }

    pub fn with_rule(mut self, rule: CustomRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Find a declared input by id.
    pub fn input(&self, id: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|spec| spec.id == id)
    }
}
