//! Structural and rule-based input validation.
//!
//! Every declared input is checked and every violation collected — no
//! short-circuiting, because form UIs need the complete list to highlight
//! all bad fields at once.

use std::fmt;

use serde_json::Value;

use crate::domain::{CalculatorDescriptor, InputKind, InputMap, InputSpec};

/// One violated constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// The offending input, when the violation is attributable to one.
    pub input_id: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn for_input(input_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            input_id: Some(input_id.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Check `inputs` against the descriptor. Empty iff fully valid.
pub fn validate(descriptor: &CalculatorDescriptor, inputs: &InputMap) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for spec in &descriptor.inputs {
        check_spec(spec, inputs, &mut issues);
    }

    // custom rules run after structural checks and see the whole map
    for rule in &descriptor.rules {
        let value = inputs.get(&rule.input_id).cloned().unwrap_or(Value::Null);
        if let Some(message) = (rule.check)(&value, inputs) {
            issues.push(ValidationIssue::for_input(rule.input_id.clone(), message));
        }
    }

    issues
}

fn check_spec(spec: &InputSpec, inputs: &InputMap, issues: &mut Vec<ValidationIssue>) {
    // null counts as absent, matching how forms submit empty fields
    let value = inputs.get(&spec.id).filter(|value| !value.is_null());
    let Some(value) = value else {
        if spec.required {
            issues.push(ValidationIssue::for_input(
                &spec.id,
                format!("`{}` is required", spec.id),
            ));
        }
        return;
    };

    match spec.kind {
        InputKind::Number => match value.as_f64() {
            None => issues.push(ValidationIssue::for_input(
                &spec.id,
                format!("`{}` must be a number", spec.id),
            )),
            Some(number) => {
                if let Some(min) = spec.min
                    && number < min
                {
                    issues.push(ValidationIssue::for_input(
                        &spec.id,
                        format!("`{}` is below the minimum of {min}", spec.id),
                    ));
                }
                if let Some(max) = spec.max
                    && number > max
                {
                    issues.push(ValidationIssue::for_input(
                        &spec.id,
                        format!("`{}` exceeds the maximum of {max}", spec.id),
                    ));
                }
            }
        },
        InputKind::Select => {
            if !spec.options.is_empty() {
                let matches = value
                    .as_str()
                    .is_some_and(|chosen| spec.options.iter().any(|option| option == chosen));
                if !matches {
                    issues.push(ValidationIssue::for_input(
                        &spec.id,
                        format!(
                            "`{}` must be one of: {}",
                            spec.id,
                            spec.options.join(", ")
                        ),
                    ));
                }
            }
        }
        InputKind::Text => {
            if !value.is_string() {
                issues.push(ValidationIssue::for_input(
                    &spec.id,
                    format!("`{}` must be text", spec.id),
                ));
            }
        }
        InputKind::Boolean => {
            if !value.is_boolean() {
                issues.push(ValidationIssue::for_input(
                    &spec.id,
                    format!("`{}` must be a boolean", spec.id),
                ));
            }
        }
    }
}
