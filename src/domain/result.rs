//! Calculation results as returned to callers and stored in the cache.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Accuracy class derived from computation duration.
///
/// The thresholds are part of the observable contract: under 100 ms is
/// `High`, under 500 ms is `Medium`, anything slower is `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accuracy {
    High,
    Medium,
    Low,
}

impl Accuracy {
    /// Classify a computation duration in milliseconds.
    pub fn from_duration_ms(duration_ms: f64) -> Self {
        if duration_ms < 100.0 {
            Accuracy::High
        } else if duration_ms < 500.0 {
            Accuracy::Medium
        } else {
            Accuracy::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Accuracy::High => "high",
            Accuracy::Medium => "medium",
            Accuracy::Low => "low",
        }
    }
}

/// One line of a result breakdown, in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownLine {
    pub label: String,
    pub value: f64,
    pub unit: String,
    /// Share of the primary value, where meaningful.
    #[serde(default)]
    pub percentage: Option<f64>,
}

impl BreakdownLine {
    pub fn new(label: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value,
            unit: unit.into(),
            percentage: None,
        }
    }

    pub fn with_percentage(mut self, percentage: f64) -> Self {
        self.percentage = Some(percentage);
        self
    }
}

/// Execution metadata attached by the engine after dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub calculation_time_ms: f64,
    pub accuracy: Accuracy,
    #[serde(with = "time::serde::rfc3339")]
    pub computed_at: OffsetDateTime,
}

impl ResultMetadata {
    pub fn from_duration_ms(calculation_time_ms: f64) -> Self {
        Self {
            calculation_time_ms,
            accuracy: Accuracy::from_duration_ms(calculation_time_ms),
            computed_at: OffsetDateTime::now_utc(),
        }
    }
}

impl Default for ResultMetadata {
    fn default() -> Self {
        Self::from_duration_ms(0.0)
    }
}

/// Immutable output of one calculation.
///
/// Cached by value and never mutated after insertion; the engine clones it
/// out of the cache on hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub primary_value: f64,
    pub primary_unit: String,
    pub primary_label: String,
    #[serde(default)]
    pub breakdown: Vec<BreakdownLine>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub metadata: ResultMetadata,
}

impl CalculationResult {
    pub fn new(
        primary_value: f64,
        primary_unit: impl Into<String>,
        primary_label: impl Into<String>,
    ) -> Self {
        Self {
            primary_value,
            primary_unit: primary_unit.into(),
            primary_label: primary_label.into(),
            breakdown: Vec::new(),
            recommendations: Vec::new(),
            metadata: ResultMetadata::default(),
        }
    }

    pub fn with_breakdown(mut self, line: BreakdownLine) -> Self {
        self.breakdown.push(line);
        self
    }

    pub fn with_recommendation(mut self, text: impl Into<String>) -> Self {
        self.recommendations.push(text.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_thresholds() {
        assert_eq!(Accuracy::from_duration_ms(0.0), Accuracy::High);
        assert_eq!(Accuracy::from_duration_ms(99.9), Accuracy::High);
        assert_eq!(Accuracy::from_duration_ms(100.0), Accuracy::Medium);
        assert_eq!(Accuracy::from_duration_ms(499.9), Accuracy::Medium);
        assert_eq!(Accuracy::from_duration_ms(500.0), Accuracy::Low);
        assert_eq!(Accuracy::from_duration_ms(12_000.0), Accuracy::Low);
    }

    #[test]
    fn metadata_classifies_on_construction() {
        let metadata = ResultMetadata::from_duration_ms(250.0);
        assert_eq!(metadata.accuracy, Accuracy::Medium);
        assert_eq!(metadata.calculation_time_ms, 250.0);
    }

    #[test]
    fn result_serializes_round_trip() {
        let result = CalculationResult::new(42.5, "kg", "Total weight")
            .with_breakdown(BreakdownLine::new("Plate", 40.0, "kg").with_percentage(94.1))
            .with_recommendation("Order 5% extra for cutting waste");

        let json = serde_json::to_string(&result).expect("result serializes");
        let back: CalculationResult = serde_json::from_str(&json).expect("result deserializes");
        assert_eq!(back, result);
    }
}
