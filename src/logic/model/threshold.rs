//! Confidence Threshold
//!
//! Decides when a prediction is weak enough to warrant an explanation and
//! grades confidence for display.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_EXPLAIN_THRESHOLD;

/// Confidence grade for UI; never used for control flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryHigh,
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// >= 0.9 | [0.7, 0.9) | [0.5, 0.7) | < 0.5
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            ConfidenceLevel::VeryHigh
        } else if confidence >= 0.7 {
            ConfidenceLevel::High
        } else if confidence >= 0.5 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Explanation trigger
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplainThreshold {
    pub threshold: f64,
}

impl Default for ExplainThreshold {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_EXPLAIN_THRESHOLD,
        }
    }
}

impl ExplainThreshold {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn is_valid(&self) -> bool {
        self.threshold.is_finite() && (0.0..=1.0).contains(&self.threshold)
    }

    /// Explanations fire strictly below the threshold
    pub fn should_explain(&self, confidence: f64) -> bool {
        confidence < self.threshold
    }
}
