//! Outlier Dampener
//!
//! Replays the percentile clamp fit at training time (0.5th / 99.5th
//! percentile of the reference dataset). Pure capping: every observation
//! produces exactly one dampened observation.

use serde::{Deserialize, Serialize};

use super::layout::{Feature, RAW_FEATURES, RAW_FEATURE_COUNT};
use super::observation::RawObservation;
use crate::logic::error::{EngineError, EngineResult, Stage};

/// Clamp interval for one raw feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DampingBound {
    pub feature: Feature,
    pub lower: f64,
    pub upper: f64,
}

impl DampingBound {
    pub const fn new(feature: Feature, lower: f64, upper: f64) -> Self {
        Self { feature, lower, upper }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Per-feature clamp bounds, one per raw feature in layout order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DampingParameters {
    bounds: Vec<DampingBound>,
}

impl DampingParameters {
    pub fn new(bounds: Vec<DampingBound>) -> EngineResult<Self> {
        let params = Self { bounds };
        params.validate()?;
        Ok(params)
    }

    pub fn bounds(&self) -> &[DampingBound] {
        &self.bounds
    }

    /// Bounds must cover the raw features in layout order, be finite and not inverted
    pub fn validate(&self) -> EngineResult<()> {
        if self.bounds.len() != RAW_FEATURE_COUNT {
            return Err(EngineError::configuration(
                Stage::Damping,
                format!(
                    "expected {} damping bounds, found {}",
                    RAW_FEATURE_COUNT,
                    self.bounds.len()
                ),
            ));
        }

        for (bound, expected) in self.bounds.iter().zip(RAW_FEATURES) {
            if bound.feature != expected {
                return Err(EngineError::configuration(
                    Stage::Damping,
                    format!(
                        "bound for `{}` found where `{}` was expected",
                        bound.feature, expected
                    ),
                ));
            }
            if !bound.lower.is_finite() || !bound.upper.is_finite() {
                return Err(EngineError::configuration(
                    Stage::Damping,
                    format!("non-finite bound for `{}`", bound.feature),
                ));
            }
            if bound.lower > bound.upper {
                return Err(EngineError::configuration(
                    Stage::Damping,
                    format!(
                        "inverted bounds for `{}`: lower {} > upper {}",
                        bound.feature, bound.lower, bound.upper
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Clamp every raw field into its bound
    pub fn dampen(&self, raw: &RawObservation) -> EngineResult<DampedObservation> {
        self.validate()?;

        let mut values = [0.0f64; RAW_FEATURE_COUNT];
        let mut clamped = Vec::new();

        for (i, (bound, value)) in self.bounds.iter().zip(raw.values()).enumerate() {
            if value.is_nan() {
                return Err(EngineError::validation(
                    Stage::Damping,
                    bound.feature.name(),
                    "value is NaN",
                ));
            }

            if !bound.contains(value) {
                clamped.push(bound.feature);
            }
            values[i] = bound.clamp(value);
        }

        Ok(DampedObservation { values, clamped })
    }
}

/// Raw observation after clamping, plus the features that were capped
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DampedObservation {
    values: [f64; RAW_FEATURE_COUNT],
    clamped: Vec<Feature>,
}

impl DampedObservation {
    pub fn values(&self) -> &[f64; RAW_FEATURE_COUNT] {
        &self.values
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values.get(feature.index()).copied()
    }

    /// Features whose raw reading fell outside the training envelope
    pub fn clamped(&self) -> &[Feature] {
        &self.clamped
    }
}
