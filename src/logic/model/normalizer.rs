//! Z-score normalizer
//!
//! Replays the per-column mean / standard deviation captured when the
//! classifier was trained. Parameters come from the model bundle and are
//! never refit at serving time.

use serde::{Deserialize, Serialize};

use crate::logic::error::{EngineError, EngineResult, Stage};
use crate::logic::features::{
    Feature, FeatureVector, StandardizedVector, FEATURE_COUNT, FEATURE_LAYOUT,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStat {
    pub feature: Feature,
    pub mean: f64,
    pub std: f64,
}

impl FeatureStat {
    pub const fn new(feature: Feature, mean: f64, std: f64) -> Self {
        Self { feature, mean, std }
    }

    fn standardize(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }
}

/// One statistic per column, in layout order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParameters {
    stats: Vec<FeatureStat>,
}

impl NormalizationParameters {
    pub fn new(stats: Vec<FeatureStat>) -> EngineResult<Self> {
        let params = Self { stats };
        params.validate()?;
        Ok(params)
    }

    pub fn stats(&self) -> &[FeatureStat] {
        &self.stats
    }

    /// Zero or negative variance would divide by zero; reject up front
    pub fn validate(&self) -> EngineResult<()> {
        if self.stats.len() != FEATURE_COUNT {
            return Err(EngineError::configuration(
                Stage::Normalization,
                format!(
                    "expected {} normalization entries, found {}",
                    FEATURE_COUNT,
                    self.stats.len()
                ),
            ));
        }

        for (stat, expected) in self.stats.iter().zip(FEATURE_LAYOUT) {
            if stat.feature != expected {
                return Err(EngineError::configuration(
                    Stage::Normalization,
                    format!("entry for `{}` found where `{}` was expected", stat.feature, expected),
                ));
            }
            if !stat.mean.is_finite() {
                return Err(EngineError::configuration(
                    Stage::Normalization,
                    format!("non-finite mean for `{}`", stat.feature),
                ));
            }
            if !stat.std.is_finite() || stat.std <= 0.0 {
                return Err(EngineError::configuration(
                    Stage::Normalization,
                    format!(
                        "standard deviation for `{}` must be positive, got {}",
                        stat.feature, stat.std
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Standardize every column
    pub fn normalize(&self, vector: &FeatureVector) -> EngineResult<StandardizedVector> {
        self.validate()?;
        vector
            .validate()
            .map_err(|e| EngineError::invariant(Stage::Normalization, e.to_string()))?;

        let mut values = [0.0f64; FEATURE_COUNT];
        for (i, stat) in self.stats.iter().enumerate() {
            values[i] = stat.standardize(vector.values[i]);
        }

        if let Some((i, _)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(EngineError::invariant(
                Stage::Normalization,
                format!("standardized `{}` is not finite", FEATURE_LAYOUT[i]),
            ));
        }

        Ok(StandardizedVector::from_values(values))
    }
}
