//! Feature Engineer
//!
//! Derives the seven agronomic interaction features from a dampened
//! observation and lays all 14 columns out in [`FEATURE_LAYOUT`] order.
//!
//! Ratios carry a small epsilon in the denominator so zero nutrients or
//! zero humidity never divide by zero.
//!
//! [`FEATURE_LAYOUT`]: super::layout::FEATURE_LAYOUT

use serde::{Deserialize, Serialize};

use super::damping::DampedObservation;
use super::layout::{Feature, FEATURE_COUNT, RAW_FEATURE_COUNT};
use super::vector::FeatureVector;
use crate::logic::error::{EngineError, EngineResult, Stage};

/// Denominator offset for every ratio feature
pub const EPSILON: f64 = 1e-6;

// ============================================================================
// PH ACIDITY BUCKET
// ============================================================================

/// Soil reaction class, coded 1-3 as in the training pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhBucket {
    Acidic = 1,
    Neutral = 2,
    Alkaline = 3,
}

impl PhBucket {
    /// <6.5 | [6.5, 7.5] | >7.5
    pub fn categorize(ph: f64) -> Self {
        if ph < 6.5 {
            PhBucket::Acidic
        } else if ph > 7.5 {
            PhBucket::Alkaline
        } else {
            PhBucket::Neutral
        }
    }

    pub const fn code(self) -> f64 {
        self as u8 as f64
    }
}

// ============================================================================
// ENGINEERING
// ============================================================================

/// Build the full 14-column vector. Deterministic and total over finite input.
pub fn engineer(damped: &DampedObservation) -> EngineResult<FeatureVector> {
    let raw = damped.values();
    let [n, p, k, temperature, humidity, ph, rainfall] = *raw;

    let mut values = [0.0f64; FEATURE_COUNT];
    values[..RAW_FEATURE_COUNT].copy_from_slice(raw);

    values[Feature::NpkSum.index()] = n + p + k;
    values[Feature::NpRatio.index()] = n / (p + EPSILON);
    values[Feature::NkRatio.index()] = n / (k + EPSILON);
    values[Feature::PkRatio.index()] = p / (k + EPSILON);
    values[Feature::TempHumidityInteraction.index()] = temperature * humidity;
    values[Feature::RainfallHumidityRatio.index()] = rainfall / (humidity + EPSILON);
    values[Feature::PhAcidityBucket.index()] = PhBucket::categorize(ph).code();

    let vector = FeatureVector::from_values(values);
    if let Some(feature) = vector.first_non_finite() {
        return Err(EngineError::invariant(
            Stage::FeatureEngineering,
            format!("derived feature `{}` is not finite", feature),
        ));
    }

    log::trace!("Engineered features: {}", vector.to_log_entry());
    Ok(vector)
}
