//! Raw sensor observation and hard physical-range validation.

use serde::{Deserialize, Serialize};

use super::layout::{Feature, RAW_FEATURES, RAW_FEATURE_COUNT};
use crate::logic::error::{EngineError, EngineResult, Stage};

/// Seven raw measurements for one plot of land.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    /// Soil nitrogen, kg/ha
    #[serde(rename = "nitrogen")]
    pub n: f64,
    /// Soil phosphorus, kg/ha
    #[serde(rename = "phosphorus")]
    pub p: f64,
    /// Soil potassium, kg/ha
    #[serde(rename = "potassium")]
    pub k: f64,
    /// Air temperature, °C
    pub temperature: f64,
    /// Relative humidity, %
    pub humidity: f64,
    /// Soil pH
    pub ph: f64,
    /// Rainfall, mm
    pub rainfall: f64,
}

/// Physically sane bounds; anything outside is a caller error, not an outlier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalRange {
    pub min: f64,
    pub max: f64,
    pub unit: &'static str,
}

pub const fn physical_range(feature: Feature) -> Option<PhysicalRange> {
    let range = match feature {
        Feature::Nitrogen | Feature::Phosphorus | Feature::Potassium => PhysicalRange {
            min: 0.0,
            max: 500.0,
            unit: "kg/ha",
        },
        Feature::Temperature => PhysicalRange {
            min: -50.0,
            max: 70.0,
            unit: "°C",
        },
        Feature::Humidity => PhysicalRange {
            min: 0.0,
            max: 100.0,
            unit: "%",
        },
        Feature::Ph => PhysicalRange {
            min: 0.0,
            max: 14.0,
            unit: "",
        },
        Feature::Rainfall => PhysicalRange {
            min: 0.0,
            max: 5000.0,
            unit: "mm",
        },
        _ => return None,
    };
    Some(range)
}

impl RawObservation {
    pub const fn new(
        n: f64,
        p: f64,
        k: f64,
        temperature: f64,
        humidity: f64,
        ph: f64,
        rainfall: f64,
    ) -> Self {
        Self {
            n,
            p,
            k,
            temperature,
            humidity,
            ph,
            rainfall,
        }
    }

    /// Build from values in layout order
    pub const fn from_values(values: [f64; RAW_FEATURE_COUNT]) -> Self {
        let [n, p, k, temperature, humidity, ph, rainfall] = values;
        Self::new(n, p, k, temperature, humidity, ph, rainfall)
    }

    /// Values in layout order
    pub const fn values(&self) -> [f64; RAW_FEATURE_COUNT] {
        [
            self.n,
            self.p,
            self.k,
            self.temperature,
            self.humidity,
            self.ph,
            self.rainfall,
        ]
    }

    /// Raw value by feature; `None` for derived features
    pub fn get(&self, feature: Feature) -> Option<f64> {
        if feature.is_raw() {
            Some(self.values()[feature.index()])
        } else {
            None
        }
    }

    /// Parse a JSON observation. Missing or non-numeric fields are validation errors.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let obs: RawObservation = serde_json::from_str(json).map_err(|e| {
            EngineError::validation(Stage::Validation, "observation", e.to_string())
        })?;
        obs.validate()?;
        Ok(obs)
    }

    /// Reject NaN/Infinity and physically impossible readings
    pub fn validate(&self) -> EngineResult<()> {
        for (feature, value) in RAW_FEATURES.iter().zip(self.values()) {
            if !value.is_finite() {
                return Err(EngineError::validation(
                    Stage::Validation,
                    feature.name(),
                    format!("value {} is not a finite number", value),
                ));
            }

            if let Some(range) = physical_range(*feature) {
                if value < range.min || value > range.max {
                    return Err(EngineError::validation(
                        Stage::Validation,
                        feature.name(),
                        format!(
                            "{} {} is outside the physical range [{}, {}]",
                            value, range.unit, range.min, range.max
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}
