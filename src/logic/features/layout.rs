//! Feature Layout - Centralized Feature Definition
//!
//! **CRITICAL: This file controls the feature schema**
//!
//! The feature engineer, the normalizer and the classifier all index the
//! 14-column vector through [`FEATURE_LAYOUT`]. The column order is the one
//! the deployed classifier was trained on.
//!
//! ## Rules (NEVER break these):
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION
//!
//! A model bundle carrying another version or layout hash is rejected at load.

use crc32fast::Hasher;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::error::{EngineError, Stage};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
/// MUST be incremented when layout changes
pub const FEATURE_VERSION: u8 = 1;

/// Number of raw sensor measurements
pub const RAW_FEATURE_COUNT: usize = 7;

/// Total number of features (raw + derived)
pub const FEATURE_COUNT: usize = 14;

// ============================================================================
// FACTOR CATEGORY
// ============================================================================

/// Agronomic grouping used when reporting limiting factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorCategory {
    SoilNutrient,
    SoilChemistry,
    Climate,
    Water,
}

impl FactorCategory {
    /// Hint handed to the advice layer
    pub fn advice_hint(&self) -> &'static str {
        match self {
            FactorCategory::SoilNutrient => {
                "Adjust N/P/K fertilisation toward the crop's nutrient profile"
            }
            FactorCategory::SoilChemistry => {
                "Correct soil reaction with liming or sulphur amendments"
            }
            FactorCategory::Climate => {
                "Temperature or humidity is outside the crop's growing envelope"
            }
            FactorCategory::Water => {
                "Rainfall supply does not match crop water demand; consider irrigation or drainage"
            }
        }
    }
}

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// One column of the feature vector. The discriminant IS the column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Feature {
    #[serde(rename = "N")]
    Nitrogen = 0,
    #[serde(rename = "P")]
    Phosphorus = 1,
    #[serde(rename = "K")]
    Potassium = 2,
    #[serde(rename = "temperature")]
    Temperature = 3,
    #[serde(rename = "humidity")]
    Humidity = 4,
    #[serde(rename = "ph")]
    Ph = 5,
    #[serde(rename = "rainfall")]
    Rainfall = 6,
    #[serde(rename = "NPK_sum")]
    NpkSum = 7,
    #[serde(rename = "NP_ratio")]
    NpRatio = 8,
    #[serde(rename = "NK_ratio")]
    NkRatio = 9,
    #[serde(rename = "PK_ratio")]
    PkRatio = 10,
    #[serde(rename = "temp_humidity_interaction")]
    TempHumidityInteraction = 11,
    #[serde(rename = "rainfall_humidity_ratio")]
    RainfallHumidityRatio = 12,
    #[serde(rename = "ph_acidity_bucket")]
    PhAcidityBucket = 13,
}

/// Features in exact order they appear in the vector
/// This is the SINGLE SOURCE OF TRUTH for feature layout
pub const FEATURE_LAYOUT: [Feature; FEATURE_COUNT] = [
    // === Raw, dampened (0-6) ===
    Feature::Nitrogen,
    Feature::Phosphorus,
    Feature::Potassium,
    Feature::Temperature,
    Feature::Humidity,
    Feature::Ph,
    Feature::Rainfall,
    // === Derived (7-13) ===
    Feature::NpkSum,
    Feature::NpRatio,
    Feature::NkRatio,
    Feature::PkRatio,
    Feature::TempHumidityInteraction,
    Feature::RainfallHumidityRatio,
    Feature::PhAcidityBucket,
];

/// The raw sensor prefix of the layout
pub const RAW_FEATURES: [Feature; RAW_FEATURE_COUNT] = [
    Feature::Nitrogen,
    Feature::Phosphorus,
    Feature::Potassium,
    Feature::Temperature,
    Feature::Humidity,
    Feature::Ph,
    Feature::Rainfall,
];

impl Feature {
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Column name as used by the training pipeline
    pub const fn name(self) -> &'static str {
        match self {
            Feature::Nitrogen => "N",
            Feature::Phosphorus => "P",
            Feature::Potassium => "K",
            Feature::Temperature => "temperature",
            Feature::Humidity => "humidity",
            Feature::Ph => "ph",
            Feature::Rainfall => "rainfall",
            Feature::NpkSum => "NPK_sum",
            Feature::NpRatio => "NP_ratio",
            Feature::NkRatio => "NK_ratio",
            Feature::PkRatio => "PK_ratio",
            Feature::TempHumidityInteraction => "temp_humidity_interaction",
            Feature::RainfallHumidityRatio => "rainfall_humidity_ratio",
            Feature::PhAcidityBucket => "ph_acidity_bucket",
        }
    }

    pub const fn category(self) -> FactorCategory {
        match self {
            Feature::Nitrogen
            | Feature::Phosphorus
            | Feature::Potassium
            | Feature::NpkSum
            | Feature::NpRatio
            | Feature::NkRatio
            | Feature::PkRatio => FactorCategory::SoilNutrient,
            Feature::Ph | Feature::PhAcidityBucket => FactorCategory::SoilChemistry,
            Feature::Temperature | Feature::Humidity | Feature::TempHumidityInteraction => {
                FactorCategory::Climate
            }
            Feature::Rainfall | Feature::RainfallHumidityRatio => FactorCategory::Water,
        }
    }

    pub const fn is_raw(self) -> bool {
        self.index() < RAW_FEATURE_COUNT
    }

    pub fn from_name(name: &str) -> Option<Self> {
        FEATURE_LAYOUT.iter().copied().find(|f| f.name() == name)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 hash of the feature layout
/// Used to detect layout mismatches at runtime
pub fn compute_layout_hash() -> u32 {
    let mut hasher = Hasher::new();

    // Include version in hash
    hasher.update(&[FEATURE_VERSION]);

    // Hash all feature names in order
    for feature in FEATURE_LAYOUT {
        hasher.update(feature.name().as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

static LAYOUT_HASH: Lazy<u32> = Lazy::new(compute_layout_hash);

/// Get layout hash (cached)
pub fn layout_hash() -> u32 {
    *LAYOUT_HASH
}

/// Column names in layout order
pub fn feature_names() -> Vec<String> {
    FEATURE_LAYOUT.iter().map(|f| f.name().to_string()).collect()
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Error when feature layout doesn't match expected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Feature layout mismatch: expected v{expected_version} (hash: {expected_hash:08x}), \
     got v{actual_version} (hash: {actual_hash:08x})"
)]
pub struct LayoutMismatchError {
    pub expected_version: u8,
    pub expected_hash: u32,
    pub actual_version: u8,
    pub actual_hash: u32,
}

impl From<LayoutMismatchError> for EngineError {
    fn from(err: LayoutMismatchError) -> Self {
        EngineError::configuration(Stage::Artifact, err.to_string())
    }
}

/// Validate that incoming data matches current layout
pub fn validate_layout(
    incoming_version: u8,
    incoming_hash: u32,
) -> Result<(), LayoutMismatchError> {
    let current_hash = layout_hash();

    if incoming_version != FEATURE_VERSION || incoming_hash != current_hash {
        return Err(LayoutMismatchError {
            expected_version: FEATURE_VERSION,
            expected_hash: current_hash,
            actual_version: incoming_version,
            actual_hash: incoming_hash,
        });
    }

    Ok(())
}

/// Check a column list (as stored in an artifact) against the layout
pub fn validate_feature_names(names: &[String]) -> Result<(), EngineError> {
    if names.len() != FEATURE_COUNT {
        return Err(EngineError::configuration(
            Stage::Artifact,
            format!("artifact lists {} features, layout has {}", names.len(), FEATURE_COUNT),
        ));
    }

    for (i, (name, expected)) in names.iter().zip(FEATURE_LAYOUT).enumerate() {
        match Feature::from_name(name) {
            Some(feature) if feature == expected => {}
            Some(_) => {
                return Err(EngineError::configuration(
                    Stage::Artifact,
                    format!("column {} is `{}`, layout expects `{}`", i, name, expected.name()),
                ))
            }
            None => {
                return Err(EngineError::configuration(
                    Stage::Artifact,
                    format!("column {} `{}` is not a known feature", i, name),
                ))
            }
        }
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_count() {
        assert_eq!(FEATURE_LAYOUT.len(), FEATURE_COUNT);
        assert_eq!(RAW_FEATURES.len(), RAW_FEATURE_COUNT);
        assert_eq!(&FEATURE_LAYOUT[..RAW_FEATURE_COUNT], &RAW_FEATURES[..]);
    }

    #[test]
    fn test_discriminant_matches_position() {
        for (i, feature) in FEATURE_LAYOUT.iter().enumerate() {
            assert_eq!(feature.index(), i);
        }
    }

    #[test]
    fn test_layout_hash_consistency() {
        assert_eq!(compute_layout_hash(), layout_hash());
        assert_ne!(layout_hash(), 0);
    }

    #[test]
    fn test_validate_layout() {
        assert!(validate_layout(FEATURE_VERSION, layout_hash()).is_ok());
        assert!(validate_layout(FEATURE_VERSION + 1, layout_hash()).is_err());

        let err = validate_layout(FEATURE_VERSION, !layout_hash()).unwrap_err();
        assert_eq!(err.expected_hash, layout_hash());
        assert!(EngineError::from(err).is_configuration());
    }

    #[test]
    fn test_feature_names_roundtrip() {
        assert_eq!(Feature::from_name("ph"), Some(Feature::Ph));
        assert_eq!(Feature::from_name("NPK_sum"), Some(Feature::NpkSum));
        assert_eq!(Feature::from_name("nitrogen"), None);
        assert!(validate_feature_names(&feature_names()).is_ok());
    }

    #[test]
    fn test_swapped_columns_rejected() {
        let mut names = feature_names();
        names.swap(5, 6);
        let err = validate_feature_names(&names).unwrap_err();
        assert!(err.to_string().contains("column 5"));

        names.pop();
        assert!(validate_feature_names(&names).is_err());
    }

    #[test]
    fn test_unknown_column_rejected() {
        let mut names = feature_names();
        names[0] = "nitrogen".to_string();
        let err = validate_feature_names(&names).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("not a known feature"));
    }

    #[test]
    fn test_serde_uses_column_names() {
        let json = serde_json::to_string(&Feature::TempHumidityInteraction).unwrap();
        assert_eq!(json, "\"temp_humidity_interaction\"");
        let back: Feature = serde_json::from_str("\"K\"").unwrap();
        assert_eq!(back, Feature::Potassium);
    }

    #[test]
    fn test_categories() {
        assert_eq!(Feature::Humidity.category(), FactorCategory::Climate);
        assert_eq!(Feature::PhAcidityBucket.category(), FactorCategory::SoilChemistry);
        assert_eq!(Feature::RainfallHumidityRatio.category(), FactorCategory::Water);
        assert_eq!(Feature::NkRatio.category(), FactorCategory::SoilNutrient);
    }
}
