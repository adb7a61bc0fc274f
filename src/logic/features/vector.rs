//! Feature Vector - Core data structure for ML input
//!
//! **Versioned feature vector with layout validation**
//!
//! Uses centralized layout from `layout.rs` for:
//! - Consistent feature ordering
//! - Version tracking
//! - Layout hash for compatibility checks

use serde::{Deserialize, Serialize};

use super::layout::{
    layout_hash, validate_layout, Feature, LayoutMismatchError, FEATURE_COUNT, FEATURE_LAYOUT,
    FEATURE_VERSION,
};

// ============================================================================
// VERSIONED FEATURE VECTOR
// ============================================================================

/// Engineered (unstandardized) feature vector with layout metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Feature layout version
    pub version: u8,
    /// CRC32 hash of the feature layout (for mismatch detection)
    pub layout_hash: u32,
    /// Feature values in order defined by FEATURE_LAYOUT
    pub values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Create from raw values with current version
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values,
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    /// (feature, value) pairs in layout order
    pub fn named(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        FEATURE_LAYOUT.iter().copied().zip(self.values.iter().copied())
    }

    /// First non-finite feature, if any
    pub fn first_non_finite(&self) -> Option<Feature> {
        self.named().find(|(_, v)| !v.is_finite()).map(|(f, _)| f)
    }

    /// Validate that this vector is compatible with current layout
    pub fn validate(&self) -> Result<(), LayoutMismatchError> {
        validate_layout(self.version, self.layout_hash)
    }

    /// Convert to JSON-serializable format for logging
    pub fn to_log_entry(&self) -> serde_json::Value {
        serde_json::json!({
            "feature_version": self.version,
            "layout_hash": self.layout_hash,
            "named_values": self.named()
                .map(|(feature, value)| (feature.name().to_string(), value))
                .collect::<std::collections::BTreeMap<_, _>>(),
        })
    }
}

// ============================================================================
// STANDARDIZED VECTOR
// ============================================================================

/// Feature vector after z-scoring; the classifier's only input type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizedVector {
    pub version: u8,
    pub layout_hash: u32,
    pub values: [f64; FEATURE_COUNT],
}

impl StandardizedVector {
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values,
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn validate(&self) -> Result<(), LayoutMismatchError> {
        validate_layout(self.version, self.layout_hash)
    }
}
