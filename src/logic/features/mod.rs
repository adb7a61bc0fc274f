//! Features Module - Observation to Feature Vector
//!
//! Turns a raw seven-field observation into the 14-column vector the
//! classifier consumes: validate → dampen → engineer.
//!
//! ## Architecture
//! - `layout.rs` - Single source of truth for column order and layout hash
//! - `observation.rs` - Raw input and physical-range checks
//! - `damping.rs` - Percentile clamp replay
//! - `engineer.rs` - Derived agronomic features
//! - `vector.rs` - Versioned vector types

pub mod damping;
pub mod engineer;
pub mod layout;
pub mod observation;
pub mod vector;


// Re-export common types
pub use damping::{DampedObservation, DampingBound, DampingParameters};
pub use engineer::{engineer, PhBucket, EPSILON};
pub use layout::{
    feature_names, layout_hash, validate_feature_names, validate_layout, FactorCategory, Feature,
    LayoutMismatchError, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION,
    RAW_FEATURES, RAW_FEATURE_COUNT,
};
pub use observation::{physical_range, PhysicalRange, RawObservation};
pub use vector::{FeatureVector, StandardizedVector};
