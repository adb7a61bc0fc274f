//! Logic Module - Inference & Explainability
//!
//! ## Architecture
//! - `features/` - Raw observation, damping, feature engineering, layout
//! - `model/` - Crop catalog, normalization, tree ensemble, ranking, bundle
//! - `explain/` - TreeSHAP attribution and limiting factors
//! - `advisory` - Condition warnings and factor hints
//! - `engine` - Pipeline entry point and live-engine handle

pub mod advisory;
pub mod config;
pub mod engine;
pub mod error;
pub mod explain;
pub mod features;
pub mod model;
pub mod result;
