//! Explain Module - Feature Attribution
//!
//! Answers "why is this crop a poor fit?" by splitting the target class
//! margin into one signed contribution per feature.
//!
//! ## Guarantees
//! - Contributions sum to `target_log_odds − baseline_log_odds` (checked per call)
//! - Limiting factors are the most negative contributions, ties by layout order
//! - Models without tree structure fail with `UnsupportedModel`

pub mod engine;
pub mod tree_shap;
pub mod types;

#[cfg(test)]
mod tests;

pub use engine::{explain, explain_classifier, limiting_factors, ExplainOptions};
pub use tree_shap::tree_shap;
pub use types::{AttributionReport, FeatureContribution};
