//! Classifier seam
//!
//! The engine talks to its model only through [`SuitabilityClassifier`].
//! Attribution additionally needs the tree structure, which a classifier
//! exposes through [`SuitabilityClassifier::tree_ensemble`]; models that
//! return `None` can still rank crops but cannot be explained.

use crate::logic::error::{EngineError, EngineResult, Stage};
use crate::logic::features::StandardizedVector;

use super::ensemble::TreeEnsemble;

// ============================================================================
// CLASSIFIER TRAIT
// ============================================================================

/// Trait for crop classifiers (tree ensembles, test doubles, etc.)
pub trait SuitabilityClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Number of input columns expected
    fn input_width(&self) -> usize;

    /// Number of crop classes produced
    fn class_count(&self) -> usize;

    /// One probability per class, in label-encoder order
    fn predict_proba(&self, input: &StandardizedVector) -> EngineResult<Vec<f64>>;

    /// Tree structure for attribution, if this model has one
    fn tree_ensemble(&self) -> Option<&TreeEnsemble> {
        None
    }
}

impl SuitabilityClassifier for TreeEnsemble {
    fn name(&self) -> &str {
        "gradient_boosted_trees"
    }

    fn input_width(&self) -> usize {
        self.feature_count
    }

    fn class_count(&self) -> usize {
        self.class_count
    }

    fn predict_proba(&self, input: &StandardizedVector) -> EngineResult<Vec<f64>> {
        input
            .validate()
            .map_err(|e| EngineError::invariant(Stage::Classification, e.to_string()))?;

        let x = input.as_slice();
        if x.len() != self.feature_count {
            return Err(EngineError::invariant(
                Stage::Classification,
                format!("model expects {} inputs, got {}", self.feature_count, x.len()),
            ));
        }

        let proba = TreeEnsemble::predict_proba(self, x);
        if proba.iter().any(|p| !p.is_finite()) {
            return Err(EngineError::invariant(
                Stage::Classification,
                "classifier produced a non-finite probability",
            ));
        }
        Ok(proba)
    }

    fn tree_ensemble(&self) -> Option<&TreeEnsemble> {
        Some(self)
    }
}
