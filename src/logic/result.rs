//! Suitability Result
//!
//! What one `evaluate` call hands back. Built only after every stage has
//! succeeded, so a result never carries half-finished parts.

use serde::Serialize;

use crate::logic::advisory::{ConditionWarning, FactorHint};
use crate::logic::explain::AttributionReport;
use crate::logic::features::Feature;
use crate::logic::model::{ConfidenceLevel, Crop, CropProbability, EvaluationMode, Ranking};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuitabilityResult {
    /// Evaluated crop: the requested one, or the top-ranked one
    pub crop: Crop,
    pub mode: EvaluationMode,
    /// Probability mass assigned to `crop`
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    /// Every crop, most suitable first
    pub ranking: Ranking,
    /// Present exactly when confidence is below the explain threshold
    pub explanation: Option<AttributionReport>,
    pub factor_hints: Vec<FactorHint>,
    /// Raw inputs that were outside the training envelope
    pub clamped_features: Vec<Feature>,
    pub warnings: Vec<ConditionWarning>,
    pub layout_hash: u32,
}

impl SuitabilityResult {
    /// Ranking minus the evaluated crop
    pub fn alternatives(&self) -> Vec<CropProbability> {
        self.ranking.alternatives(self.crop).copied().collect()
    }

    pub fn top(&self, k: usize) -> &[CropProbability] {
        self.ranking.top(k)
    }

    pub fn is_explained(&self) -> bool {
        self.explanation.is_some()
    }

    pub fn was_clamped(&self, feature: Feature) -> bool {
        self.clamped_features.contains(&feature)
    }
}
