use serde::{Deserialize, Serialize};

use crate::logic::features::{FactorCategory, Feature};
use crate::logic::model::Crop;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: Feature,
    /// Engineered value in natural units (before standardization)
    pub value: f64,
    /// Signed share of the target margin; negative depresses suitability
    pub contribution: f64,
    pub category: FactorCategory,
}

impl FeatureContribution {
    pub fn is_negative(&self) -> bool {
        self.contribution < 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionReport {
    pub target: Crop,
    /// Raw class margin of the target for this observation
    pub target_log_odds: f64,
    /// Expected margin over the training distribution
    pub baseline_log_odds: f64,
    /// One entry per feature, layout order
    pub contributions: Vec<FeatureContribution>,
    /// Most negative contributions first
    pub limiting_factors: Vec<FeatureContribution>,
    /// |Σ contributions − (target − baseline)|
    pub additivity_error: f64,
}

impl AttributionReport {
    pub fn contribution(&self, feature: Feature) -> Option<f64> {
        self.contributions
            .iter()
            .find(|c| c.feature == feature)
            .map(|c| c.contribution)
    }

    pub fn total(&self) -> f64 {
        self.contributions.iter().map(|c| c.contribution).sum()
    }

    pub fn is_limiting(&self, feature: Feature) -> bool {
        self.limiting_factors.iter().any(|c| c.feature == feature)
    }
}
