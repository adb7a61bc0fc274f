//! Attribution engine
//!
//! Decomposes the target class margin into per-feature contributions with
//! TreeSHAP and checks that they add up before anything leaves this module.

use std::cmp::Ordering;

use super::tree_shap::tree_shap;
use super::types::{AttributionReport, FeatureContribution};
use crate::constants::{DEFAULT_ADDITIVITY_TOLERANCE, DEFAULT_TOP_K};
use crate::logic::error::{EngineError, EngineResult, Stage};
use crate::logic::features::{FeatureVector, StandardizedVector, FEATURE_COUNT, FEATURE_LAYOUT};
use crate::logic::model::{Crop, SuitabilityClassifier, TreeEnsemble};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplainOptions {
    pub limiting_factor_count: usize,
    pub additivity_tolerance: f64,
}

impl Default for ExplainOptions {
    fn default() -> Self {
        Self {
            limiting_factor_count: DEFAULT_TOP_K,
            additivity_tolerance: DEFAULT_ADDITIVITY_TOLERANCE,
        }
    }
}

/// Explain through the classifier seam; models without trees are rejected
pub fn explain_classifier(
    classifier: &dyn SuitabilityClassifier,
    engineered: &FeatureVector,
    input: &StandardizedVector,
    target: Crop,
    options: ExplainOptions,
) -> EngineResult<AttributionReport> {
    let ensemble = classifier.tree_ensemble().ok_or_else(|| {
        EngineError::unsupported(format!(
            "classifier `{}` exposes no tree structure to attribute",
            classifier.name()
        ))
    })?;
    explain(ensemble, engineered, input, target, options)
}

/// Per-feature SHAP values for `target`, verified to sum to margin − baseline
pub fn explain(
    ensemble: &TreeEnsemble,
    engineered: &FeatureVector,
    input: &StandardizedVector,
    target: Crop,
    options: ExplainOptions,
) -> EngineResult<AttributionReport> {
    let class = target.index();
    if class >= ensemble.class_count {
        return Err(EngineError::invariant(
            Stage::Explanation,
            format!("target `{}` is not a class of this model", target),
        ));
    }

    input
        .validate()
        .map_err(|e| EngineError::invariant(Stage::Explanation, e.to_string()))?;

    let x = input.as_slice();
    if ensemble.feature_count != FEATURE_COUNT || x.len() != FEATURE_COUNT {
        return Err(EngineError::invariant(
            Stage::Explanation,
            format!(
                "model has {} inputs, vector has {}",
                ensemble.feature_count,
                x.len()
            ),
        ));
    }

    let mut phi = [0.0f64; FEATURE_COUNT];
    for tree in ensemble.trees_for(class) {
        tree_shap(tree, x, &mut phi);
    }

    if let Some(i) = phi.iter().position(|v| !v.is_finite()) {
        return Err(EngineError::invariant(
            Stage::Explanation,
            format!("contribution of `{}` is not finite", FEATURE_LAYOUT[i]),
        ));
    }

    let target_log_odds = ensemble.margins(x)[class];
    let baseline_log_odds = ensemble.expected_margin(class);
    let total: f64 = phi.iter().sum();
    let additivity_error = (total - (target_log_odds - baseline_log_odds)).abs();

    if additivity_error.is_nan() || additivity_error >= options.additivity_tolerance {
        return Err(EngineError::invariant(
            Stage::Explanation,
            format!(
                "contributions sum to {:.6} but margin − baseline is {:.6}",
                total,
                target_log_odds - baseline_log_odds
            ),
        ));
    }

    let contributions: Vec<FeatureContribution> = FEATURE_LAYOUT
        .iter()
        .zip(phi)
        .map(|(feature, contribution)| FeatureContribution {
            feature: *feature,
            value: engineered.get(*feature),
            contribution,
            category: feature.category(),
        })
        .collect();

    let limiting_factors = limiting_factors(&contributions, options.limiting_factor_count);

    log::debug!(
        "Explained {}: margin {:.4}, baseline {:.4}, additivity error {:.2e}",
        target,
        target_log_odds,
        baseline_log_odds,
        additivity_error
    );

    Ok(AttributionReport {
        target,
        target_log_odds,
        baseline_log_odds,
        contributions,
        limiting_factors,
        additivity_error,
    })
}

/// Up to `k` negative contributions, most negative first, ties by layout order
pub fn limiting_factors(
    contributions: &[FeatureContribution],
    k: usize,
) -> Vec<FeatureContribution> {
    let mut negative: Vec<FeatureContribution> = contributions
        .iter()
        .filter(|c| c.is_negative())
        .cloned()
        .collect();

    negative.sort_by(|a, b| match a.contribution.total_cmp(&b.contribution) {
        Ordering::Equal => a.feature.index().cmp(&b.feature.index()),
        other => other,
    });
    negative.truncate(k);
    negative
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::Feature;

    fn contribution(feature: Feature, value: f64) -> FeatureContribution {
        FeatureContribution {
            feature,
            value: 0.0,
            contribution: value,
            category: feature.category(),
        }
    }

    #[test]
    fn test_limiting_factors_order_and_ties() {
        let contributions = vec![
            contribution(Feature::Nitrogen, -0.5),
            contribution(Feature::Temperature, 0.3),
            contribution(Feature::Humidity, -1.0),
            contribution(Feature::Ph, -0.5),
            contribution(Feature::Rainfall, 0.0),
        ];

        let factors = limiting_factors(&contributions, 5);
        let features: Vec<Feature> = factors.iter().map(|f| f.feature).collect();
        assert_eq!(features, vec![Feature::Humidity, Feature::Nitrogen, Feature::Ph]);

        let factors = limiting_factors(&contributions, 2);
        assert_eq!(factors.len(), 2);
        assert_eq!(factors[1].feature, Feature::Nitrogen);
    }

    #[test]
    fn test_no_negative_contributions() {
        let contributions = vec![contribution(Feature::Ph, 0.2)];
        assert!(limiting_factors(&contributions, 5).is_empty());
    }
}
