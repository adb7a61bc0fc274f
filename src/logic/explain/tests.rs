//! TreeSHAP against exhaustive Shapley values

use super::*;
use crate::logic::error::{EngineError, Stage};
use crate::logic::features::{
    engineer, Feature, FeatureVector, RawObservation, StandardizedVector, FEATURE_COUNT,
};
use crate::logic::model::reference::{
    reference_damping, reference_ensemble, reference_normalization,
};
use crate::logic::model::{Crop, Node, Tree, TreeEnsemble};

/// E[tree | features in `known` fixed to x], others integrated out by cover
fn conditional_expectation(tree: &Tree, node: usize, x: &[f64], known: &[bool]) -> f64 {
    match &tree.nodes[node] {
        Node::Leaf { value, .. } => *value,
        Node::Split { feature, threshold, left, right, cover } => {
            if known[*feature] {
                let next = if x[*feature] <= *threshold { *left } else { *right };
                conditional_expectation(tree, next, x, known)
            } else {
                let l = conditional_expectation(tree, *left, x, known);
                let r = conditional_expectation(tree, *right, x, known);
                (tree.nodes[*left].cover() * l + tree.nodes[*right].cover() * r) / cover
            }
        }
    }
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|v| v as f64).product()
}

/// Exact Shapley values by enumerating every coalition of the used features
fn brute_force_shap(trees: &[&Tree], x: &[f64]) -> Vec<f64> {
    let mut used: Vec<usize> = Vec::new();
    for tree in trees {
        for node in &tree.nodes {
            if let Node::Split { feature, .. } = node {
                if !used.contains(feature) {
                    used.push(*feature);
                }
            }
        }
    }
    used.sort_unstable();

    let n = used.len();
    let value = |mask: usize| -> f64 {
        let mut known = vec![false; x.len()];
        for (bit, feature) in used.iter().enumerate() {
            known[*feature] = mask & (1 << bit) != 0;
        }
        trees.iter().map(|t| conditional_expectation(t, 0, x, &known)).sum()
    };

    let mut phi = vec![0.0; x.len()];
    for (bit, feature) in used.iter().enumerate() {
        for mask in 0..(1usize << n) {
            if mask & (1 << bit) != 0 {
                continue;
            }
            let size = mask.count_ones() as usize;
            let weight = factorial(size) * factorial(n - size - 1) / factorial(n);
            phi[*feature] += weight * (value(mask | (1 << bit)) - value(mask));
        }
    }
    phi
}

fn pipeline(raw: RawObservation) -> (FeatureVector, StandardizedVector) {
    let damped = reference_damping().unwrap().dampen(&raw).unwrap();
    let engineered = engineer(&damped).unwrap();
    let standardized = reference_normalization().unwrap().normalize(&engineered).unwrap();
    (engineered, standardized)
}

fn harsh() -> RawObservation {
    RawObservation::new(0.0, 5.0, 5.0, 43.0, 14.0, 3.5, 20.0)
}

fn small_tree() -> Tree {
    Tree::new(vec![
        Node::Split { feature: 0, threshold: 0.0, left: 1, right: 4, cover: 20.0 },
        Node::Split { feature: 1, threshold: 0.5, left: 2, right: 3, cover: 12.0 },
        Node::Leaf { value: 2.0, cover: 5.0 },
        Node::Leaf { value: -1.0, cover: 7.0 },
        Node::Split { feature: 2, threshold: -1.0, left: 5, right: 6, cover: 8.0 },
        Node::Leaf { value: 0.5, cover: 2.0 },
        Node::Split { feature: 0, threshold: 1.0, left: 7, right: 8, cover: 6.0 },
        Node::Leaf { value: 4.0, cover: 1.0 },
        Node::Leaf { value: -3.0, cover: 5.0 },
    ])
}

#[test]
fn test_tree_shap_matches_brute_force_small_tree() {
    let tree = small_tree();
    assert!(tree.validate(3).is_ok());

    let points: [[f64; 3]; 4] = [
        [-1.0, 0.0, 0.0],
        [0.5, 2.0, -2.0],
        [2.0, 0.0, 0.0],
        [0.0, 0.5, -1.0],
    ];
    for x in points {
        let mut phi = [0.0; 3];
        tree_shap(&tree, &x, &mut phi);
        let expected = brute_force_shap(&[&tree], &x);
        for f in 0..3 {
            assert!(
                (phi[f] - expected[f]).abs() < 1e-10,
                "x={:?} feature {}: {} vs {}",
                x,
                f,
                phi[f],
                expected[f]
            );
        }
    }
}

#[test]
fn test_tree_shap_matches_brute_force_reference_trees() {
    let ensemble = reference_ensemble();
    let observations = [
        harsh(),
        RawObservation::new(85.0, 50.0, 45.0, 24.0, 82.0, 6.5, 220.0),
        RawObservation::new(60.0, 40.0, 30.0, 30.0, 50.0, 7.9, 100.0),
    ];

    for raw in observations {
        let (_, x) = pipeline(raw);
        for crop in [Crop::Rice, Crop::Jute, Crop::Mothbeans] {
            let trees: Vec<&Tree> = ensemble.trees_for(crop.index()).collect();
            let mut phi = [0.0; FEATURE_COUNT];
            for tree in &trees {
                tree_shap(tree, x.as_slice(), &mut phi);
            }
            let expected = brute_force_shap(&trees, x.as_slice());
            for f in 0..FEATURE_COUNT {
                assert!((phi[f] - expected[f]).abs() < 1e-9, "{} feature {}", crop, f);
            }
        }
    }
}

#[test]
fn test_additivity_holds_for_every_crop() {
    let ensemble = reference_ensemble();
    let (engineered, x) = pipeline(harsh());

    for crop in Crop::ALL {
        let report = explain(&ensemble, &engineered, &x, crop, ExplainOptions::default()).unwrap();
        let expected = report.target_log_odds - report.baseline_log_odds;
        assert!((report.total() - expected).abs() < 1e-3);
        assert!(report.additivity_error < 1e-9);
        assert_eq!(report.contributions.len(), FEATURE_COUNT);
    }
}

#[test]
fn test_harsh_rice_limiting_factors() {
    let ensemble = reference_ensemble();
    let (engineered, x) = pipeline(harsh());

    let report =
        explain(&ensemble, &engineered, &x, Crop::Rice, ExplainOptions::default()).unwrap();
    assert_eq!(report.limiting_factors.len(), 5);
    assert!(report.is_limiting(Feature::Ph));
    assert!(report.is_limiting(Feature::Humidity));
    assert_eq!(report.limiting_factors[0].feature, Feature::Ph);
    assert!(report.limiting_factors.windows(2).all(|w| w[0].contribution <= w[1].contribution));

    // engineered values are reported in natural units
    let ph = report.limiting_factors.iter().find(|c| c.feature == Feature::Ph).unwrap();
    assert_eq!(ph.value, 3.8);
}

#[test]
fn test_unused_features_contribute_nothing() {
    let ensemble = reference_ensemble();
    let (engineered, x) = pipeline(harsh());
    let report =
        explain(&ensemble, &engineered, &x, Crop::Rice, ExplainOptions::default()).unwrap();
    assert_eq!(report.contribution(Feature::NpRatio), Some(0.0));
    assert_eq!(report.contribution(Feature::TempHumidityInteraction), Some(0.0));
}

#[test]
fn test_limiting_factor_count_is_configurable() {
    let ensemble = reference_ensemble();
    let (engineered, x) = pipeline(harsh());
    let options = ExplainOptions {
        limiting_factor_count: 2,
        ..ExplainOptions::default()
    };
    let report = explain(&ensemble, &engineered, &x, Crop::Rice, options).unwrap();
    assert_eq!(report.limiting_factors.len(), 2);
}

#[test]
fn test_tree_ensemble_through_classifier_seam() {
    let ensemble = reference_ensemble();
    let (engineered, x) = pipeline(harsh());
    let report = explain_classifier(
        &ensemble,
        &engineered,
        &x,
        Crop::Rice,
        ExplainOptions::default(),
    )
    .unwrap();
    assert_eq!(report.target, Crop::Rice);
}

#[test]
fn test_target_outside_model_classes() {
    let ensemble = TreeEnsemble {
        feature_count: FEATURE_COUNT,
        class_count: 2,
        base_scores: vec![0.0, 0.0],
        trees: vec![],
    };
    let (engineered, x) = pipeline(harsh());
    let err =
        explain(&ensemble, &engineered, &x, Crop::Rice, ExplainOptions::default()).unwrap_err();
    assert!(matches!(err, EngineError::InternalInvariant { .. }));
}

#[test]
fn test_foreign_layout_is_not_explained() {
    let ensemble = reference_ensemble();
    let (engineered, mut x) = pipeline(harsh());
    x.version += 1;

    let err =
        explain(&ensemble, &engineered, &x, Crop::Rice, ExplainOptions::default()).unwrap_err();
    assert!(matches!(err, EngineError::InternalInvariant { .. }), "{:?}", err);
    assert_eq!(err.stage(), Stage::Explanation);
}
