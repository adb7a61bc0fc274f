//! Additive Tree Ensemble
//!
//! Multiclass gradient-boosted trees: every class owns a set of regression
//! trees whose leaf values add up (plus a base score) to that class margin.
//! Probabilities are the softmax of the margins.
//!
//! ## Tree layout
//! Nodes live in a flat arena with the root at index 0. Children always
//! sit at a higher index than their parent, so one reverse sweep visits
//! every child before its parent. Routing: `x[feature] <= threshold` goes left.
//!
//! Every node records its `cover` (training rows that reached it). A split's
//! cover equals the sum of its children's; TreeSHAP depends on it.

use serde::{Deserialize, Serialize};

use crate::logic::error::{EngineError, EngineResult, Stage};

/// Relative slack allowed when checking that covers add up
const COVER_TOLERANCE: f64 = 1e-6;

// ============================================================================
// NODES & TREES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Structural checks: proper tree shape, finite values, consistent covers
    pub fn validate(&self, feature_count: usize) -> EngineResult<()> {
        if self.nodes.is_empty() {
            return Err(artifact_error("tree has no nodes"));
        }

        let mut parents = vec![0usize; self.nodes.len()];

        for (i, node) in self.nodes.iter().enumerate() {
            let cover = node.cover();
            if !cover.is_finite() || cover <= 0.0 {
                return Err(artifact_error(format!("node {} has invalid cover {}", i, cover)));
            }

            match node {
                Node::Leaf { value, .. } => {
                    if !value.is_finite() {
                        return Err(artifact_error(format!("leaf {} has non-finite value", i)));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= feature_count {
                        return Err(artifact_error(format!(
                            "node {} splits on feature {} but the model has {} inputs",
                            i, feature, feature_count
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(artifact_error(format!("node {} has non-finite threshold", i)));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(artifact_error(format!(
                                "node {} points at invalid child {}",
                                i, child
                            )));
                        }
                        parents[child] += 1;
                    }

                    let child_cover = self.nodes[*left].cover() + self.nodes[*right].cover();
                    if (child_cover - cover).abs() > COVER_TOLERANCE * cover.max(1.0) {
                        return Err(artifact_error(format!(
                            "node {} cover {} does not match children sum {}",
                            i, cover, child_cover
                        )));
                    }
                }
            }
        }

        if let Some(i) = parents.iter().skip(1).position(|&count| count != 1) {
            return Err(artifact_error(format!(
                "node {} is referenced {} times",
                i + 1,
                parents[i + 1]
            )));
        }

        Ok(())
    }

    /// Leaf value reached by `x`
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    index = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Cover-weighted mean leaf value: the tree's output with no feature known
    pub fn expected_value(&self) -> f64 {
        let mut expected = vec![0.0f64; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate().rev() {
            expected[i] = match node {
                Node::Leaf { value, .. } => *value,
                Node::Split {
                    left, right, cover, ..
                } => {
                    let (l, r) = (&self.nodes[*left], &self.nodes[*right]);
                    (l.cover() * expected[*left] + r.cover() * expected[*right]) / cover
                }
            };
        }
        expected.first().copied().unwrap_or(0.0)
    }
}

fn artifact_error(reason: impl Into<String>) -> EngineError {
    EngineError::configuration(Stage::Artifact, reason)
}

// ============================================================================
// ENSEMBLE
// ============================================================================

/// A tree contributing to one class margin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassTree {
    pub class: usize,
    pub tree: Tree,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub feature_count: usize,
    pub class_count: usize,
    pub base_scores: Vec<f64>,
    pub trees: Vec<ClassTree>,
}

impl TreeEnsemble {
    pub fn validate(&self) -> EngineResult<()> {
        if self.class_count == 0 {
            return Err(artifact_error("ensemble declares zero classes"));
        }
        if self.base_scores.len() != self.class_count {
            return Err(artifact_error(format!(
                "{} base scores for {} classes",
                self.base_scores.len(),
                self.class_count
            )));
        }
        if self.base_scores.iter().any(|b| !b.is_finite()) {
            return Err(artifact_error("non-finite base score"));
        }

        for (i, class_tree) in self.trees.iter().enumerate() {
            if class_tree.class >= self.class_count {
                return Err(artifact_error(format!(
                    "tree {} targets class {} of {}",
                    i, class_tree.class, self.class_count
                )));
            }
            class_tree
                .tree
                .validate(self.feature_count)
                .map_err(|e| match e {
                    EngineError::Configuration { reason, .. } => {
                        artifact_error(format!("tree {}: {}", i, reason))
                    }
                    other => other,
                })?;
        }

        Ok(())
    }

    /// Trees contributing to `class`
    pub fn trees_for(&self, class: usize) -> impl Iterator<Item = &Tree> + '_ {
        self.trees
            .iter()
            .filter(move |t| t.class == class)
            .map(|t| &t.tree)
    }

    /// Raw per-class margins (log-odds scale)
    pub fn margins(&self, x: &[f64]) -> Vec<f64> {
        let mut margins = self.base_scores.clone();
        for class_tree in &self.trees {
            margins[class_tree.class] += class_tree.tree.predict(x);
        }
        margins
    }

    /// Margin of `class` when no feature is known
    pub fn expected_margin(&self, class: usize) -> f64 {
        let base = self.base_scores.get(class).copied().unwrap_or(0.0);
        base + self.trees_for(class).map(Tree::expected_value).sum::<f64>()
    }

    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        softmax(&self.margins(x))
    }
}

/// Numerically stable softmax
pub fn softmax(margins: &[f64]) -> Vec<f64> {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = margins.iter().map(|m| (m - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// x0 <= 0 → (x1 <= 1 → 1.0 | 3.0) | -2.0
    fn stump_tree() -> Tree {
        Tree::new(vec![
            Node::Split { feature: 0, threshold: 0.0, left: 1, right: 2, cover: 10.0 },
            Node::Split { feature: 1, threshold: 1.0, left: 3, right: 4, cover: 6.0 },
            Node::Leaf { value: -2.0, cover: 4.0 },
            Node::Leaf { value: 1.0, cover: 2.0 },
            Node::Leaf { value: 3.0, cover: 4.0 },
        ])
    }

    #[test]
    fn test_predict_routes_left_on_equal() {
        let tree = stump_tree();
        assert_eq!(tree.predict(&[0.0, 1.0]), 1.0);
        assert_eq!(tree.predict(&[-1.0, 1.5]), 3.0);
        assert_eq!(tree.predict(&[0.1, 0.0]), -2.0);
        assert_eq!(tree.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count(), 3);
    }

    #[test]
    fn test_expected_value() {
        // (2*1 + 4*3 + 4*-2) / 10
        assert!((stump_tree().expected_value() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_validate_catches_bad_cover() {
        let mut tree = stump_tree();
        assert!(tree.validate(2).is_ok());
        tree.nodes[2] = Node::Leaf { value: -2.0, cover: 5.0 };
        assert!(tree.validate(2).is_err());
    }

    #[test]
    fn test_validate_catches_cycles_and_bad_features() {
        let mut tree = stump_tree();
        tree.nodes[1] = Node::Split { feature: 1, threshold: 1.0, left: 0, right: 4, cover: 6.0 };
        assert!(tree.validate(2).is_err());

        assert!(stump_tree().validate(1).is_err());
    }

    #[test]
    fn test_validate_catches_shared_child() {
        let tree = Tree::new(vec![
            Node::Split { feature: 0, threshold: 0.0, left: 1, right: 1, cover: 2.0 },
            Node::Leaf { value: 1.0, cover: 1.0 },
        ]);
        assert!(tree.validate(1).is_err());
    }

    #[test]
    fn test_margins_and_softmax() {
        let ensemble = TreeEnsemble {
            feature_count: 2,
            class_count: 2,
            base_scores: vec![0.5, 0.0],
            trees: vec![
                ClassTree { class: 0, tree: stump_tree() },
                ClassTree {
                    class: 1,
                    tree: Tree::new(vec![Node::Leaf { value: 1.0, cover: 10.0 }]),
                },
            ],
        };
        assert!(ensemble.validate().is_ok());

        let margins = ensemble.margins(&[0.0, 0.0]);
        assert_eq!(margins, vec![1.5, 1.0]);

        let proba = ensemble.predict_proba(&[0.0, 0.0]);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(proba[0] > proba[1]);
        assert!((ensemble.expected_margin(0) - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_softmax_is_stable() {
        let p = softmax(&[1000.0, 1000.0]);
        assert_eq!(p, vec![0.5, 0.5]);
    }

    #[test]
    fn test_node_serde_tag() {
        let json = serde_json::to_value(Node::Leaf { value: 1.0, cover: 2.0 }).unwrap();
        assert_eq!(json["kind"], "leaf");
    }
}
