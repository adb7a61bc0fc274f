//! Path-dependent TreeSHAP
//!
//! Exact Shapley values of a single tree's output, where "feature unknown"
//! means following both children weighted by training cover (Lundberg et
//! al., Algorithm 2). Polynomial in depth instead of exponential in the
//! number of features.
//!
//! The recursion keeps the unique features seen on the current root-to-node
//! path. For each element it tracks the fraction of "zero" paths (feature
//! unknown, cover-weighted) and "one" paths (feature known, follows `x`),
//! plus permutation weights that EXTEND/UNWIND update incrementally.

use crate::logic::model::{Node, Tree};

#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// `None` only for the synthetic root element
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

/// Add this tree's contributions for `x` into `phi` (indexed by feature)
pub fn tree_shap(tree: &Tree, x: &[f64], phi: &mut [f64]) {
    if tree.nodes.is_empty() {
        return;
    }
    recurse(tree, x, phi, 0, &[], 1.0, 1.0, None);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    x: &[f64],
    phi: &mut [f64],
    node: usize,
    parent_path: &[PathElement],
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let mut path = parent_path.to_vec();
    extend(&mut path, zero_fraction, one_fraction, feature);

    match &tree.nodes[node] {
        Node::Leaf { value, .. } => {
            for i in 1..path.len() {
                let element = path[i];
                if let Some(f) = element.feature {
                    let weight = unwound_sum(&path, i);
                    phi[f] += weight * (element.one_fraction - element.zero_fraction) * value;
                }
            }
        }
        Node::Split {
            feature: split_feature,
            threshold,
            left,
            right,
            cover,
        } => {
            let (hot, cold) = if x[*split_feature] <= *threshold {
                (*left, *right)
            } else {
                (*right, *left)
            };

            // A feature already on the path is merged, not counted twice
            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;
            if let Some(k) = (1..path.len()).find(|&i| path[i].feature == Some(*split_feature)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind(&mut path, k);
            }

            let hot_cover = tree.nodes[hot].cover();
            let cold_cover = tree.nodes[cold].cover();

            recurse(
                tree,
                x,
                phi,
                hot,
                &path,
                incoming_zero * hot_cover / cover,
                incoming_one,
                Some(*split_feature),
            );
            recurse(
                tree,
                x,
                phi,
                cold,
                &path,
                incoming_zero * cold_cover / cover,
                0.0,
                Some(*split_feature),
            );
        }
    }
}

fn extend(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let scale = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / scale;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / scale;
    }
}

/// Remove element `index` from the path, undoing its EXTEND
fn unwind(path: &mut Vec<PathElement>, index: usize) {
    let last = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let scale = (last + 1) as f64;
    let mut next = path[last].weight;

    for j in (0..last).rev() {
        if one_fraction != 0.0 {
            let tmp = path[j].weight;
            path[j].weight = next * scale / ((j + 1) as f64 * one_fraction);
            next = tmp - path[j].weight * zero_fraction * (last - j) as f64 / scale;
        } else {
            path[j].weight = path[j].weight * scale / (zero_fraction * (last - j) as f64);
        }
    }

    for j in index..last {
        path[j].feature = path[j + 1].feature;
        path[j].zero_fraction = path[j + 1].zero_fraction;
        path[j].one_fraction = path[j + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight the path would have with element `index` removed
fn unwound_sum(path: &[PathElement], index: usize) -> f64 {
    let last = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let scale = (last + 1) as f64;
    let mut next = path[last].weight;
    let mut total = 0.0;

    for j in (0..last).rev() {
        if one_fraction != 0.0 {
            let tmp = next * scale / ((j + 1) as f64 * one_fraction);
            total += tmp;
            next = path[j].weight - tmp * zero_fraction * (last - j) as f64 / scale;
        } else if zero_fraction != 0.0 {
            total += (path[j].weight / zero_fraction) / ((last - j) as f64 / scale);
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        Tree::new(vec![
            Node::Split { feature: 0, threshold: 0.5, left: 1, right: 2, cover: 4.0 },
            Node::Leaf { value: -1.0, cover: 3.0 },
            Node::Leaf { value: 3.0, cover: 1.0 },
        ])
    }

    #[test]
    fn test_single_split_contribution() {
        // E[f] = (3*-1 + 1*3)/4 = 0; x goes right → phi = 3 - 0
        let mut phi = [0.0; 2];
        tree_shap(&stump(), &[1.0, 0.0], &mut phi);
        assert!((phi[0] - 3.0).abs() < 1e-12);
        assert_eq!(phi[1], 0.0);

        let mut phi = [0.0; 2];
        tree_shap(&stump(), &[0.0, 0.0], &mut phi);
        assert!((phi[0] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_leaf_only_tree_has_no_contributions() {
        let tree = Tree::new(vec![Node::Leaf { value: 7.0, cover: 1.0 }]);
        let mut phi = [0.0; 3];
        tree_shap(&tree, &[1.0, 2.0, 3.0], &mut phi);
        assert_eq!(phi, [0.0; 3]);
    }

    #[test]
    fn test_repeated_feature_on_path() {
        // x0 split twice on the same path
        let tree = Tree::new(vec![
            Node::Split { feature: 0, threshold: 0.0, left: 1, right: 2, cover: 10.0 },
            Node::Leaf { value: -2.0, cover: 4.0 },
            Node::Split { feature: 0, threshold: 1.0, left: 3, right: 4, cover: 6.0 },
            Node::Leaf { value: 1.0, cover: 3.0 },
            Node::Leaf { value: 5.0, cover: 3.0 },
        ]);
        let expected = tree.expected_value();
        let mut phi = [0.0; 1];
        tree_shap(&tree, &[2.0], &mut phi);
        assert!((phi[0] - (5.0 - expected)).abs() < 1e-12);
    }
}
