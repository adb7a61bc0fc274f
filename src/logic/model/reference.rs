//! Reference Model
//!
//! Builds the bundle of the reference deployment in-process: the damping
//! bounds and normalization statistics of the 2,200-row crop dataset, and
//! a boosted-tree ensemble whose splits follow each crop's growing envelope.
//!
//! ## Trees per crop (fixed order)
//! 1. One window tree per raw measurement: in range rewards, near misses
//!    cost a little, far misses cost a lot
//! 2. pH acidity bucket range
//! 3. Temperature × humidity climate box
//! 4. N + P + K total
//! 5. Rainfall / humidity water ratio
//!
//! Node covers approximate how many training rows fall in each region,
//! using a logistic approximation of the normal CDF on the z-scale.

use super::bundle::ModelBundle;
use super::crop::{Crop, CROP_COUNT};
use super::ensemble::{ClassTree, Node, Tree, TreeEnsemble};
use super::envelope::{envelope, CropEnvelope, Range};
use super::normalizer::{FeatureStat, NormalizationParameters};
use crate::logic::error::EngineResult;
use crate::logic::features::{
    DampingBound, DampingParameters, Feature, PhBucket, FEATURE_COUNT, FEATURE_LAYOUT,
    RAW_FEATURES, RAW_FEATURE_COUNT,
};

pub const REFERENCE_MODEL_NAME: &str = "crop-suitability-reference-v1";

/// Rows in the reference training set
const TRAINING_ROWS: f64 = 2200.0;
const MIN_LEAF_COVER: f64 = 1.0;
/// Logistic slope approximating the standard normal CDF
const CDF_SLOPE: f64 = 1.702;

/// Near-miss band width around each envelope, raw units
const WINDOW_MARGINS: [f64; RAW_FEATURE_COUNT] = [25.0, 25.0, 25.0, 5.0, 15.0, 1.0, 50.0];
/// Reward for landing inside each envelope
const WINDOW_WEIGHTS: [f64; RAW_FEATURE_COUNT] = [0.8, 0.8, 0.8, 0.9, 1.4, 0.9, 1.3];

const BUCKET_REWARD: f64 = 0.4;
const BUCKET_PENALTY: f64 = -0.6;
const CLIMATE_BONUS: f64 = 0.8;
const CLIMATE_PENALTY: f64 = -0.4;
const NUTRIENT_REWARD: f64 = 0.4;
const WATER_REWARD: f64 = 0.3;

/// 0.5th / 99.5th percentile clamp bounds, raw layout order
pub const REFERENCE_DAMPING: [(f64, f64); RAW_FEATURE_COUNT] = [
    (0.0, 139.0),
    (5.0, 145.0),
    (5.0, 205.0),
    (10.0, 42.9),
    (14.6, 99.6),
    (3.8, 9.6),
    (21.5, 297.5),
];

/// (mean, std) of every engineered column, layout order
pub const REFERENCE_NORMALIZATION: [(f64, f64); FEATURE_COUNT] = [
    (50.55, 36.92),
    (53.36, 32.99),
    (48.15, 50.65),
    (25.62, 5.06),
    (71.48, 22.26),
    (6.47, 0.774),
    (103.46, 54.96),
    (152.06, 82.5),
    (1.37, 1.47),
    (1.85, 2.43),
    (1.58, 1.03),
    (1843.0, 650.0),
    (1.89, 2.03),
    (1.55, 0.59),
];

pub fn reference_damping() -> EngineResult<DampingParameters> {
    let bounds = RAW_FEATURES
        .iter()
        .zip(REFERENCE_DAMPING)
        .map(|(feature, (lower, upper))| DampingBound::new(*feature, lower, upper))
        .collect();
    DampingParameters::new(bounds)
}

pub fn reference_normalization() -> EngineResult<NormalizationParameters> {
    let stats = FEATURE_LAYOUT
        .iter()
        .zip(REFERENCE_NORMALIZATION)
        .map(|(feature, (mean, std))| FeatureStat::new(*feature, mean, std))
        .collect();
    NormalizationParameters::new(stats)
}

/// Complete, validated reference bundle
pub fn reference_bundle() -> EngineResult<ModelBundle> {
    let bundle = ModelBundle::new(
        REFERENCE_MODEL_NAME,
        reference_damping()?,
        reference_normalization()?,
        reference_ensemble(),
    );
    bundle.validate()?;
    Ok(bundle)
}

pub fn reference_ensemble() -> TreeEnsemble {
    let mut trees = Vec::new();
    for crop in Crop::ALL {
        for shape in crop_trees(envelope(crop)) {
            trees.push(ClassTree {
                class: crop.index(),
                tree: shape.into_tree(),
            });
        }
    }

    TreeEnsemble {
        feature_count: FEATURE_COUNT,
        class_count: CROP_COUNT,
        base_scores: vec![0.0; CROP_COUNT],
        trees,
    }
}

// ============================================================================
// COVER MODEL
// ============================================================================

fn z_score(feature: Feature, raw: f64) -> f64 {
    let (mean, std) = REFERENCE_NORMALIZATION[feature.index()];
    (raw - mean) / std
}

fn approx_cdf(z: f64) -> f64 {
    1.0 / (1.0 + (-CDF_SLOPE * z).exp())
}

/// Share of training rows with `low < feature <= high`; `None` is unbounded
fn mass(feature: Feature, low: Option<f64>, high: Option<f64>) -> f64 {
    let below_low = low.map_or(0.0, |l| approx_cdf(z_score(feature, l)));
    let below_high = high.map_or(1.0, |h| approx_cdf(z_score(feature, h)));
    (below_high - below_low).max(0.0)
}

// ============================================================================
// TREE SHAPES
// ============================================================================

/// Recursive tree used while building; flattened into the node arena
enum Shape {
    Leaf {
        value: f64,
        cover: f64,
    },
    Split {
        feature: Feature,
        threshold: f64,
        left: Box<Shape>,
        right: Box<Shape>,
    },
}

impl Shape {
    fn leaf(value: f64, share: f64) -> Self {
        Shape::Leaf {
            value,
            cover: (TRAINING_ROWS * share).max(MIN_LEAF_COVER),
        }
    }

    /// Split at a raw-unit threshold; stored on the z-scale the model sees
    fn split(feature: Feature, raw_threshold: f64, left: Shape, right: Shape) -> Self {
        Shape::Split {
            feature,
            threshold: z_score(feature, raw_threshold),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn cover(&self) -> f64 {
        match self {
            Shape::Leaf { cover, .. } => *cover,
            Shape::Split { left, right, .. } => left.cover() + right.cover(),
        }
    }

    fn into_tree(self) -> Tree {
        let mut nodes = Vec::new();
        self.flatten(&mut nodes);
        Tree::new(nodes)
    }

    /// Pre-order: parent first, so children always get higher indices
    fn flatten(&self, nodes: &mut Vec<Node>) -> usize {
        let index = nodes.len();
        match self {
            Shape::Leaf { value, cover } => nodes.push(Node::Leaf {
                value: *value,
                cover: *cover,
            }),
            Shape::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                nodes.push(Node::Leaf {
                    value: 0.0,
                    cover: 0.0,
                });
                let left_index = left.flatten(nodes);
                let right_index = right.flatten(nodes);
                nodes[index] = Node::Split {
                    feature: feature.index(),
                    threshold: *threshold,
                    left: left_index,
                    right: right_index,
                    cover: self.cover(),
                };
            }
        }
        index
    }
}

fn crop_trees(env: &CropEnvelope) -> Vec<Shape> {
    let mut trees: Vec<Shape> = RAW_FEATURES
        .iter()
        .zip(env.ranges)
        .map(|(feature, range)| {
            let i = feature.index();
            window_tree(*feature, range, WINDOW_MARGINS[i], WINDOW_WEIGHTS[i])
        })
        .collect();

    let ph = env.ranges[Feature::Ph.index()];
    let buckets = Range::new(
        PhBucket::categorize(ph.low).code() - 0.5,
        PhBucket::categorize(ph.high).code() + 0.5,
    );
    trees.push(range_tree(Feature::PhAcidityBucket, buckets, BUCKET_REWARD, BUCKET_PENALTY));
    trees.push(climate_tree(env));
    trees.push(range_tree(Feature::NpkSum, env.nutrient_sum(), NUTRIENT_REWARD, -NUTRIENT_REWARD));
    trees.push(range_tree(
        Feature::RainfallHumidityRatio,
        env.water_ratio(),
        WATER_REWARD,
        -WATER_REWARD,
    ));
    trees
}

/// far-low | near-low | in range | near-high | far-high
fn window_tree(feature: Feature, range: Range, margin: f64, weight: f64) -> Shape {
    let (a, b, c, d) = (range.low - margin, range.low, range.high, range.high + margin);
    let near = -0.5 * weight;
    let far = -2.0 * weight;

    Shape::split(
        feature,
        b,
        Shape::split(
            feature,
            a,
            Shape::leaf(far, mass(feature, None, Some(a))),
            Shape::leaf(near, mass(feature, Some(a), Some(b))),
        ),
        Shape::split(
            feature,
            c,
            Shape::leaf(weight, mass(feature, Some(b), Some(c))),
            Shape::split(
                feature,
                d,
                Shape::leaf(near, mass(feature, Some(c), Some(d))),
                Shape::leaf(far, mass(feature, Some(d), None)),
            ),
        ),
    )
}

fn range_tree(feature: Feature, range: Range, inside: f64, outside: f64) -> Shape {
    Shape::split(
        feature,
        range.low,
        Shape::leaf(outside, mass(feature, None, Some(range.low))),
        Shape::split(
            feature,
            range.high,
            Shape::leaf(inside, mass(feature, Some(range.low), Some(range.high))),
            Shape::leaf(outside, mass(feature, Some(range.high), None)),
        ),
    )
}

/// Bonus only when temperature and humidity are both in range
fn climate_tree(env: &CropEnvelope) -> Shape {
    let t = env.ranges[Feature::Temperature.index()];
    let h = env.ranges[Feature::Humidity.index()];
    let temp = |lo, hi| mass(Feature::Temperature, lo, hi);
    let hum = |lo, hi| mass(Feature::Humidity, lo, hi);
    let t_in = temp(Some(t.low), Some(t.high));

    let humidity_node = Shape::split(
        Feature::Humidity,
        h.low,
        Shape::leaf(CLIMATE_PENALTY, t_in * hum(None, Some(h.low))),
        Shape::split(
            Feature::Humidity,
            h.high,
            Shape::leaf(CLIMATE_BONUS, t_in * hum(Some(h.low), Some(h.high))),
            Shape::leaf(CLIMATE_PENALTY, t_in * hum(Some(h.high), None)),
        ),
    );

    Shape::split(
        Feature::Temperature,
        t.low,
        Shape::leaf(CLIMATE_PENALTY, temp(None, Some(t.low))),
        Shape::split(
            Feature::Temperature,
            t.high,
            humidity_node,
            Shape::leaf(CLIMATE_PENALTY, temp(Some(t.high), None)),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_bundle_validates() {
        let bundle = reference_bundle().unwrap();
        assert_eq!(bundle.name, REFERENCE_MODEL_NAME);
        assert_eq!(bundle.ensemble.trees.len(), CROP_COUNT * 11);
        assert!(bundle.validate().is_ok());
    }

    #[test]
    fn test_window_tree_shape() {
        let tree = window_tree(Feature::Ph, Range::new(5.0, 7.9), 1.0, 0.9).into_tree();
        assert_eq!(tree.nodes.len(), 9);
        assert_eq!(tree.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count(), 5);
        assert!(tree.validate(FEATURE_COUNT).is_ok());

        let at = |ph: f64| {
            let mut x = [0.0; FEATURE_COUNT];
            x[Feature::Ph.index()] = z_score(Feature::Ph, ph);
            tree.predict(&x)
        };
        assert_eq!(at(6.5), 0.9);
        assert_eq!(at(4.5), -0.45);
        assert_eq!(at(3.8), -1.8);
        assert_eq!(at(8.5), -0.45);
        assert_eq!(at(9.6), -1.8);
    }

    #[test]
    fn test_covers_sum_to_training_rows() {
        let tree = range_tree(Feature::NpkSum, Range::new(130.0, 204.0), 0.4, -0.4).into_tree();
        let root = tree.nodes[0].cover();
        assert!((root - TRAINING_ROWS).abs() < 5.0, "root cover {}", root);
    }

    #[test]
    fn test_mass_is_a_probability() {
        assert_eq!(mass(Feature::Ph, None, None), 1.0);
        assert_eq!(mass(Feature::Ph, Some(8.0), Some(7.0)), 0.0);
        let middle = mass(Feature::Ph, Some(6.0), Some(7.0));
        assert!(middle > 0.0 && middle < 1.0);
    }

    #[test]
    fn test_expected_margin_is_finite() {
        let ensemble = reference_ensemble();
        for crop in Crop::ALL {
            assert!(ensemble.expected_margin(crop.index()).is_finite());
        }
    }
}
