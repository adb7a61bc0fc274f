//! Model Module - Crop Classification
//!
//! Everything after feature engineering and before attribution:
//! normalization, the tree ensemble behind the classifier seam, ranking,
//! and the bundle that ships all fitted parameters together.
//!
//! ## Architecture
//! - `crop.rs` - Label catalog (class index = enum discriminant)
//! - `normalizer.rs` - Z-score replay
//! - `classifier.rs` - `SuitabilityClassifier` trait
//! - `ensemble.rs` - Additive boosted trees + softmax
//! - `ranking.rs` / `threshold.rs` - Confidence, ranking, explain trigger
//! - `bundle.rs` - Serialized artifact with checksum + layout checks
//! - `envelope.rs` / `reference.rs` - Reference deployment

pub mod bundle;
pub mod classifier;
pub mod crop;
pub mod ensemble;
pub mod envelope;
pub mod normalizer;
pub mod ranking;
pub mod reference;
pub mod threshold;


// Re-export common types
pub use bundle::{ModelBundle, ModelInfo, BUNDLE_FORMAT_VERSION};
pub use classifier::SuitabilityClassifier;
pub use crop::{Crop, CROP_COUNT};
pub use ensemble::{softmax, ClassTree, Node, Tree, TreeEnsemble};
pub use envelope::{envelope, CropEnvelope, Range};
pub use normalizer::{FeatureStat, NormalizationParameters};
pub use ranking::{CropProbability, Decision, EvaluationMode, Ranking};
pub use reference::{reference_bundle, REFERENCE_MODEL_NAME};
pub use threshold::{ConfidenceLevel, ExplainThreshold};
