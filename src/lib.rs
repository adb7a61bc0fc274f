//! Crop Suitability - Inference & Explainability Core
//!
//! Scores a soil/climate observation against the crop catalog with a
//! pre-trained tree ensemble and explains weak predictions with TreeSHAP.

pub mod constants;
pub mod logic;

pub use logic::config::EngineConfig;
pub use logic::engine::{Engine, EngineHandle, EngineStatus, ModelSource};
pub use logic::error::{EngineError, EngineResult, Stage};
pub use logic::features::RawObservation;
pub use logic::model::{Crop, ModelBundle};
pub use logic::result::SuitabilityResult;
