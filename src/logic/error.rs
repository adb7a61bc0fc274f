//! Engine Errors
//!
//! Every failure leaving the engine is one of four typed kinds and carries
//! the pipeline stage that raised it. Nothing is swallowed and no partial
//! result is ever returned next to an error.

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// PIPELINE STAGE
// ============================================================================

/// Pipeline stage that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    Damping,
    FeatureEngineering,
    Normalization,
    Classification,
    Ranking,
    Explanation,
    Artifact,
    Configuration,
    /// Rendering a result or report for the caller
    Output,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validation => "validation",
            Stage::Damping => "damping",
            Stage::FeatureEngineering => "feature_engineering",
            Stage::Normalization => "normalization",
            Stage::Classification => "classification",
            Stage::Ranking => "ranking",
            Stage::Explanation => "explanation",
            Stage::Artifact => "artifact",
            Stage::Configuration => "configuration",
            Stage::Output => "output",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ERROR TAXONOMY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Caller supplied missing, non-finite or physically impossible input.
    #[error("validation failed at {stage} for `{feature}`: {reason}")]
    Validation {
        stage: Stage,
        feature: &'static str,
        reason: String,
    },

    /// Damping/normalization parameters or model artifact are malformed.
    #[error("configuration error at {stage}: {reason}")]
    Configuration { stage: Stage, reason: String },

    /// Attribution requested on a model that exposes no tree structure.
    #[error("unsupported model: {reason}")]
    UnsupportedModel { reason: String },

    /// Packaging/versioning mismatch between artifact and pipeline code.
    #[error("internal invariant violated at {stage}: {reason}")]
    InternalInvariant { stage: Stage, reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn validation(stage: Stage, feature: &'static str, reason: impl Into<String>) -> Self {
        EngineError::Validation {
            stage,
            feature,
            reason: reason.into(),
        }
    }

    pub fn configuration(stage: Stage, reason: impl Into<String>) -> Self {
        EngineError::Configuration {
            stage,
            reason: reason.into(),
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        EngineError::UnsupportedModel {
            reason: reason.into(),
        }
    }

    pub fn invariant(stage: Stage, reason: impl Into<String>) -> Self {
        EngineError::InternalInvariant {
            stage,
            reason: reason.into(),
        }
    }

    /// Short machine-readable kind, used in logs and JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation { .. } => "validation_error",
            EngineError::Configuration { .. } => "configuration_error",
            EngineError::UnsupportedModel { .. } => "unsupported_model_error",
            EngineError::InternalInvariant { .. } => "internal_invariant_error",
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            EngineError::Validation { stage, .. }
            | EngineError::Configuration { stage, .. }
            | EngineError::InternalInvariant { stage, .. } => *stage,
            EngineError::UnsupportedModel { .. } => Stage::Explanation,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, EngineError::Configuration { .. })
    }

    /// JSON shape surfaced to collaborators
    pub fn to_report(&self) -> serde_json::Value {
        let feature = match self {
            EngineError::Validation { feature, .. } => Some(*feature),
            _ => None,
        };
        serde_json::json!({
            "error": self.kind(),
            "stage": self.stage(),
            "feature": feature,
            "message": self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_and_stage() {
        let err = EngineError::validation(Stage::Validation, "rainfall", "negative");
        assert_eq!(err.kind(), "validation_error");
        assert_eq!(err.stage(), Stage::Validation);
        assert!(err.is_validation());
        assert!(err.to_string().contains("rainfall"));

        let err = EngineError::unsupported("no trees");
        assert_eq!(err.stage(), Stage::Explanation);
    }

    #[test]
    fn test_error_report_shape() {
        let err = EngineError::configuration(Stage::Normalization, "zero variance for `ph`");
        let report = err.to_report();
        assert_eq!(report["error"], "configuration_error");
        assert_eq!(report["stage"], "normalization");
        assert!(report["feature"].is_null());
    }

    #[test]
    fn test_output_stage_label() {
        let err = EngineError::invariant(Stage::Output, "cannot serialize result");
        assert_eq!(err.to_report()["stage"], "output");
        assert!(err.to_string().starts_with("internal invariant violated at output"));
    }
}
