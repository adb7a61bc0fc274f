//! Engine Configuration
//!
//! Runtime tunables of the pipeline. Immutable once an engine is built;
//! changing them means building a new engine.

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::error::{EngineError, EngineResult, Stage};
use crate::logic::explain::ExplainOptions;
use crate::logic::model::ExplainThreshold;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Explanations are attached when confidence is strictly below this
    pub explain_threshold: f64,
    /// How many limiting factors an explanation reports
    pub limiting_factor_count: usize,
    /// Max |Σφ − (margin − baseline)| before attribution is rejected
    pub additivity_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            explain_threshold: constants::DEFAULT_EXPLAIN_THRESHOLD,
            limiting_factor_count: constants::DEFAULT_TOP_K,
            additivity_tolerance: constants::DEFAULT_ADDITIVITY_TOLERANCE,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `CROPFIT_*` environment variables
    pub fn from_env() -> EngineResult<Self> {
        let config = Self {
            explain_threshold: constants::get_explain_threshold(),
            limiting_factor_count: constants::get_top_k(),
            additivity_tolerance: constants::get_additivity_tolerance(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_explain_threshold(mut self, threshold: f64) -> Self {
        self.explain_threshold = threshold;
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !self.threshold().is_valid() {
            return Err(EngineError::configuration(
                Stage::Configuration,
                format!("explain threshold {} is outside [0, 1]", self.explain_threshold),
            ));
        }
        if self.limiting_factor_count == 0 {
            return Err(EngineError::configuration(
                Stage::Configuration,
                "limiting factor count must be at least 1",
            ));
        }
        if !self.additivity_tolerance.is_finite() || self.additivity_tolerance <= 0.0 {
            return Err(EngineError::configuration(
                Stage::Configuration,
                format!("additivity tolerance {} must be positive", self.additivity_tolerance),
            ));
        }
        Ok(())
    }

    pub fn threshold(&self) -> ExplainThreshold {
        ExplainThreshold::new(self.explain_threshold)
    }

    pub fn explain_options(&self) -> ExplainOptions {
        ExplainOptions {
            limiting_factor_count: self.limiting_factor_count,
            additivity_tolerance: self.additivity_tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.explain_threshold, 0.5);
        assert_eq!(config.limiting_factor_count, 5);
        assert_eq!(config.additivity_tolerance, 1e-3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = EngineConfig::default().with_explain_threshold(1.5);
        assert!(config.validate().unwrap_err().is_configuration());

        let config = EngineConfig {
            limiting_factor_count: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            additivity_tolerance: 0.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"explain_threshold": 0.3}"#).unwrap();
        assert_eq!(config.explain_threshold, 0.3);
        assert_eq!(config.limiting_factor_count, 5);
    }
}
