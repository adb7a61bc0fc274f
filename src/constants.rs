//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Every tunable can be overridden from the environment; unparsable
//! values are logged and fall back to the default.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Default confidence below which an explanation is attached
pub const DEFAULT_EXPLAIN_THRESHOLD: f64 = 0.5;

/// Default number of limiting factors in an explanation
pub const DEFAULT_TOP_K: usize = 5;

/// Default additivity tolerance for attributions
pub const DEFAULT_ADDITIVITY_TOLERANCE: f64 = 1e-3;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "cropfit";

pub const ENV_MODEL_PATH: &str = "CROPFIT_MODEL_PATH";
pub const ENV_EXPLAIN_THRESHOLD: &str = "CROPFIT_EXPLAIN_THRESHOLD";
pub const ENV_TOP_K: &str = "CROPFIT_TOP_K";
pub const ENV_ADDITIVITY_TOLERANCE: &str = "CROPFIT_ADDITIVITY_TOLERANCE";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Model bundle path, if configured
pub fn get_model_path() -> Option<PathBuf> {
    std::env::var(ENV_MODEL_PATH)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// Get explain threshold from environment or use default
pub fn get_explain_threshold() -> f64 {
    env_or_default(ENV_EXPLAIN_THRESHOLD, DEFAULT_EXPLAIN_THRESHOLD)
}

/// Get limiting factor count from environment or use default
pub fn get_top_k() -> usize {
    env_or_default(ENV_TOP_K, DEFAULT_TOP_K)
}

/// Get additivity tolerance from environment or use default
pub fn get_additivity_tolerance() -> f64 {
    env_or_default(ENV_ADDITIVITY_TOLERANCE, DEFAULT_ADDITIVITY_TOLERANCE)
}

fn env_or_default<T: FromStr + Display>(name: &str, default: T) -> T {
    parse_override(name, std::env::var(name).ok().as_deref(), default)
}

/// Parse an override; a set but unparsable value is logged and ignored
fn parse_override<T: FromStr + Display>(name: &str, raw: Option<&str>, default: T) -> T {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a valid value, using {}", name, raw, default);
            default
        }
    }
}
