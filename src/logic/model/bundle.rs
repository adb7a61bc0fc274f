//! Model Bundle - Serialized Inference Artifact
//!
//! **One file carries everything the pipeline replays**: damping bounds,
//! normalization statistics, the label catalog, the feature layout and
//! the tree ensemble. They are fit together and must load together.
//!
//! ## Integrity
//! - Layout version + hash and column names must match the compiled layout
//! - Labels must match [`Crop::ALL`] in order
//! - If `<bundle>.sha256` exists, the file's SHA-256 must match it
//!
//! Any mismatch is a `Configuration` error at stage `artifact`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::classifier::SuitabilityClassifier;
use super::crop::{Crop, CROP_COUNT};
use super::ensemble::TreeEnsemble;
use super::normalizer::NormalizationParameters;
use crate::logic::error::{EngineError, EngineResult, Stage};
use crate::logic::features::{
    feature_names, layout_hash, validate_feature_names, validate_layout, DampingParameters,
    FEATURE_COUNT, FEATURE_VERSION,
};

/// Bundle file format version
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

// ============================================================================
// BUNDLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub name: String,
    pub feature_version: u8,
    pub layout_hash: u32,
    pub feature_names: Vec<String>,
    pub labels: Vec<String>,
    pub damping: DampingParameters,
    pub normalization: NormalizationParameters,
    pub ensemble: TreeEnsemble,
}

/// Summary for status endpoints and the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub format_version: u32,
    pub feature_version: u8,
    pub layout_hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
    pub labels: Vec<String>,
    pub tree_count: usize,
    pub explainable: bool,
}

impl ModelInfo {
    /// Describe a classifier running against the compiled layout and catalog
    pub fn describe(name: impl Into<String>, classifier: &dyn SuitabilityClassifier) -> Self {
        let ensemble = classifier.tree_ensemble();
        Self {
            name: name.into(),
            format_version: BUNDLE_FORMAT_VERSION,
            feature_version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            feature_count: classifier.input_width(),
            feature_names: feature_names(),
            labels: Crop::labels(),
            tree_count: ensemble.map_or(0, |e| e.trees.len()),
            explainable: ensemble.is_some(),
        }
    }
}

impl ModelBundle {
    /// Assemble a bundle stamped with the current layout
    pub fn new(
        name: impl Into<String>,
        damping: DampingParameters,
        normalization: NormalizationParameters,
        ensemble: TreeEnsemble,
    ) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            name: name.into(),
            feature_version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            feature_names: feature_names(),
            labels: Crop::labels(),
            damping,
            normalization,
            ensemble,
        }
    }

    /// Startup self-check against the compiled schema
    pub fn validate(&self) -> EngineResult<()> {
        if self.format_version != BUNDLE_FORMAT_VERSION {
            return Err(artifact_error(format!(
                "unsupported bundle format v{} (expected v{})",
                self.format_version, BUNDLE_FORMAT_VERSION
            )));
        }

        validate_layout(self.feature_version, self.layout_hash)?;
        validate_feature_names(&self.feature_names)?;

        if self.labels != Crop::labels() {
            return Err(artifact_error(format!(
                "label catalog mismatch: bundle lists {} labels, first divergence at {:?}",
                self.labels.len(),
                self.labels
                    .iter()
                    .zip(Crop::ALL)
                    .position(|(label, crop)| label != crop.label())
            )));
        }

        self.damping.validate()?;
        self.normalization.validate()?;

        if self.ensemble.feature_count != FEATURE_COUNT {
            return Err(artifact_error(format!(
                "ensemble expects {} inputs, layout has {}",
                self.ensemble.feature_count, FEATURE_COUNT
            )));
        }
        if self.ensemble.class_count != CROP_COUNT {
            return Err(artifact_error(format!(
                "ensemble has {} classes, catalog has {}",
                self.ensemble.class_count, CROP_COUNT
            )));
        }
        self.ensemble.validate()?;

        Ok(())
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            format_version: self.format_version,
            feature_version: self.feature_version,
            layout_hash: self.layout_hash,
            feature_names: self.feature_names.clone(),
            labels: self.labels.clone(),
            ..ModelInfo::describe(self.name.as_str(), &self.ensemble)
        }
    }

    // ========================================================================
    // STORAGE
    // ========================================================================

    /// Load, verify checksum sidecar (if any) and validate
    pub fn load(path: &Path) -> EngineResult<Self> {
        log::info!("Loading model bundle from: {}", path.display());

        let data = fs::read(path)
            .map_err(|e| artifact_error(format!("cannot read {}: {}", path.display(), e)))?;

        let sidecar = checksum_path(path);
        if sidecar.exists() {
            verify_checksum(&data, &sidecar)?;
        } else {
            log::debug!("No checksum sidecar at {}", sidecar.display());
        }

        let bundle: ModelBundle = serde_json::from_slice(&data)
            .map_err(|e| artifact_error(format!("malformed bundle {}: {}", path.display(), e)))?;
        bundle.validate()?;

        log::info!(
            "Model bundle '{}' loaded ({} trees, layout {:08x})",
            bundle.name,
            bundle.ensemble.trees.len(),
            bundle.layout_hash
        );
        Ok(bundle)
    }

    /// Write the bundle as pretty JSON plus its `.sha256` sidecar
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    artifact_error(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| artifact_error(format!("cannot serialize bundle: {}", e)))?;
        fs::write(path, &json)
            .map_err(|e| artifact_error(format!("cannot write {}: {}", path.display(), e)))?;

        let sidecar = checksum_path(path);
        fs::write(&sidecar, format!("{}\n", sha256_hex(&json)))
            .map_err(|e| artifact_error(format!("cannot write {}: {}", sidecar.display(), e)))?;

        log::info!("Model bundle '{}' saved to {}", self.name, path.display());
        Ok(())
    }
}

fn artifact_error(reason: impl Into<String>) -> EngineError {
    EngineError::configuration(Stage::Artifact, reason)
}

// ============================================================================
// CHECKSUM
// ============================================================================

/// `model.json` → `model.json.sha256`
pub fn checksum_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".sha256");
    path.with_file_name(name)
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Accepts `<hex>`, `sha256:<hex>` or `<hex>  <filename>` (sha256sum output)
fn parse_digest(raw: &str) -> Option<String> {
    let token = raw.split_whitespace().next()?;
    let token = token.strip_prefix("sha256:").unwrap_or(token).to_ascii_lowercase();
    if token.len() == 64 && token.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(token)
    } else {
        None
    }
}

fn verify_checksum(data: &[u8], sidecar: &Path) -> EngineResult<()> {
    let raw = fs::read_to_string(sidecar)
        .map_err(|e| artifact_error(format!("cannot read {}: {}", sidecar.display(), e)))?;
    let expected = parse_digest(&raw).ok_or_else(|| {
        artifact_error(format!("{} does not hold a SHA-256 digest", sidecar.display()))
    })?;

    let actual = sha256_hex(data);
    if actual != expected {
        return Err(artifact_error(format!(
            "checksum mismatch: expected {} got {}",
            expected, actual
        )));
    }
    Ok(())
}
