//! Suitability Engine
//!
//! Wires the pipeline stages together behind one entry point.
//!
//! ## Architecture
//! ```text
//! RawObservation ─► validate ─► dampen ─► engineer ─► normalize
//!                                                        │
//!      SuitabilityResult ◄─ explain? ◄─ decide ◄─ rank ◄─ classify
//! ```
//!
//! `Engine` is immutable once built: damping, normalization, classifier and
//! config are checked together at construction and never change after.
//! `EngineHandle` owns the live engine and swaps in a new one on reload.
//!
//! CRITICAL: a reload builds and validates the replacement completely before
//! the swap. A rejected artifact leaves the running engine in place.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::logic::advisory::{condition_warnings, factor_hints};
use crate::logic::config::EngineConfig;
use crate::logic::error::{EngineError, EngineResult, Stage};
use crate::logic::explain::explain_classifier;
use crate::logic::features::{engineer, DampingParameters, RawObservation, FEATURE_COUNT};
use crate::logic::model::{
    reference_bundle, Crop, ModelBundle, ModelInfo, NormalizationParameters, Ranking,
    SuitabilityClassifier, CROP_COUNT,
};
use crate::logic::result::SuitabilityResult;

// ============================================================================
// ENGINE
// ============================================================================

pub struct Engine {
    info: ModelInfo,
    damping: DampingParameters,
    normalization: NormalizationParameters,
    classifier: Box<dyn SuitabilityClassifier>,
    config: EngineConfig,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("model", &self.info.name)
            .field("classifier", &self.classifier.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine over a bundle's own tree ensemble
    pub fn from_bundle(bundle: ModelBundle, config: EngineConfig) -> EngineResult<Self> {
        bundle.validate()?;
        let info = bundle.model_info();
        let ModelBundle {
            damping,
            normalization,
            ensemble,
            ..
        } = bundle;
        Self::build(info, damping, normalization, Box::new(ensemble), config)
    }

    /// Engine over the in-process reference bundle
    pub fn reference(config: EngineConfig) -> EngineResult<Self> {
        Self::from_bundle(reference_bundle()?, config)
    }

    /// Engine over any classifier. Parameters are checked before the
    /// classifier is ever called.
    pub fn with_classifier(
        model_name: impl Into<String>,
        damping: DampingParameters,
        normalization: NormalizationParameters,
        classifier: Box<dyn SuitabilityClassifier>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let info = ModelInfo::describe(model_name, classifier.as_ref());
        Self::build(info, damping, normalization, classifier, config)
    }

    fn build(
        info: ModelInfo,
        damping: DampingParameters,
        normalization: NormalizationParameters,
        classifier: Box<dyn SuitabilityClassifier>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        damping.validate()?;
        normalization.validate()?;

        if classifier.input_width() != FEATURE_COUNT {
            return Err(EngineError::configuration(
                Stage::Classification,
                format!(
                    "classifier `{}` expects {} inputs, layout has {}",
                    classifier.name(),
                    classifier.input_width(),
                    FEATURE_COUNT
                ),
            ));
        }
        if classifier.class_count() != CROP_COUNT {
            return Err(EngineError::configuration(
                Stage::Classification,
                format!(
                    "classifier `{}` produces {} classes, catalog has {}",
                    classifier.name(),
                    classifier.class_count(),
                    CROP_COUNT
                ),
            ));
        }

        let engine = Self {
            info,
            damping,
            normalization,
            classifier,
            config,
        };

        log::info!(
            "Engine ready: model '{}' ({}), explain below {:.2}, top {} factors",
            engine.info.name,
            engine.classifier.name(),
            engine.config.explain_threshold,
            engine.config.limiting_factor_count
        );
        Ok(engine)
    }

    pub fn model_name(&self) -> &str {
        &self.info.name
    }

    /// Catalog, layout and attribution support of the loaded model
    pub fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_explainable(&self) -> bool {
        self.info.explainable
    }

    /// Score one observation, optionally for a requested crop
    pub fn evaluate(
        &self,
        raw: &RawObservation,
        target: Option<Crop>,
    ) -> EngineResult<SuitabilityResult> {
        let started = Instant::now();

        raw.validate()?;

        let damped = self.damping.dampen(raw)?;
        if !damped.clamped().is_empty() {
            log::debug!(
                "Clamped {} input(s) to training range: {:?}",
                damped.clamped().len(),
                damped.clamped()
            );
        }

        let engineered = engineer(&damped)?;
        let input = self.normalization.normalize(&engineered)?;

        let proba = self.classifier.predict_proba(&input)?;
        let ranking = Ranking::from_distribution(&proba)?;
        let decision = ranking.decide(target)?;

        let explanation = if self.config.threshold().should_explain(decision.confidence) {
            Some(explain_classifier(
                self.classifier.as_ref(),
                &engineered,
                &input,
                decision.crop,
                self.config.explain_options(),
            )?)
        } else {
            None
        };

        let hints = explanation.as_ref().map(factor_hints).unwrap_or_default();
        let warnings = condition_warnings(raw, decision.confidence);

        log::debug!(
            "Evaluated {} ({:?}) confidence {:.4}, explained: {}, took {:?}",
            decision.crop,
            decision.mode,
            decision.confidence,
            explanation.is_some(),
            started.elapsed()
        );

        Ok(SuitabilityResult {
            crop: decision.crop,
            mode: decision.mode,
            confidence: decision.confidence,
            confidence_level: decision.confidence_level,
            ranking,
            explanation,
            factor_hints: hints,
            clamped_features: damped.clamped().to_vec(),
            warnings,
            layout_hash: engineered.layout_hash,
        })
    }
}

// ============================================================================
// ENGINE HANDLE
// ============================================================================

/// Where the live engine's model came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSource {
    Reference,
    File { path: PathBuf },
    InMemory,
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Reference => f.write_str("reference"),
            ModelSource::File { path } => write!(f, "{}", path.display()),
            ModelSource::InMemory => f.write_str("in-memory"),
        }
    }
}

/// Engine Status for status endpoints and the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub model: ModelInfo,
    pub model_source: ModelSource,
    pub loaded_at: DateTime<Utc>,
    pub evaluation_count: u64,
    pub failure_count: u64,
    pub reload_count: u64,
    pub rejected_reload_count: u64,
    pub avg_latency_ms: f64,
}

struct LiveEngine {
    engine: Arc<Engine>,
    source: ModelSource,
    loaded_at: DateTime<Utc>,
}

/// Shared owner of the live engine
pub struct EngineHandle {
    live: RwLock<LiveEngine>,
    evaluations: AtomicU64,
    failures: AtomicU64,
    latency_sum_us: AtomicU64,
    reloads: AtomicU64,
    rejected_reloads: AtomicU64,
}

impl EngineHandle {
    pub fn new(engine: Engine, source: ModelSource) -> Self {
        Self {
            live: RwLock::new(LiveEngine {
                engine: Arc::new(engine),
                source,
                loaded_at: Utc::now(),
            }),
            evaluations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            reloads: AtomicU64::new(0),
            rejected_reloads: AtomicU64::new(0),
        }
    }

    pub fn from_path(path: &Path, config: EngineConfig) -> EngineResult<Self> {
        let engine = Engine::from_bundle(ModelBundle::load(path)?, config)?;
        Ok(Self::new(
            engine,
            ModelSource::File {
                path: path.to_path_buf(),
            },
        ))
    }

    pub fn reference(config: EngineConfig) -> EngineResult<Self> {
        Ok(Self::new(Engine::reference(config)?, ModelSource::Reference))
    }

    /// Snapshot of the live engine; the lock is released on return
    pub fn current(&self) -> Arc<Engine> {
        self.live.read().engine.clone()
    }

    pub fn evaluate(
        &self,
        raw: &RawObservation,
        target: Option<Crop>,
    ) -> EngineResult<SuitabilityResult> {
        let engine = self.current();
        let started = Instant::now();

        let result = engine.evaluate(raw, target);

        let elapsed_us = started.elapsed().as_micros() as u64;
        self.latency_sum_us.fetch_add(elapsed_us, Ordering::Relaxed);
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }

        result
    }

    /// Load a bundle from disk and swap it in; the live engine survives any failure
    pub fn reload_from_path(&self, path: &Path) -> EngineResult<()> {
        let source = ModelSource::File {
            path: path.to_path_buf(),
        };
        let candidate = ModelBundle::load(path);
        self.install(candidate, source)
    }

    /// Swap in an already-deserialized bundle
    pub fn reload_bundle(&self, bundle: ModelBundle) -> EngineResult<()> {
        self.install(Ok(bundle), ModelSource::InMemory)
    }

    fn install(
        &self,
        candidate: EngineResult<ModelBundle>,
        source: ModelSource,
    ) -> EngineResult<()> {
        let config = *self.current().config();
        let built = candidate.and_then(|bundle| Engine::from_bundle(bundle, config));

        match built {
            Ok(engine) => {
                let name = engine.model_name().to_string();
                {
                    let mut live = self.live.write();
                    live.engine = Arc::new(engine);
                    live.source = source.clone();
                    live.loaded_at = Utc::now();
                }
                self.reloads.fetch_add(1, Ordering::Relaxed);
                log::info!("Model '{}' reloaded from {}", name, source);
                Ok(())
            }
            Err(e) => {
                self.rejected_reloads.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Rejected model from {} ({}); keeping '{}'",
                    source,
                    e,
                    self.current().model_name()
                );
                Err(e)
            }
        }
    }

    pub fn status(&self) -> EngineStatus {
        let (engine, source, loaded_at) = {
            let live = self.live.read();
            (live.engine.clone(), live.source.clone(), live.loaded_at)
        };

        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.evaluations.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f64 / count as f64) / 1000.0 } else { 0.0 };

        EngineStatus {
            model: engine.model_info().clone(),
            model_source: source,
            loaded_at,
            evaluation_count: count,
            failure_count: self.failures.load(Ordering::Relaxed),
            reload_count: self.reloads.load(Ordering::Relaxed),
            rejected_reload_count: self.rejected_reloads.load(Ordering::Relaxed),
            avg_latency_ms: avg,
        }
    }
}
