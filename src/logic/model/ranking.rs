//! Confidence & Ranking
//!
//! Turns the classifier's probability distribution into an ordered crop
//! ranking and picks the confidence reported to the caller.
//!
//! Ordering is total and deterministic: descending probability, equal
//! probabilities broken by lexicographic crop label.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::crop::{Crop, CROP_COUNT};
use super::threshold::ConfidenceLevel;
use crate::logic::error::{EngineError, EngineResult, Stage};

/// Allowed drift of the distribution sum away from 1
pub const SIMPLEX_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropProbability {
    pub crop: Crop,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// No crop requested: report the arg-max
    OpenRecommendation,
    /// Caller asked about one specific crop
    TargetedEvaluation,
}

/// The crop being reported on and its confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub crop: Crop,
    pub mode: EvaluationMode,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
}

/// Check that `proba` is a distribution over the full crop catalog
pub fn validate_distribution(proba: &[f64]) -> EngineResult<()> {
    if proba.len() != CROP_COUNT {
        return Err(EngineError::invariant(
            Stage::Ranking,
            format!("distribution has {} entries, catalog has {}", proba.len(), CROP_COUNT),
        ));
    }

    if let Some((i, p)) = proba
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p < 0.0 || **p > 1.0)
    {
        return Err(EngineError::invariant(
            Stage::Ranking,
            format!("probability {} for `{}` is outside [0, 1]", p, Crop::ALL[i]),
        ));
    }

    let total: f64 = proba.iter().sum();
    if (total - 1.0).abs() > SIMPLEX_TOLERANCE {
        return Err(EngineError::invariant(
            Stage::Ranking,
            format!("distribution sums to {}, not 1", total),
        ));
    }

    Ok(())
}

fn rank_order(a: &CropProbability, b: &CropProbability) -> Ordering {
    b.probability
        .total_cmp(&a.probability)
        .then_with(|| a.crop.label().cmp(b.crop.label()))
}

// ============================================================================
// RANKING
// ============================================================================

/// Every crop, best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ranking {
    entries: Vec<CropProbability>,
}

impl Ranking {
    pub fn from_distribution(proba: &[f64]) -> EngineResult<Self> {
        validate_distribution(proba)?;

        let mut entries: Vec<CropProbability> = Crop::ALL
            .iter()
            .zip(proba)
            .map(|(crop, p)| CropProbability {
                crop: *crop,
                probability: *p,
            })
            .collect();
        entries.sort_by(rank_order);

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CropProbability] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Arg-max crop
    pub fn best(&self) -> Option<&CropProbability> {
        self.entries.first()
    }

    pub fn probability_of(&self, crop: Crop) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.crop == crop)
            .map(|e| e.probability)
    }

    pub fn top(&self, k: usize) -> &[CropProbability] {
        &self.entries[..k.min(self.entries.len())]
    }

    /// Ranking without `crop`, order preserved
    pub fn alternatives(&self, crop: Crop) -> impl Iterator<Item = &CropProbability> + '_ {
        self.entries.iter().filter(move |e| e.crop != crop)
    }

    /// Resolve which crop is reported and how confident the model is in it
    pub fn decide(&self, target: Option<Crop>) -> EngineResult<Decision> {
        let (crop, mode, confidence) = match target {
            Some(crop) => {
                let confidence = self.probability_of(crop).ok_or_else(|| {
                    let reason = format!("`{}` missing from ranking", crop);
                    EngineError::invariant(Stage::Ranking, reason)
                })?;
                (crop, EvaluationMode::TargetedEvaluation, confidence)
            }
            None => {
                let best = self
                    .best()
                    .ok_or_else(|| EngineError::invariant(Stage::Ranking, "empty ranking"))?;
                (best.crop, EvaluationMode::OpenRecommendation, best.probability)
            }
        };

        Ok(Decision {
            crop,
            mode,
            confidence,
            confidence_level: ConfidenceLevel::from_confidence(confidence),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peaked(crop: Crop, mass: f64) -> Vec<f64> {
        let rest = (1.0 - mass) / (CROP_COUNT - 1) as f64;
        Crop::ALL
            .iter()
            .map(|c| if *c == crop { mass } else { rest })
            .collect()
    }

    #[test]
    fn test_open_recommendation_takes_argmax() {
        let ranking = Ranking::from_distribution(&peaked(Crop::Maize, 0.7)).unwrap();
        let decision = ranking.decide(None).unwrap();
        assert_eq!(decision.crop, Crop::Maize);
        assert_eq!(decision.mode, EvaluationMode::OpenRecommendation);
        assert_eq!(decision.confidence, 0.7);
        assert_eq!(decision.confidence_level, ConfidenceLevel::High);
    }

    #[test]
    fn test_targeted_uses_requested_mass() {
        let ranking = Ranking::from_distribution(&peaked(Crop::Maize, 0.79)).unwrap();
        let decision = ranking.decide(Some(Crop::Rice)).unwrap();
        assert_eq!(decision.crop, Crop::Rice);
        assert_eq!(decision.mode, EvaluationMode::TargetedEvaluation);
        assert!((decision.confidence - 0.01).abs() < 1e-12);
        assert_eq!(decision.confidence_level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_ties_break_lexicographically() {
        let uniform = vec![1.0 / CROP_COUNT as f64; CROP_COUNT];
        let ranking = Ranking::from_distribution(&uniform).unwrap();
        let labels: Vec<&str> = ranking.entries().iter().map(|e| e.crop.label()).collect();
        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(labels, sorted);
        assert_eq!(ranking.best().map(|e| e.crop), Some(Crop::Apple));
    }

    #[test]
    fn test_alternatives_exclude_target() {
        let ranking = Ranking::from_distribution(&peaked(Crop::Jute, 0.5)).unwrap();
        let alternatives: Vec<_> = ranking.alternatives(Crop::Jute).collect();
        assert_eq!(alternatives.len(), CROP_COUNT - 1);
        assert!(alternatives.iter().all(|e| e.crop != Crop::Jute));
        assert_eq!(ranking.best().map(|e| e.crop), Some(Crop::Jute));
        assert_eq!(ranking.top(3).len(), 3);
        assert_eq!(ranking.top(100).len(), CROP_COUNT);
    }

    #[test]
    fn test_broken_distributions_rejected() {
        let mut proba = peaked(Crop::Rice, 0.5);
        proba[0] += 0.01;
        let err = Ranking::from_distribution(&proba).unwrap_err();
        assert!(matches!(err, EngineError::InternalInvariant { stage: Stage::Ranking, .. }));

        assert!(Ranking::from_distribution(&[1.0]).is_err());

        let mut negative = peaked(Crop::Rice, 0.5);
        negative[1] = -0.0001;
        negative[2] += 0.0001;
        assert!(Ranking::from_distribution(&negative).is_err());
    }
}
