//! Advisory - Condition Warnings & Factor Hints
//!
//! Structured facts for the downstream advice layer. Nothing here affects
//! the prediction itself.
//!
//! - Warnings look at the raw (undampened) observation, so a reading the
//!   dampener capped is still reported at its true value.
//! - Factor hints compare each limiting factor with the target crop's
//!   growing envelope.

use serde::{Deserialize, Serialize};

use crate::logic::explain::AttributionReport;
use crate::logic::features::{FactorCategory, Feature, RawObservation};
use crate::logic::model::{envelope, Crop, Range};

// ============================================================================
// CONDITION WARNINGS
// ============================================================================

pub const CRITICAL_ACIDITY_PH: f64 = 4.5;
pub const CRITICAL_ALKALINITY_PH: f64 = 9.0;
pub const HEAT_STRESS_TEMPERATURE: f64 = 40.0;
pub const COLD_STRESS_TEMPERATURE: f64 = 10.0;
pub const NITROGEN_DEFICIENCY: f64 = 10.0;
pub const EXCESS_RAINFALL: f64 = 300.0;
/// Predictions this unsure get an extra caution
pub const LOW_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    CriticalAcidity,
    CriticalAlkalinity,
    HeatStress,
    ColdStress,
    NitrogenDeficiency,
    ExcessRainfall,
    LowConfidence,
}

impl WarningKind {
    pub fn severity(&self) -> Severity {
        match self {
            WarningKind::ExcessRainfall | WarningKind::LowConfidence => Severity::Warning,
            _ => Severity::Critical,
        }
    }

    pub fn feature(&self) -> Option<Feature> {
        match self {
            WarningKind::CriticalAcidity | WarningKind::CriticalAlkalinity => Some(Feature::Ph),
            WarningKind::HeatStress | WarningKind::ColdStress => Some(Feature::Temperature),
            WarningKind::NitrogenDeficiency => Some(Feature::Nitrogen),
            WarningKind::ExcessRainfall => Some(Feature::Rainfall),
            WarningKind::LowConfidence => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            WarningKind::CriticalAcidity => {
                "Soil is too acidic; aluminium and manganese toxicity likely"
            }
            WarningKind::CriticalAlkalinity => "Soil is too alkaline; most nutrients are locked up",
            WarningKind::HeatStress => "Temperature is high enough to cause heat stress",
            WarningKind::ColdStress => "Temperature is low enough to stall growth",
            WarningKind::NitrogenDeficiency => "Severe nitrogen deficiency; expect yellowing",
            WarningKind::ExcessRainfall => "Excess rainfall; flooding and disease risk",
            WarningKind::LowConfidence => {
                "Model confidence is very low; consider alternative crops"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionWarning {
    pub kind: WarningKind,
    pub severity: Severity,
    pub feature: Option<Feature>,
    /// Raw reading that tripped the warning (confidence for `LowConfidence`)
    pub value: f64,
    pub message: String,
}

impl ConditionWarning {
    fn new(kind: WarningKind, value: f64) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            feature: kind.feature(),
            value,
            message: kind.message().to_string(),
        }
    }
}

/// Critical-condition checks on the raw observation, then the model confidence.
/// Ordered by severity, then by layout order.
pub fn condition_warnings(raw: &RawObservation, confidence: f64) -> Vec<ConditionWarning> {
    let mut warnings = Vec::new();

    if raw.ph < CRITICAL_ACIDITY_PH {
        warnings.push(ConditionWarning::new(WarningKind::CriticalAcidity, raw.ph));
    } else if raw.ph > CRITICAL_ALKALINITY_PH {
        warnings.push(ConditionWarning::new(WarningKind::CriticalAlkalinity, raw.ph));
    }

    if raw.temperature > HEAT_STRESS_TEMPERATURE {
        warnings.push(ConditionWarning::new(WarningKind::HeatStress, raw.temperature));
    } else if raw.temperature < COLD_STRESS_TEMPERATURE {
        warnings.push(ConditionWarning::new(WarningKind::ColdStress, raw.temperature));
    }

    if raw.n < NITROGEN_DEFICIENCY {
        warnings.push(ConditionWarning::new(WarningKind::NitrogenDeficiency, raw.n));
    }

    if raw.rainfall > EXCESS_RAINFALL {
        warnings.push(ConditionWarning::new(WarningKind::ExcessRainfall, raw.rainfall));
    }

    if confidence < LOW_CONFIDENCE {
        warnings.push(ConditionWarning::new(WarningKind::LowConfidence, confidence));
    }

    warnings.sort_by_key(|w| (w.severity, w.feature.map_or(usize::MAX, Feature::index)));
    warnings
}

// ============================================================================
// FACTOR HINTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    Raise,
    Lower,
    /// Value is inside the crop range; the factor hurts through interactions
    WithinRange,
    /// No crop range applies to this feature
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorHint {
    pub feature: Feature,
    pub category: FactorCategory,
    pub value: f64,
    pub contribution: f64,
    pub crop_range: Option<Range>,
    pub adjustment: Adjustment,
    pub hint: &'static str,
}

/// Crop range matching an engineered feature, if the envelope defines one
fn crop_range(crop: Crop, feature: Feature) -> Option<Range> {
    let env = envelope(crop);
    match feature {
        f if f.is_raw() => env.range(f),
        Feature::NpkSum => Some(env.nutrient_sum()),
        Feature::RainfallHumidityRatio => Some(env.water_ratio()),
        _ => None,
    }
}

/// One hint per limiting factor of `report`, same order
pub fn factor_hints(report: &AttributionReport) -> Vec<FactorHint> {
    report
        .limiting_factors
        .iter()
        .map(|factor| {
            let range = crop_range(report.target, factor.feature);
            let adjustment = match range.map(|r| r.deviation(factor.value)) {
                Some(d) if d < 0.0 => Adjustment::Raise,
                Some(d) if d > 0.0 => Adjustment::Lower,
                Some(_) => Adjustment::WithinRange,
                None => Adjustment::Unknown,
            };
            FactorHint {
                feature: factor.feature,
                category: factor.category,
                value: factor.value,
                contribution: factor.contribution,
                crop_range: range,
                adjustment,
                hint: factor.category.advice_hint(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::explain::FeatureContribution;

    #[test]
    fn test_harsh_observation_warnings() {
        let raw = RawObservation::new(0.0, 5.0, 5.0, 43.0, 14.0, 3.5, 20.0);
        let kinds: Vec<WarningKind> =
            condition_warnings(&raw, 0.0003).iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![
                WarningKind::NitrogenDeficiency,
                WarningKind::HeatStress,
                WarningKind::CriticalAcidity,
                WarningKind::LowConfidence,
            ]
        );
    }

    #[test]
    fn test_warning_uses_undampened_value() {
        let raw = RawObservation::new(50.0, 50.0, 50.0, 25.0, 70.0, 6.5, 450.0);
        let warnings = condition_warnings(&raw, 0.9);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::ExcessRainfall);
        assert_eq!(warnings[0].severity, Severity::Warning);
        assert_eq!(warnings[0].value, 450.0);
    }

    #[test]
    fn test_critical_before_warning() {
        let raw = RawObservation::new(50.0, 50.0, 50.0, 5.0, 70.0, 9.5, 400.0);
        let warnings = condition_warnings(&raw, 0.9);
        let severities: Vec<Severity> = warnings.iter().map(|w| w.severity).collect();
        assert_eq!(severities, vec![Severity::Critical, Severity::Critical, Severity::Warning]);
        assert_eq!(warnings[0].kind, WarningKind::ColdStress);
        assert_eq!(warnings[1].kind, WarningKind::CriticalAlkalinity);
    }

    #[test]
    fn test_boundaries_do_not_trigger() {
        let raw = RawObservation::new(10.0, 50.0, 50.0, 40.0, 70.0, 4.5, 300.0);
        assert!(condition_warnings(&raw, 0.3).is_empty());
    }

    #[test]
    fn test_factor_hints_direction() {
        let report = AttributionReport {
            target: Crop::Rice,
            target_log_odds: -10.0,
            baseline_log_odds: -4.0,
            contributions: vec![],
            limiting_factors: vec![
                FeatureContribution {
                    feature: Feature::Ph,
                    value: 3.8,
                    contribution: -2.5,
                    category: FactorCategory::SoilChemistry,
                },
                FeatureContribution {
                    feature: Feature::Temperature,
                    value: 42.9,
                    contribution: -1.8,
                    category: FactorCategory::Climate,
                },
                FeatureContribution {
                    feature: Feature::PhAcidityBucket,
                    value: 1.0,
                    contribution: -0.1,
                    category: FactorCategory::SoilChemistry,
                },
            ],
            additivity_error: 0.0,
        };

        let hints = factor_hints(&report);
        assert_eq!(hints[0].adjustment, Adjustment::Raise);
        assert_eq!(hints[0].crop_range, Some(Range::new(5.0, 7.9)));
        assert_eq!(hints[1].adjustment, Adjustment::Lower);
        assert_eq!(hints[2].adjustment, Adjustment::Unknown);
        assert_eq!(hints[2].hint, FactorCategory::SoilChemistry.advice_hint());
    }
}
