//! Crop growing envelopes
//!
//! Per-crop agronomic ranges for the seven raw measurements. They seed the
//! reference ensemble and give the advisory layer something concrete to
//! compare a limiting factor against.

use serde::Serialize;

use super::crop::{Crop, CROP_COUNT};
use crate::logic::features::{Feature, RAW_FEATURE_COUNT};

/// Inclusive `[low, high]` range of one measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Range {
    pub low: f64,
    pub high: f64,
}

impl Range {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Signed distance outside the range; 0 inside
    pub fn deviation(&self, value: f64) -> f64 {
        if value < self.low {
            value - self.low
        } else if value > self.high {
            value - self.high
        } else {
            0.0
        }
    }
}

/// Growing ranges in raw layout order (N, P, K, temperature, humidity, ph, rainfall)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CropEnvelope {
    pub crop: Crop,
    pub ranges: [Range; RAW_FEATURE_COUNT],
}

impl CropEnvelope {
    pub fn range(&self, feature: Feature) -> Option<Range> {
        self.ranges.get(feature.index()).copied()
    }

    /// Range covering N + P + K
    pub fn nutrient_sum(&self) -> Range {
        let nutrients = &self.ranges[..3];
        Range::new(
            nutrients.iter().map(|r| r.low).sum(),
            nutrients.iter().map(|r| r.high).sum(),
        )
    }

    /// Rainfall per humidity point, driest to wettest
    pub fn water_ratio(&self) -> Range {
        let rain = self.ranges[Feature::Rainfall.index()];
        let humidity = self.ranges[Feature::Humidity.index()];
        Range::new(rain.low / humidity.high, rain.high / humidity.low.max(1.0))
    }
}

macro_rules! envelope {
    ($crop:ident: $(($lo:expr, $hi:expr)),* $(,)?) => {
        CropEnvelope {
            crop: Crop::$crop,
            ranges: [$(Range::new($lo as f64, $hi as f64)),*],
        }
    };
}

/// Indexed by `Crop::index()`
pub const CROP_ENVELOPES: [CropEnvelope; CROP_COUNT] = [
    envelope!(Apple: (0, 40), (120, 145), (195, 205), (21, 24), (90, 95), (5.5, 6.5), (100, 125)),
    envelope!(Banana: (80, 120), (70, 95), (45, 55), (25, 30), (75, 85), (5.5, 6.5), (90, 120)),
    envelope!(Blackgram: (20, 60), (55, 80), (15, 25), (25, 35), (60, 70), (6.5, 7.8), (60, 75)),
    envelope!(Chickpea: (20, 60), (55, 80), (75, 85), (17, 21), (14, 20), (6.0, 8.9), (65, 95)),
    envelope!(Coconut: (0, 40), (5, 30), (25, 35), (25, 30), (90, 100), (5.5, 6.5), (131, 226)),
    envelope!(Coffee: (80, 120), (15, 40), (25, 35), (23, 28), (50, 70), (6.0, 7.5), (115, 200)),
    envelope!(Cotton: (100, 140), (35, 60), (15, 25), (22, 26), (75, 85), (5.8, 8.0), (60, 100)),
    envelope!(Grapes: (0, 40), (120, 145), (195, 205), (8, 42), (80, 84), (5.5, 6.5), (65, 75)),
    envelope!(Jute: (60, 100), (35, 60), (35, 45), (23, 27), (70, 90), (6.0, 7.5), (150, 200)),
    envelope!(Kidneybeans: (0, 40), (55, 80), (15, 25), (15, 25), (18, 25), (5.5, 6.0), (60, 150)),
    envelope!(Lentil: (0, 40), (55, 80), (15, 25), (18, 30), (60, 70), (5.9, 7.8), (35, 55)),
    envelope!(Maize: (60, 100), (35, 60), (15, 25), (18, 27), (55, 75), (5.5, 7.0), (60, 110)),
    envelope!(Mango: (0, 40), (15, 40), (25, 35), (27, 36), (45, 55), (4.5, 7.0), (89, 101)),
    envelope!(Mothbeans: (0, 40), (35, 60), (15, 25), (24, 32), (40, 65), (3.5, 9.9), (30, 75)),
    envelope!(Mungbean: (0, 40), (35, 60), (15, 25), (27, 30), (80, 90), (6.2, 7.2), (36, 60)),
    envelope!(Muskmelon: (80, 120), (5, 30), (45, 55), (27, 30), (90, 95), (6.0, 6.8), (20, 30)),
    envelope!(Orange: (0, 40), (5, 30), (5, 15), (10, 35), (90, 95), (6.0, 8.0), (100, 120)),
    envelope!(Papaya: (31, 70), (46, 70), (45, 55), (23, 44), (90, 95), (6.5, 7.0), (40, 249)),
    envelope!(Pigeonpeas: (0, 40), (55, 80), (15, 25), (18, 37), (30, 70), (4.5, 7.5), (90, 199)),
    envelope!(Pomegranate: (0, 40), (5, 30), (35, 45), (18, 25), (85, 95), (5.6, 7.2), (102, 113)),
    envelope!(Rice: (60, 99), (35, 60), (35, 45), (20, 27), (80, 85), (5.0, 7.9), (182, 299)),
    envelope!(Watermelon: (80, 120), (5, 30), (45, 55), (24, 27), (80, 90), (6.0, 7.0), (40, 60)),
];

pub fn envelope(crop: Crop) -> &'static CropEnvelope {
    &CROP_ENVELOPES[crop.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_follows_crop_index() {
        for crop in Crop::ALL {
            assert_eq!(envelope(crop).crop, crop);
        }
    }

    #[test]
    fn test_ranges_are_ordered() {
        for env in &CROP_ENVELOPES {
            for range in &env.ranges {
                assert!(range.low <= range.high, "{}: {:?}", env.crop, range);
            }
        }
    }

    #[test]
    fn test_rice_envelope() {
        let rice = envelope(Crop::Rice);
        let ph = rice.range(Feature::Ph).unwrap();
        assert!(ph.contains(6.5));
        assert!((ph.deviation(3.8) + 1.2).abs() < 1e-12);
        assert_eq!(rice.nutrient_sum(), Range::new(130.0, 204.0));
        assert_eq!(rice.range(Feature::NpkSum), None);
    }

    #[test]
    fn test_water_ratio_guards_zero_humidity() {
        let coconut = envelope(Crop::Coconut);
        let ratio = coconut.water_ratio();
        assert!((ratio.low - 1.31).abs() < 1e-12);
        assert!((ratio.high - 226.0 / 90.0).abs() < 1e-12);
    }
}
