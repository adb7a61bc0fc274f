//! Crop label space
//!
//! 22 crops, indexed in the order the training label encoder assigned
//! (alphabetical). Class index `i` of every probability vector is `Crop::ALL[i]`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::logic::error::{EngineError, Stage};

pub const CROP_COUNT: usize = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Crop {
    Apple = 0,
    Banana,
    Blackgram,
    Chickpea,
    Coconut,
    Coffee,
    Cotton,
    Grapes,
    Jute,
    Kidneybeans,
    Lentil,
    Maize,
    Mango,
    Mothbeans,
    Mungbean,
    Muskmelon,
    Orange,
    Papaya,
    Pigeonpeas,
    Pomegranate,
    Rice,
    Watermelon,
}

impl Crop {
    pub const ALL: [Crop; CROP_COUNT] = [
        Crop::Apple,
        Crop::Banana,
        Crop::Blackgram,
        Crop::Chickpea,
        Crop::Coconut,
        Crop::Coffee,
        Crop::Cotton,
        Crop::Grapes,
        Crop::Jute,
        Crop::Kidneybeans,
        Crop::Lentil,
        Crop::Maize,
        Crop::Mango,
        Crop::Mothbeans,
        Crop::Mungbean,
        Crop::Muskmelon,
        Crop::Orange,
        Crop::Papaya,
        Crop::Pigeonpeas,
        Crop::Pomegranate,
        Crop::Rice,
        Crop::Watermelon,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn label(self) -> &'static str {
        match self {
            Crop::Apple => "apple",
            Crop::Banana => "banana",
            Crop::Blackgram => "blackgram",
            Crop::Chickpea => "chickpea",
            Crop::Coconut => "coconut",
            Crop::Coffee => "coffee",
            Crop::Cotton => "cotton",
            Crop::Grapes => "grapes",
            Crop::Jute => "jute",
            Crop::Kidneybeans => "kidneybeans",
            Crop::Lentil => "lentil",
            Crop::Maize => "maize",
            Crop::Mango => "mango",
            Crop::Mothbeans => "mothbeans",
            Crop::Mungbean => "mungbean",
            Crop::Muskmelon => "muskmelon",
            Crop::Orange => "orange",
            Crop::Papaya => "papaya",
            Crop::Pigeonpeas => "pigeonpeas",
            Crop::Pomegranate => "pomegranate",
            Crop::Rice => "rice",
            Crop::Watermelon => "watermelon",
        }
    }

    /// Labels in class-index order, as stored in a model bundle
    pub fn labels() -> Vec<String> {
        Self::ALL.iter().map(|c| c.label().to_string()).collect()
    }
}

impl std::fmt::Display for Crop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Crop {
    type Err = EngineError;

    /// Case-insensitive; surrounding whitespace ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.label() == wanted)
            .ok_or_else(|| {
                EngineError::validation(
                    Stage::Validation,
                    "target_crop",
                    format!("unknown crop `{}`", s),
                )
            })
    }
}
