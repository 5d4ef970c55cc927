//! Semantic exploration directions.
//!
//! A direction key such as `"faster"` or `"brighter"` names one feature
//! dimension and the sign of change along it. Besides the semantic labels,
//! any dimension can be addressed as `<dimension>_up` / `<dimension>_down`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::dimension::Dimension;

/// Sign of change along a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }

    /// Whether a delta moves in this direction. Zero never matches.
    #[must_use]
    pub fn matches(self, delta: f64) -> bool {
        match self {
            Self::Positive => delta > 0.0,
            Self::Negative => delta < 0.0,
        }
    }
}

/// A resolved direction: which dimension to move along, and which way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Direction {
    pub dimension: Dimension,
    pub polarity: Polarity,
}

// Semantic labels, including legacy aliases kept for old clients.
const DIRECTIONS: &[(&str, Dimension, Polarity)] = &[
    ("faster", Dimension::Bpm, Polarity::Positive),
    ("slower", Dimension::Bpm, Polarity::Negative),
    ("more_danceable", Dimension::Danceability, Polarity::Positive),
    ("less_danceable", Dimension::Danceability, Polarity::Negative),
    ("busier", Dimension::OnsetRate, Polarity::Positive),
    ("sparser", Dimension::OnsetRate, Polarity::Negative),
    ("punchier", Dimension::BeatPunch, Polarity::Positive),
    ("softer", Dimension::BeatPunch, Polarity::Negative),
    ("more_tonal", Dimension::TonalClarity, Polarity::Positive),
    ("more_atonal", Dimension::TonalClarity, Polarity::Negative),
    ("purer_tuning", Dimension::TuningPurity, Polarity::Positive),
    ("looser_tuning", Dimension::TuningPurity, Polarity::Negative),
    ("more_harmonic", Dimension::FifthsStrength, Polarity::Positive),
    ("less_harmonic", Dimension::FifthsStrength, Polarity::Negative),
    ("stronger_chords", Dimension::ChordStrength, Polarity::Positive),
    ("weaker_chords", Dimension::ChordStrength, Polarity::Negative),
    ("more_chord_changes", Dimension::ChordChangeRate, Polarity::Positive),
    ("fewer_chord_changes", Dimension::ChordChangeRate, Polarity::Negative),
    ("more_dynamic", Dimension::Crest, Polarity::Positive),
    ("more_compressed", Dimension::Crest, Polarity::Negative),
    ("more_complex", Dimension::Entropy, Polarity::Positive),
    ("simpler", Dimension::Entropy, Polarity::Negative),
    ("brighter", Dimension::SpectralCentroid, Polarity::Positive),
    ("darker", Dimension::SpectralCentroid, Polarity::Negative),
    ("more_treble", Dimension::SpectralRolloff, Polarity::Positive),
    ("less_treble", Dimension::SpectralRolloff, Polarity::Negative),
    ("peakier", Dimension::SpectralKurtosis, Polarity::Positive),
    ("smoother", Dimension::SpectralKurtosis, Polarity::Negative),
    ("louder", Dimension::SpectralEnergy, Polarity::Positive),
    ("quieter", Dimension::SpectralEnergy, Polarity::Negative),
    ("noisier", Dimension::SpectralFlatness, Polarity::Positive),
    ("cleaner", Dimension::SpectralFlatness, Polarity::Negative),
    ("more_bass", Dimension::SubDrive, Polarity::Positive),
    ("less_bass", Dimension::SubDrive, Polarity::Negative),
    ("more_air", Dimension::AirSizzle, Polarity::Positive),
    ("less_air", Dimension::AirSizzle, Polarity::Negative),
    ("more_subdivided", Dimension::Opb, Polarity::Positive),
    ("less_subdivided", Dimension::Opb, Polarity::Negative),
    ("steadier", Dimension::PulseCohesion, Polarity::Positive),
    ("looser", Dimension::PulseCohesion, Polarity::Negative),
    ("tilt_bright", Dimension::SpectralSlope, Polarity::Positive),
    ("tilt_dark", Dimension::SpectralSlope, Polarity::Negative),
    // legacy
    ("higher_tempo", Dimension::Bpm, Polarity::Positive),
    ("lower_tempo", Dimension::Bpm, Polarity::Negative),
    ("more_energetic", Dimension::SpectralEnergy, Polarity::Positive),
    ("less_energetic", Dimension::SpectralEnergy, Polarity::Negative),
    ("more_energy", Dimension::SpectralEnergy, Polarity::Positive),
    ("less_energy", Dimension::SpectralEnergy, Polarity::Negative),
    ("more_groove", Dimension::Danceability, Polarity::Positive),
    ("less_groove", Dimension::Danceability, Polarity::Negative),
];

impl Direction {
    #[must_use]
    pub const fn new(dimension: Dimension, polarity: Polarity) -> Self {
        Self {
            dimension,
            polarity,
        }
    }

    /// Resolve a direction key. Returns `None` for unknown keys.
    #[must_use]
    pub fn resolve(key: &str) -> Option<Self> {
        let key = key.trim();
        if let Some(&(_, dimension, polarity)) = DIRECTIONS
            .iter()
            .find(|(label, _, _)| label.eq_ignore_ascii_case(key))
        {
            return Some(Self::new(dimension, polarity));
        }

        let lower = key.to_ascii_lowercase();
        if let Some(name) = lower.strip_suffix("_up") {
            return Dimension::from_name(name).map(|d| Self::new(d, Polarity::Positive));
        }
        if let Some(name) = lower.strip_suffix("_down") {
            return Dimension::from_name(name).map(|d| Self::new(d, Polarity::Negative));
        }
        None
    }

    /// All semantic labels, in table order.
    pub fn labels() -> impl Iterator<Item = &'static str> {
        DIRECTIONS.iter().map(|(label, _, _)| *label)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.polarity {
            Polarity::Positive => "up",
            Polarity::Negative => "down",
        };
        write!(f, "{}_{}", self.dimension, suffix)
    }
}
