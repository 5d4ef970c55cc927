use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The feature family a [`Dimension`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Rhythmic,
    Tonal,
    Shape,
    Spectral,
    Production,
    /// Derived from other dimensions at import time.
    Algebraic,
}

/// One named axis of the raw audio-feature vector.
///
/// Declaration order is significant: it is the order used for k-d tree
/// split-dimension cycling and for every ordered feature map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    // Rhythmic
    Bpm,
    Danceability,
    OnsetRate,
    BeatPunch,
    // Tonal
    TonalClarity,
    TuningPurity,
    FifthsStrength,
    ChordStrength,
    ChordChangeRate,
    // Shape
    Crest,
    Entropy,
    // Spectral
    SpectralCentroid,
    SpectralRolloff,
    SpectralKurtosis,
    SpectralEnergy,
    SpectralFlatness,
    // Production
    SubDrive,
    AirSizzle,
    // Algebraic
    Opb,
    PulseCohesion,
    SpectralSlope,
}

impl Dimension {
    /// Every dimension, in split-cycling order.
    pub const ALL: [Self; 21] = [
        Self::Bpm,
        Self::Danceability,
        Self::OnsetRate,
        Self::BeatPunch,
        Self::TonalClarity,
        Self::TuningPurity,
        Self::FifthsStrength,
        Self::ChordStrength,
        Self::ChordChangeRate,
        Self::Crest,
        Self::Entropy,
        Self::SpectralCentroid,
        Self::SpectralRolloff,
        Self::SpectralKurtosis,
        Self::SpectralEnergy,
        Self::SpectralFlatness,
        Self::SubDrive,
        Self::AirSizzle,
        Self::Opb,
        Self::PulseCohesion,
        Self::SpectralSlope,
    ];

    /// The measured (non-derived) dimensions every track must carry.
    pub const BASE: [Self; 18] = [
        Self::Bpm,
        Self::Danceability,
        Self::OnsetRate,
        Self::BeatPunch,
        Self::TonalClarity,
        Self::TuningPurity,
        Self::FifthsStrength,
        Self::ChordStrength,
        Self::ChordChangeRate,
        Self::Crest,
        Self::Entropy,
        Self::SpectralCentroid,
        Self::SpectralRolloff,
        Self::SpectralKurtosis,
        Self::SpectralEnergy,
        Self::SpectralFlatness,
        Self::SubDrive,
        Self::AirSizzle,
    ];

    /// Dimensions derived from the base set; optional per catalog.
    pub const ALGEBRAIC: [Self; 3] = [Self::Opb, Self::PulseCohesion, Self::SpectralSlope];

    /// Canonical snake_case name, as used in storage and direction keys.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bpm => "bpm",
            Self::Danceability => "danceability",
            Self::OnsetRate => "onset_rate",
            Self::BeatPunch => "beat_punch",
            Self::TonalClarity => "tonal_clarity",
            Self::TuningPurity => "tuning_purity",
            Self::FifthsStrength => "fifths_strength",
            Self::ChordStrength => "chord_strength",
            Self::ChordChangeRate => "chord_change_rate",
            Self::Crest => "crest",
            Self::Entropy => "entropy",
            Self::SpectralCentroid => "spectral_centroid",
            Self::SpectralRolloff => "spectral_rolloff",
            Self::SpectralKurtosis => "spectral_kurtosis",
            Self::SpectralEnergy => "spectral_energy",
            Self::SpectralFlatness => "spectral_flatness",
            Self::SubDrive => "sub_drive",
            Self::AirSizzle => "air_sizzle",
            Self::Opb => "opb",
            Self::PulseCohesion => "pulse_cohesion",
            Self::SpectralSlope => "spectral_slope",
        }
    }

    /// Look a dimension up by its canonical name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub const fn domain(self) -> Domain {
        match self {
            Self::Bpm | Self::Danceability | Self::OnsetRate | Self::BeatPunch => Domain::Rhythmic,
            Self::TonalClarity
            | Self::TuningPurity
            | Self::FifthsStrength
            | Self::ChordStrength
            | Self::ChordChangeRate => Domain::Tonal,
            Self::Crest | Self::Entropy => Domain::Shape,
            Self::SpectralCentroid
            | Self::SpectralRolloff
            | Self::SpectralKurtosis
            | Self::SpectralEnergy
            | Self::SpectralFlatness => Domain::Spectral,
            Self::SubDrive | Self::AirSizzle => Domain::Production,
            Self::Opb | Self::PulseCohesion | Self::SpectralSlope => Domain::Algebraic,
        }
    }

    #[must_use]
    pub const fn is_algebraic(self) -> bool {
        matches!(self.domain(), Domain::Algebraic)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| Error::InvalidData(format!("unknown dimension: {s}")))
    }
}
