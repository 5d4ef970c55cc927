//! Calibrated neighborhood radii.
//!
//! Calibration is computed offline: for each embedding space, resolution
//! tier and discriminator, a pair of radii is chosen so that the annulus
//! between them holds a target share of the library. The tables are loaded
//! once and treated as read-only reference data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Which embedding space a bucket was calibrated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMode {
    Pca,
    Vae,
}

impl CalibrationMode {
    pub const ALL: [Self; 2] = [Self::Pca, Self::Vae];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pca => "pca",
            Self::Vae => "vae",
        }
    }
}

/// Named granularity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Microscope,
    MagnifyingGlass,
    Binoculars,
}

impl Resolution {
    pub const ALL: [Self; 3] = [Self::Microscope, Self::MagnifyingGlass, Self::Binoculars];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Microscope => "microscope",
            Self::MagnifyingGlass => "magnifying_glass",
            Self::Binoculars => "binoculars",
        }
    }
}

/// The distance axis a bucket applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discriminator {
    PrimaryD,
    Tonal,
    Spectral,
    Rhythmic,
    Latent,
}

impl Discriminator {
    pub const ALL: [Self; 5] = [
        Self::PrimaryD,
        Self::Tonal,
        Self::Spectral,
        Self::Rhythmic,
        Self::Latent,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PrimaryD => "primary_d",
            Self::Tonal => "tonal",
            Self::Spectral => "spectral",
            Self::Rhythmic => "rhythmic",
            Self::Latent => "latent",
        }
    }

    /// The calibration mode this discriminator belongs to.
    #[must_use]
    pub const fn mode(self) -> CalibrationMode {
        match self {
            Self::Latent => CalibrationMode::Vae,
            _ => CalibrationMode::Pca,
        }
    }
}

macro_rules! impl_str_enum {
    ($name:ident, $what:expr) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .into_iter()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| Error::InvalidData(format!("unknown {}: {}", $what, s)))
            }
        }
    };
}

impl_str_enum!(CalibrationMode, "calibration mode");
impl_str_enum!(Resolution, "resolution");
impl_str_enum!(Discriminator, "discriminator");

/// Calibrated inner/outer radii for one (mode, resolution, discriminator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBucket {
    pub mode: CalibrationMode,
    pub resolution: Resolution,
    pub discriminator: Discriminator,
    pub inner_radius: f64,
    pub outer_radius: f64,

    /// Base step size, normally equal to the inner radius.
    #[serde(default)]
    pub base_x: f64,

    /// Share of the library the outer radius was meant to capture.
    pub target_percentage: f64,

    /// Share of the sampled neighbors the outer radius actually captured.
    pub achieved_percentage: f64,

    #[serde(default)]
    pub library_size: u64,

    #[serde(default)]
    pub sample_size: u64,

    pub calibrated_at: DateTime<Utc>,

    #[serde(default)]
    pub checksum: String,
}

impl CalibrationBucket {
    /// Correction applied to both radii: `target / achieved`.
    ///
    /// Returns 1.0 when the achieved share is zero or not finite.
    #[must_use]
    pub fn scaling_factor(&self) -> f64 {
        let achieved = self.achieved_percentage;
        if achieved == 0.0 || !achieved.is_finite() {
            return 1.0;
        }
        let factor = self.target_percentage / achieved;
        if factor.is_finite() {
            factor
        } else {
            1.0
        }
    }

    #[must_use]
    pub const fn key(&self) -> (CalibrationMode, Resolution, Discriminator) {
        (self.mode, self.resolution, self.discriminator)
    }
}

/// All calibration buckets, keyed by (mode, resolution, discriminator).
#[derive(Debug, Clone, Default)]
pub struct CalibrationTable {
    buckets: HashMap<(CalibrationMode, Resolution, Discriminator), CalibrationBucket>,
}

impl CalibrationTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a bucket, replacing any previous bucket with the same key.
    pub fn insert(&mut self, bucket: CalibrationBucket) {
        self.buckets.insert(bucket.key(), bucket);
    }

    #[must_use]
    pub fn get(
        &self,
        mode: CalibrationMode,
        resolution: Resolution,
        discriminator: Discriminator,
    ) -> Option<&CalibrationBucket> {
        self.buckets.get(&(mode, resolution, discriminator))
    }

    /// Number of buckets calibrated for a mode.
    #[must_use]
    pub fn count_for(&self, mode: CalibrationMode) -> usize {
        self.buckets.keys().filter(|(m, _, _)| *m == mode).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CalibrationBucket> {
        self.buckets.values()
    }
}

impl FromIterator<CalibrationBucket> for CalibrationTable {
    fn from_iter<I: IntoIterator<Item = CalibrationBucket>>(iter: I) -> Self {
        let mut table = Self::new();
        for bucket in iter {
            table.insert(bucket);
        }
        table
    }
}
