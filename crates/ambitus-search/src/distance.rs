//! Distance metrics between tracks.
//!
//! Three families are supported: weighted absolute difference over raw
//! features, PCA distance (a scalar discriminator, per-domain vectors, or a
//! combination of all four), and Euclidean distance between latent
//! embeddings. [`DistanceMode::Auto`] picks the richest representation both
//! tracks share.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use ambitus_core::model::{
    Dimension, Discriminator, Features, Pca, PcaDomain, Track, LATENT_DIMENSIONS,
};

use crate::error::{SearchError, SearchResult};
use crate::weights::FeatureWeights;

/// Which part of the PCA block to compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PcaSubmode {
    PrimaryD,
    Tonal,
    Spectral,
    Rhythmic,
    /// Euclidean combination of the primary delta and the three domain
    /// distances.
    FullPca,
}

impl PcaSubmode {
    pub const ALL: [Self; 5] = [
        Self::PrimaryD,
        Self::Tonal,
        Self::Spectral,
        Self::Rhythmic,
        Self::FullPca,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PrimaryD => "primary_d",
            Self::Tonal => "tonal",
            Self::Spectral => "spectral",
            Self::Rhythmic => "rhythmic",
            Self::FullPca => "full_pca",
        }
    }

    /// Calibration discriminator for this sub-mode. `full_pca` has none.
    #[must_use]
    pub const fn discriminator(self) -> Option<Discriminator> {
        match self {
            Self::PrimaryD => Some(Discriminator::PrimaryD),
            Self::Tonal => Some(Discriminator::Tonal),
            Self::Spectral => Some(Discriminator::Spectral),
            Self::Rhythmic => Some(Discriminator::Rhythmic),
            Self::FullPca => None,
        }
    }
}

/// Distance flavor selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMode {
    Feature,
    Pca(PcaSubmode),
    Vae,
    Auto,
}

impl fmt::Display for DistanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feature => f.write_str("feature"),
            Self::Pca(sub) => write!(f, "pca:{}", sub.as_str()),
            Self::Vae => f.write_str("vae"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

impl FromStr for DistanceMode {
    type Err = SearchError;

    /// Accepts `feature`, `vae`, `auto`, `pca` (primary_d), a sub-mode name,
    /// or `pca:<sub-mode>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let sub_name = lower.strip_prefix("pca:").unwrap_or(&lower);
        match lower.as_str() {
            "feature" | "features" => return Ok(Self::Feature),
            "vae" | "latent" => return Ok(Self::Vae),
            "auto" => return Ok(Self::Auto),
            "pca" => return Ok(Self::Pca(PcaSubmode::PrimaryD)),
            _ => {}
        }
        PcaSubmode::ALL
            .into_iter()
            .find(|sub| sub.as_str() == sub_name)
            .map(Self::Pca)
            .ok_or_else(|| SearchError::InvalidParameter(format!("unknown distance mode: {s}")))
    }
}

/// Distance between two PCA blocks.
#[must_use]
pub fn pca_distance(a: &Pca, b: &Pca, submode: PcaSubmode) -> f64 {
    let domain = |d: PcaDomain| euclidean(a.domain(d), b.domain(d));
    match submode {
        PcaSubmode::PrimaryD => (a.primary_d - b.primary_d).abs(),
        PcaSubmode::Tonal => domain(PcaDomain::Tonal),
        PcaSubmode::Spectral => domain(PcaDomain::Spectral),
        PcaSubmode::Rhythmic => domain(PcaDomain::Rhythmic),
        PcaSubmode::FullPca => {
            let primary = a.primary_d - b.primary_d;
            let tonal = domain(PcaDomain::Tonal);
            let spectral = domain(PcaDomain::Spectral);
            let rhythmic = domain(PcaDomain::Rhythmic);
            (primary * primary + tonal * tonal + spectral * spectral + rhythmic * rhythmic).sqrt()
        }
    }
}

/// Euclidean distance between two latent embeddings.
#[must_use]
pub fn latent_distance(a: &[f64; LATENT_DIMENSIONS], b: &[f64; LATENT_DIMENSIONS]) -> f64 {
    euclidean(a, b)
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Stateless distance computations over a fixed dimension list and weights.
#[derive(Debug, Clone, Copy)]
pub struct DistanceEngine<'a> {
    dimensions: &'a [Dimension],
    weights: &'a FeatureWeights,
}

impl<'a> DistanceEngine<'a> {
    #[must_use]
    pub const fn new(dimensions: &'a [Dimension], weights: &'a FeatureWeights) -> Self {
        Self {
            dimensions,
            weights,
        }
    }

    #[must_use]
    pub const fn weights(&self) -> &FeatureWeights {
        self.weights
    }

    /// Weighted sum of absolute per-dimension differences.
    pub fn feature(&self, a: &Track, b: &Track) -> SearchResult<f64> {
        self.feature_excluding(a, b, None)
    }

    /// Feature distance with one dimension left out.
    pub fn feature_excluding(
        &self,
        a: &Track,
        b: &Track,
        excluded: Option<Dimension>,
    ) -> SearchResult<f64> {
        self.features_between(&a.features, &b.features, excluded)
            .map_err(|(side, dimension)| SearchError::MissingFeature {
                track: if side == 0 {
                    a.identifier.clone()
                } else {
                    b.identifier.clone()
                },
                dimension,
            })
    }

    /// Feature distance between bare feature maps.
    ///
    /// On failure returns which side (0 or 1) lacked which dimension.
    pub fn features_between(
        &self,
        a: &Features,
        b: &Features,
        excluded: Option<Dimension>,
    ) -> Result<f64, (usize, Dimension)> {
        let mut total = 0.0;
        for &dimension in self.dimensions {
            if Some(dimension) == excluded || self.weights.is_ignored(dimension) {
                continue;
            }
            let x = a.get(dimension).ok_or((0, dimension))?;
            let y = b.get(dimension).ok_or((1, dimension))?;
            total += self.weights.weight(dimension) * (x - y).abs();
        }
        Ok(total)
    }

    /// PCA distance; fails if either track has no PCA block.
    pub fn pca(&self, a: &Track, b: &Track, submode: PcaSubmode) -> SearchResult<f64> {
        let pa = a.pca.as_ref().ok_or_else(|| SearchError::MissingPca {
            track: a.identifier.clone(),
        })?;
        let pb = b.pca.as_ref().ok_or_else(|| SearchError::MissingPca {
            track: b.identifier.clone(),
        })?;
        Ok(pca_distance(pa, pb, submode))
    }

    /// Latent distance; fails if either track has no embedding.
    pub fn vae(&self, a: &Track, b: &Track) -> SearchResult<f64> {
        let la = a.vae.as_ref().ok_or_else(|| SearchError::MissingLatent {
            track: a.identifier.clone(),
        })?;
        let lb = b.vae.as_ref().ok_or_else(|| SearchError::MissingLatent {
            track: b.identifier.clone(),
        })?;
        Ok(latent_distance(&la.latent, &lb.latent))
    }

    /// The concrete mode `Auto` selects for this pair.
    #[must_use]
    pub fn resolve_auto(a: &Track, b: &Track) -> DistanceMode {
        if a.vae.is_some() && b.vae.is_some() {
            DistanceMode::Vae
        } else if a.pca.is_some() && b.pca.is_some() {
            DistanceMode::Pca(PcaSubmode::PrimaryD)
        } else {
            DistanceMode::Feature
        }
    }

    /// Distance under the given mode.
    pub fn measure(&self, a: &Track, b: &Track, mode: DistanceMode) -> SearchResult<f64> {
        match mode {
            DistanceMode::Feature => self.feature(a, b),
            DistanceMode::Pca(submode) => self.pca(a, b, submode),
            DistanceMode::Vae => self.vae(a, b),
            DistanceMode::Auto => self.measure(a, b, Self::resolve_auto(a, b)),
        }
    }
}
