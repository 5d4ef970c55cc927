//! Annular neighbor search with calibrated radii.
//!
//! Calibration buckets give each (mode, resolution, discriminator) an inner
//! and outer radius. The search returns neighbors in that annulus, optionally
//! corrected by the bucket's scaling factor, sorted by distance.

use serde::{Deserialize, Serialize};

use ambitus_core::model::{
    CalibrationBucket, CalibrationMode, CalibrationTable, Discriminator, Resolution, Track,
};

use crate::distance::{latent_distance, pca_distance, PcaSubmode};
use crate::error::{SearchError, SearchResult};
use crate::kdtree::{Neighbor, SpatialIndex};

/// Outer radius used for PCA queries when no bucket or override exists.
pub const DEFAULT_PCA_RADIUS: f64 = 1.0;

/// Outer radius used for latent queries when no bucket or override exists.
pub const DEFAULT_VAE_OUTER_RADIUS: f64 = 0.5;

/// Latent queries collect this many times `limit` before the annulus filter.
pub const VAE_OVERSAMPLE: usize = 2;

pub const DEFAULT_LIMIT: usize = 50;

/// An inner/outer radius pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Radii {
    pub inner: f64,
    pub outer: f64,
}

impl Radii {
    /// # Errors
    ///
    /// Fails unless `0 <= inner <= outer` and both are finite.
    pub fn new(inner: f64, outer: f64) -> SearchResult<Self> {
        if !inner.is_finite() || !outer.is_finite() || inner < 0.0 || inner > outer {
            return Err(SearchError::InvalidParameter(format!(
                "radii must satisfy 0 <= inner <= outer (got {inner}, {outer})"
            )));
        }
        Ok(Self { inner, outer })
    }

    /// A full disk: inner radius zero.
    #[must_use]
    pub const fn disk(outer: f64) -> Self {
        Self { inner: 0.0, outer }
    }

    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            inner: self.inner * factor,
            outer: self.outer * factor,
        }
    }
}

/// Where the radii of a query came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadiusSource {
    Calibrated,
    Override,
    Default,
}

/// Knobs for a calibrated query.
#[derive(Debug, Clone, Copy)]
pub struct RadiusOptions {
    pub resolution: Resolution,

    /// Caller-supplied radii; bypasses the calibration table.
    pub override_radii: Option<Radii>,

    /// Multiply calibrated radii by the bucket's scaling factor.
    pub apply_scaling: bool,

    pub limit: usize,
}

impl Default for RadiusOptions {
    fn default() -> Self {
        Self {
            resolution: Resolution::MagnifyingGlass,
            override_radii: None,
            apply_scaling: true,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Neighbors of a calibrated query plus how the radii were chosen.
#[derive(Debug, Clone)]
pub struct CalibratedResult {
    pub neighbors: Vec<Neighbor>,
    pub radii: Radii,
    pub source: RadiusSource,
    pub scaling_factor: f64,

    /// Set when no calibration applied and a default radius was used.
    pub degraded: bool,
}

/// Calibrated annular search over a spatial index.
#[derive(Debug, Clone, Copy)]
pub struct CalibratedRadiusSearch<'a> {
    index: &'a SpatialIndex,
    calibration: &'a CalibrationTable,
}

struct ResolvedRadii {
    radii: Radii,
    source: RadiusSource,
    scaling_factor: f64,
}

impl<'a> CalibratedRadiusSearch<'a> {
    #[must_use]
    pub const fn new(index: &'a SpatialIndex, calibration: &'a CalibrationTable) -> Self {
        Self { index, calibration }
    }

    fn resolve(
        bucket: Option<&CalibrationBucket>,
        options: &RadiusOptions,
        default: Radii,
        what: &str,
    ) -> ResolvedRadii {
        if let Some(radii) = options.override_radii {
            return ResolvedRadii {
                radii,
                source: RadiusSource::Override,
                scaling_factor: 1.0,
            };
        }
        match bucket {
            Some(bucket) => {
                let scaling_factor = if options.apply_scaling {
                    bucket.scaling_factor()
                } else {
                    1.0
                };
                ResolvedRadii {
                    radii: Radii {
                        inner: bucket.inner_radius,
                        outer: bucket.outer_radius,
                    }
                    .scaled(scaling_factor),
                    source: RadiusSource::Calibrated,
                    scaling_factor,
                }
            }
            None => {
                log::warn!(
                    "No calibration for {} at {}; using default radius {}",
                    what,
                    options.resolution,
                    default.outer
                );
                ResolvedRadii {
                    radii: default,
                    source: RadiusSource::Default,
                    scaling_factor: 1.0,
                }
            }
        }
    }

    /// PCA annulus around `query`.
    ///
    /// `full_pca` has no bucket of its own and uses the `primary_d` one.
    ///
    /// # Errors
    ///
    /// Fails with [`SearchError::MissingPca`] when the query has no PCA.
    pub fn pca(
        &self,
        query: &Track,
        submode: PcaSubmode,
        options: &RadiusOptions,
    ) -> SearchResult<CalibratedResult> {
        let center = query.pca.as_ref().ok_or_else(|| SearchError::MissingPca {
            track: query.identifier.clone(),
        })?;
        let discriminator = submode.discriminator().unwrap_or(Discriminator::PrimaryD);
        let bucket = self
            .calibration
            .get(CalibrationMode::Pca, options.resolution, discriminator);
        let resolved = Self::resolve(
            bucket,
            options,
            Radii::disk(DEFAULT_PCA_RADIUS),
            submode.as_str(),
        );

        let mut neighbors = self.index.annular_search(
            query,
            resolved.radii.inner,
            resolved.radii.outer,
            |track| track.pca.as_ref().map(|p| pca_distance(center, p, submode)),
        );
        sort_neighbors(&mut neighbors);
        neighbors.truncate(options.limit);

        Ok(finish(neighbors, resolved))
    }

    /// Latent-space annulus around `query`.
    ///
    /// Collects up to `VAE_OVERSAMPLE * limit` nearest tracks inside the
    /// outer radius, then keeps those beyond the inner radius.
    ///
    /// # Errors
    ///
    /// Fails with [`SearchError::MissingLatent`] when the query has no
    /// embedding.
    pub fn vae(&self, query: &Track, options: &RadiusOptions) -> SearchResult<CalibratedResult> {
        let center = query.vae.as_ref().ok_or_else(|| SearchError::MissingLatent {
            track: query.identifier.clone(),
        })?;
        let bucket = self.calibration.get(
            CalibrationMode::Vae,
            options.resolution,
            Discriminator::Latent,
        );
        let resolved = Self::resolve(
            bucket,
            options,
            Radii::disk(DEFAULT_VAE_OUTER_RADIUS),
            "latent",
        );

        let mut neighbors = self.index.annular_search(query, 0.0, resolved.radii.outer, |track| {
            track
                .vae
                .as_ref()
                .map(|l| latent_distance(&center.latent, &l.latent))
        });
        sort_neighbors(&mut neighbors);
        neighbors.truncate(options.limit.saturating_mul(VAE_OVERSAMPLE));
        neighbors.retain(|n| n.distance >= resolved.radii.inner);
        neighbors.truncate(options.limit);

        Ok(finish(neighbors, resolved))
    }
}

fn finish(neighbors: Vec<Neighbor>, resolved: ResolvedRadii) -> CalibratedResult {
    CalibratedResult {
        neighbors,
        radii: resolved.radii,
        degraded: resolved.source == RadiusSource::Default,
        source: resolved.source,
        scaling_factor: resolved.scaling_factor,
    }
}

/// Ascending by distance, ties broken by identifier.
pub(crate) fn sort_neighbors(neighbors: &mut [Neighbor]) {
    neighbors.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.track.identifier.cmp(&b.track.identifier))
    });
}
