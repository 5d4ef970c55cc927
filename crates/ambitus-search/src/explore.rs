//! Directional exploration.
//!
//! Given a current track and a direction such as "faster", find tracks that
//! move along that one dimension while staying close on every other one.
//!
//! The pipeline runs in stages:
//!
//! 1. resolve the direction key to a dimension and polarity
//! 2. pick a feature-space radius from the PCA calibration
//! 3. gather raw-feature neighbors
//! 4. keep neighbors whose delta has the requested sign
//! 5. locality: drop candidates that differ too much on some other axis
//! 6. threshold: drop candidates whose step is too small to notice
//! 7. rank by closeness on all dimensions except the navigated one
//!
//! Stages 5 and 6 never turn a non-empty candidate set into an empty one.

use std::sync::Arc;

use ambitus_core::model::{
    CalibrationBucket, CalibrationMode, Dimension, Direction, Discriminator, Polarity,
    Resolution, Track, PRIMARY_D,
};
use ambitus_core::Catalog;

use crate::distance::DistanceEngine;
use crate::error::{SearchError, SearchResult};
use crate::kdtree::SpatialIndex;
use crate::pca::PcaTransform;
use crate::weights::FeatureWeights;

/// Converts a PCA outer radius into a raw-feature search radius.
pub const PCA_TO_FEATURE_RADIUS_FACTOR: f64 = 4.0;

/// Feature-space radius when no PCA calibration is available.
pub const FALLBACK_EXPLORE_RADIUS: f64 = 1.0;

pub const DEFAULT_EXPLORE_LIMIT: usize = 50;

/// Slack on the minimum-delta comparison to absorb rounding.
pub const MINIMUM_DELTA_TOLERANCE: f64 = 0.999;

/// Percentile of |delta| used as the minimum step without calibration.
pub const FALLBACK_DELTA_PERCENTILE: f64 = 0.25;

#[derive(Debug, Clone, Copy)]
pub struct ExploreOptions {
    pub resolution: Resolution,
    pub limit: usize,

    /// Feature-space radius, bypassing the calibrated one.
    pub radius: Option<f64>,
}

impl Default for ExploreOptions {
    fn default() -> Self {
        Self {
            resolution: Resolution::MagnifyingGlass,
            limit: DEFAULT_EXPLORE_LIMIT,
            radius: None,
        }
    }
}

/// One ranked exploration result.
#[derive(Debug, Clone)]
pub struct ExploreCandidate {
    pub track: Arc<Track>,

    /// Candidate value minus current value on the navigated dimension.
    pub delta: f64,

    /// Weighted distance over every other dimension; the ranking key.
    pub similarity: f64,

    /// Full weighted feature distance from the neighborhood query.
    pub feature_distance: f64,
}

/// How the pipeline behaved for one query.
#[derive(Debug, Clone, Default)]
pub struct ExploreDiagnostics {
    /// The direction key was unknown and the default direction was used.
    pub direction_fallback: bool,
    pub radius: f64,
    pub radius_calibrated: bool,

    /// Neighbors returned by the radius search.
    pub considered: usize,

    /// Neighbors left after the direction filter.
    pub direction_matched: usize,

    pub locality_applied: bool,
    pub locality_rejected: usize,
    pub locality_fallback: bool,

    pub threshold_rejected: usize,
    pub threshold_fallback: bool,

    /// Share of direction-matched candidates dropped by later stages.
    pub rejection_rate: f64,
}

/// Result of a directional exploration.
#[derive(Debug, Clone)]
pub struct Exploration {
    pub direction: Direction,
    pub current_value: f64,
    pub minimum_delta: f64,

    /// Candidates surviving all filters, before truncation to the limit.
    pub total_available: usize,
    pub candidates: Vec<ExploreCandidate>,
    pub diagnostics: ExploreDiagnostics,
}

impl Exploration {
    #[must_use]
    pub const fn dimension(&self) -> Dimension {
        self.direction.dimension
    }

    #[must_use]
    pub const fn polarity(&self) -> Polarity {
        self.direction.polarity
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    track: Arc<Track>,
    delta: f64,
    feature_distance: f64,
}

/// Runs directional exploration against one catalog snapshot.
#[derive(Debug, Clone, Copy)]
pub struct DirectionalExplorer<'a> {
    catalog: &'a Catalog,
    index: &'a SpatialIndex,
    transform: &'a PcaTransform,
    weights: &'a FeatureWeights,
}

impl<'a> DirectionalExplorer<'a> {
    #[must_use]
    pub const fn new(
        catalog: &'a Catalog,
        index: &'a SpatialIndex,
        transform: &'a PcaTransform,
        weights: &'a FeatureWeights,
    ) -> Self {
        Self {
            catalog,
            index,
            transform,
            weights,
        }
    }

    /// Explore from `current` in the direction named by `direction_key`.
    ///
    /// Unknown keys fall back to `bpm` upward with a warning.
    ///
    /// # Errors
    ///
    /// Fails when the current track lacks the navigated dimension or any
    /// active dimension needed by the neighborhood query.
    pub fn explore(
        &self,
        current: &Track,
        direction_key: &str,
        options: &ExploreOptions,
    ) -> SearchResult<Exploration> {
        let mut diagnostics = ExploreDiagnostics::default();

        let direction = Direction::resolve(direction_key).unwrap_or_else(|| {
            log::warn!(
                "Unknown direction '{}'; defaulting to bpm upward",
                direction_key
            );
            diagnostics.direction_fallback = true;
            Direction::new(Dimension::Bpm, Polarity::Positive)
        });
        let dimension = direction.dimension;
        let current_value =
            current
                .feature(dimension)
                .ok_or_else(|| SearchError::MissingFeature {
                    track: current.identifier.clone(),
                    dimension,
                })?;

        let bucket = self.catalog.calibration().get(
            CalibrationMode::Pca,
            options.resolution,
            Discriminator::PrimaryD,
        );
        let radius = match (options.radius, bucket) {
            (Some(radius), _) => radius,
            (None, Some(bucket)) => {
                diagnostics.radius_calibrated = true;
                bucket.outer_radius * PCA_TO_FEATURE_RADIUS_FACTOR
            }
            (None, None) => {
                log::warn!(
                    "No primary_d calibration at {}; exploring with radius {}",
                    options.resolution,
                    FALLBACK_EXPLORE_RADIUS
                );
                FALLBACK_EXPLORE_RADIUS
            }
        };
        diagnostics.radius = radius;

        let neighbors = self.index.radius_search(current, radius, self.weights)?;
        diagnostics.considered = neighbors.len();

        let matched: Vec<Candidate> = neighbors
            .into_iter()
            .filter_map(|n| {
                let delta = n.track.feature(dimension)? - current_value;
                direction.polarity.matches(delta).then_some(Candidate {
                    track: n.track,
                    delta,
                    feature_distance: n.distance,
                })
            })
            .collect();
        diagnostics.direction_matched = matched.len();
        log::debug!(
            "Exploring {} from {}: {} of {} neighbors match direction",
            direction,
            current.identifier,
            matched.len(),
            diagnostics.considered
        );

        let local = self.locality_filter(current, dimension, matched, bucket, &mut diagnostics)?;
        let (kept, minimum_delta) = Self::threshold_filter(current, local, bucket, &mut diagnostics);

        let engine = DistanceEngine::new(self.catalog.dimensions(), self.weights);
        let mut ranked = kept
            .into_iter()
            .map(|c| {
                let similarity = engine.feature_excluding(current, &c.track, Some(dimension))?;
                Ok(ExploreCandidate {
                    track: c.track,
                    delta: c.delta,
                    similarity,
                    feature_distance: c.feature_distance,
                })
            })
            .collect::<SearchResult<Vec<_>>>()?;
        ranked.sort_by(|a, b| {
            a.similarity
                .total_cmp(&b.similarity)
                .then_with(|| a.track.identifier.cmp(&b.track.identifier))
        });

        let total_available = ranked.len();
        diagnostics.rejection_rate = if diagnostics.direction_matched == 0 {
            0.0
        } else {
            1.0 - total_available as f64 / diagnostics.direction_matched as f64
        };
        ranked.truncate(options.limit);

        Ok(Exploration {
            direction,
            current_value,
            minimum_delta,
            total_available,
            candidates: ranked,
            diagnostics,
        })
    }

    /// Reject candidates that, on any other dimension alone, would move the
    /// current track further than the bucket's inner radius in primary_d.
    fn locality_filter(
        &self,
        current: &Track,
        navigated: Dimension,
        candidates: Vec<Candidate>,
        bucket: Option<&CalibrationBucket>,
        diagnostics: &mut ExploreDiagnostics,
    ) -> SearchResult<Vec<Candidate>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let Some(bucket) = bucket else {
            log::warn!("No primary_d calibration; skipping locality filter");
            return Ok(candidates);
        };
        if !self.transform.has_primary() {
            log::warn!("No primary_d transform weights; skipping locality filter");
            return Ok(candidates);
        }
        let baseline = match self.transform.project(&current.features, PRIMARY_D) {
            Ok(value) => value,
            Err(e) => {
                log::warn!(
                    "Cannot project {} for locality filter ({}); skipping it",
                    current.identifier,
                    e
                );
                return Ok(candidates);
            }
        };
        diagnostics.locality_applied = true;

        let others: Vec<Dimension> = self
            .catalog
            .dimensions()
            .iter()
            .copied()
            .filter(|&d| d != navigated && !self.weights.is_ignored(d))
            .collect();

        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let mut local = true;
            for &dimension in &others {
                let Some(value) = candidate.track.feature(dimension) else {
                    continue;
                };
                let mut features = current.features.clone();
                features.insert(dimension, value);
                let isolated = (self.transform.project(&features, PRIMARY_D)? - baseline).abs();
                if isolated > bucket.inner_radius {
                    log::debug!(
                        "Locality rejects {}: {} alone moves primary_d by {:.4}",
                        candidate.track.identifier,
                        dimension,
                        isolated
                    );
                    local = false;
                    break;
                }
            }
            if local {
                kept.push(candidate.clone());
            }
        }

        diagnostics.locality_rejected = candidates.len() - kept.len();
        if kept.is_empty() {
            log::info!(
                "Locality filter rejected all {} candidates; keeping them unfiltered",
                candidates.len()
            );
            diagnostics.locality_fallback = true;
            return Ok(candidates);
        }
        Ok(kept)
    }

    /// Drop candidates whose step along the navigated dimension is too small.
    ///
    /// Returns the survivors and the minimum delta used.
    fn threshold_filter(
        current: &Track,
        candidates: Vec<Candidate>,
        bucket: Option<&CalibrationBucket>,
        diagnostics: &mut ExploreDiagnostics,
    ) -> (Vec<Candidate>, f64) {
        if candidates.is_empty() {
            return (candidates, 0.0);
        }

        let minimum_delta = bucket
            .and_then(|bucket| {
                let current_pd = current.pca.as_ref()?.primary_d;
                let mut ratios: Vec<f64> = candidates
                    .iter()
                    .filter_map(|c| {
                        let distance = (c.track.pca.as_ref()?.primary_d - current_pd).abs();
                        (distance > 0.0).then(|| c.delta.abs() / distance)
                    })
                    .collect();
                if ratios.is_empty() {
                    return None;
                }
                ratios.sort_by(f64::total_cmp);
                Some(percentile(&ratios, 0.5) * bucket.inner_radius)
            })
            .unwrap_or_else(|| {
                let mut deltas: Vec<f64> = candidates.iter().map(|c| c.delta.abs()).collect();
                deltas.sort_by(f64::total_cmp);
                percentile(&deltas, FALLBACK_DELTA_PERCENTILE)
            });

        let threshold = minimum_delta * MINIMUM_DELTA_TOLERANCE;
        let kept: Vec<Candidate> = candidates
            .iter()
            .filter(|c| c.delta.abs() >= threshold)
            .cloned()
            .collect();
        diagnostics.threshold_rejected = candidates.len() - kept.len();

        if kept.is_empty() {
            log::info!(
                "Minimum delta {:.4} rejected all {} candidates; keeping them unfiltered",
                minimum_delta,
                candidates.len()
            );
            diagnostics.threshold_fallback = true;
            return (candidates, minimum_delta);
        }
        (kept, minimum_delta)
    }
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}
