//! The query facade and the swappable catalog handle.

use arc_swap::ArcSwap;
use std::sync::Arc;

use ambitus_core::model::{Resolution, Track};
use ambitus_core::{Catalog, DimensionStats};

use crate::calibrated::{
    sort_neighbors, CalibratedRadiusSearch, CalibratedResult, Radii, RadiusOptions, RadiusSource,
};
use crate::contribution::{ContributionAnalyzer, ContributionOptions, ContributionReport};
use crate::distance::{DistanceMode, PcaSubmode};
use crate::error::{SearchError, SearchResult};
use crate::explore::{DirectionalExplorer, ExploreOptions, Exploration};
use crate::kdtree::{Neighbor, SpatialIndex};
use crate::pca::PcaTransform;
use crate::weights::FeatureWeights;

/// Radius for raw-feature searches when the caller gives none.
pub const DEFAULT_FEATURE_RADIUS: f64 = 0.3;

/// A catalog together with the structures derived from it.
#[derive(Debug)]
pub struct IndexedCatalog {
    catalog: Catalog,
    index: SpatialIndex,
    transform: PcaTransform,
}

impl IndexedCatalog {
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        let index = SpatialIndex::build(&catalog);
        let transform = PcaTransform::new(catalog.pca_weights().clone());
        Self {
            catalog,
            index,
            transform,
        }
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn index(&self) -> &SpatialIndex {
        &self.index
    }

    #[must_use]
    pub const fn transform(&self) -> &PcaTransform {
        &self.transform
    }

    fn track(&self, identifier: &str) -> SearchResult<&Arc<Track>> {
        self.catalog
            .get(identifier)
            .ok_or_else(|| SearchError::TrackNotFound(identifier.to_string()))
    }
}

/// Shared, atomically replaceable catalog.
///
/// Readers take a snapshot and keep using it for the whole query even if a
/// new catalog is swapped in meanwhile.
#[derive(Debug)]
pub struct CatalogHandle {
    current: ArcSwap<IndexedCatalog>,
}

impl CatalogHandle {
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: ArcSwap::from_pointee(IndexedCatalog::new(catalog)),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<IndexedCatalog> {
        self.current.load_full()
    }

    /// Index `catalog` and make it the current one.
    pub fn replace(&self, catalog: Catalog) {
        let indexed = IndexedCatalog::new(catalog);
        log::info!(
            "Swapping in catalog with {} tracks",
            indexed.catalog().len()
        );
        self.current.store(Arc::new(indexed));
    }
}

/// Parameters for [`SearchEngine::search`].
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub mode: DistanceMode,
    pub resolution: Resolution,
    pub limit: usize,

    /// Radius for feature-mode searches.
    pub feature_radius: Option<f64>,

    /// Radii for PCA and latent searches, bypassing calibration.
    pub override_radii: Option<Radii>,
    pub apply_scaling: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            mode: DistanceMode::Auto,
            resolution: Resolution::MagnifyingGlass,
            limit: crate::calibrated::DEFAULT_LIMIT,
            feature_radius: None,
            override_radii: None,
            apply_scaling: true,
        }
    }
}

impl SearchParams {
    const fn radius_options(&self) -> RadiusOptions {
        RadiusOptions {
            resolution: self.resolution,
            override_radii: self.override_radii,
            apply_scaling: self.apply_scaling,
            limit: self.limit,
        }
    }
}

/// A distance mode with `Auto` already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryMode {
    Feature,
    Pca(PcaSubmode),
    Vae,
}

impl QueryMode {
    fn resolve(mode: DistanceMode, center: &Track) -> Self {
        match mode {
            DistanceMode::Feature => Self::Feature,
            DistanceMode::Pca(submode) => Self::Pca(submode),
            DistanceMode::Vae => Self::Vae,
            DistanceMode::Auto if center.vae.is_some() => Self::Vae,
            DistanceMode::Auto if center.pca.is_some() => Self::Pca(PcaSubmode::PrimaryD),
            DistanceMode::Auto => Self::Feature,
        }
    }
}

impl From<QueryMode> for DistanceMode {
    fn from(mode: QueryMode) -> Self {
        match mode {
            QueryMode::Feature => Self::Feature,
            QueryMode::Pca(submode) => Self::Pca(submode),
            QueryMode::Vae => Self::Vae,
        }
    }
}

/// Result of [`SearchEngine::search`].
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// The mode actually searched; never `Auto`.
    pub mode: DistanceMode,
    pub neighbors: Vec<Neighbor>,
    pub radii: Radii,
    pub source: RadiusSource,
    pub scaling_factor: f64,

    /// A calibrated mode had no bucket and fell back to default radii.
    pub degraded: bool,
}

impl SearchOutcome {
    fn calibrated(mode: DistanceMode, result: CalibratedResult) -> Self {
        Self {
            mode,
            neighbors: result.neighbors,
            radii: result.radii,
            source: result.source,
            scaling_factor: result.scaling_factor,
            degraded: result.degraded,
        }
    }
}

/// Entry point for all queries.
#[derive(Debug)]
pub struct SearchEngine {
    handle: CatalogHandle,
    weights: FeatureWeights,
}

impl SearchEngine {
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            handle: CatalogHandle::new(catalog),
            weights: FeatureWeights::default(),
        }
    }

    #[must_use]
    pub fn with_weights(mut self, weights: FeatureWeights) -> Self {
        self.weights = weights;
        self
    }

    #[must_use]
    pub const fn handle(&self) -> &CatalogHandle {
        &self.handle
    }

    #[must_use]
    pub const fn weights(&self) -> &FeatureWeights {
        &self.weights
    }

    /// Neighbors of `center_id`, nearest first, with the radii used.
    ///
    /// `Auto` picks latent search when the center has an embedding, PCA
    /// when it has coordinates, and raw features otherwise.
    pub fn search(&self, center_id: &str, params: &SearchParams) -> SearchResult<SearchOutcome> {
        let snapshot = self.handle.snapshot();
        let center = snapshot.track(center_id)?;

        let mode = QueryMode::resolve(params.mode, center);
        log::debug!(
            "Searching around {} with {} distance",
            center_id,
            DistanceMode::from(mode)
        );

        let calibrated =
            CalibratedRadiusSearch::new(snapshot.index(), snapshot.catalog().calibration());
        let outcome = match mode {
            QueryMode::Feature => {
                let (radius, source) = match params.feature_radius {
                    Some(radius) => (radius, RadiusSource::Override),
                    None => (DEFAULT_FEATURE_RADIUS, RadiusSource::Default),
                };
                let mut neighbors = snapshot
                    .index()
                    .radius_search(center, radius, &self.weights)?;
                sort_neighbors(&mut neighbors);
                neighbors.truncate(params.limit);
                SearchOutcome {
                    mode: DistanceMode::Feature,
                    neighbors,
                    radii: Radii::disk(radius),
                    source,
                    scaling_factor: 1.0,
                    degraded: false,
                }
            }
            QueryMode::Pca(submode) => SearchOutcome::calibrated(
                DistanceMode::Pca(submode),
                calibrated.pca(center, submode, &params.radius_options())?,
            ),
            QueryMode::Vae => SearchOutcome::calibrated(
                DistanceMode::Vae,
                calibrated.vae(center, &params.radius_options())?,
            ),
        };
        Ok(outcome)
    }

    /// Candidates that move from `center_id` in the named direction.
    pub fn explore_direction(
        &self,
        center_id: &str,
        direction_key: &str,
        options: &ExploreOptions,
    ) -> SearchResult<Exploration> {
        let snapshot = self.handle.snapshot();
        let center = snapshot.track(center_id)?;
        DirectionalExplorer::new(
            snapshot.catalog(),
            snapshot.index(),
            snapshot.transform(),
            &self.weights,
        )
        .explore(center, direction_key, options)
    }

    #[must_use]
    pub fn get_track(&self, identifier: &str) -> Option<Arc<Track>> {
        self.handle.snapshot().catalog().get(identifier).cloned()
    }

    #[must_use]
    pub fn get_stats(&self) -> Vec<DimensionStats> {
        self.handle.snapshot().catalog().stats()
    }

    /// Per-dimension breakdown of the distance between two tracks.
    pub fn analyze_contributions(
        &self,
        current_id: &str,
        candidate_id: &str,
        options: &ContributionOptions,
    ) -> SearchResult<ContributionReport> {
        let snapshot = self.handle.snapshot();
        let current = snapshot.track(current_id)?;
        let candidate = snapshot.track(candidate_id)?;
        ContributionAnalyzer::new(
            snapshot.catalog().dimensions(),
            snapshot.transform(),
            &self.weights,
        )
        .analyze(current, candidate, options)
    }

    /// Rebuild the index for `catalog` and swap it in.
    pub fn replace_catalog(&self, catalog: Catalog) {
        self.handle.replace(catalog);
    }
}
