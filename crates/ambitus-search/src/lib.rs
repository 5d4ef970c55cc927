//! Similarity search and directional exploration for ambitus.
//!
//! Builds a k-d tree over a [`Catalog`](ambitus_core::Catalog), measures
//! distances in raw feature, PCA and latent space, and runs calibrated
//! annular searches and directional exploration on top.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod calibrated;
pub mod contribution;
pub mod distance;
pub mod engine;
pub mod error;
pub mod explore;
pub mod kdtree;
pub mod pca;
pub mod weights;

pub use calibrated::{CalibratedRadiusSearch, CalibratedResult, Radii, RadiusOptions, RadiusSource};
pub use contribution::{
    ContributionAnalyzer, ContributionMode, ContributionOptions, ContributionReport,
    ContributionSlice,
};
pub use distance::{DistanceEngine, DistanceMode, PcaSubmode};
pub use engine::{CatalogHandle, IndexedCatalog, SearchEngine, SearchOutcome, SearchParams};
pub use error::{SearchError, SearchResult};
pub use explore::{
    DirectionalExplorer, Exploration, ExploreCandidate, ExploreDiagnostics, ExploreOptions,
};
pub use kdtree::{Neighbor, SpatialIndex};
pub use pca::{PcaTransform, ProjectedTrack};
pub use weights::FeatureWeights;
