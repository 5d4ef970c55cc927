//! Query-time error types.

use ambitus_core::model::Dimension;
use thiserror::Error;

/// Errors a search or exploration query can report.
///
/// Missing data is always reported, never coerced into a zero distance.
#[derive(Debug, Error)]
pub enum SearchError {
    /// No track with this identifier is in the catalog.
    #[error("track not found: {0}")]
    TrackNotFound(String),

    /// The distance mode needs PCA coordinates the track does not have.
    #[error("track {track} has no PCA coordinates")]
    MissingPca { track: String },

    /// The distance mode needs a latent embedding the track does not have.
    #[error("track {track} has no latent embedding")]
    MissingLatent { track: String },

    /// A feature value required by the query is absent.
    #[error("track {track} is missing feature {dimension}")]
    MissingFeature { track: String, dimension: Dimension },

    /// A PCA projection references a feature the input does not carry.
    #[error("PCA component {component} needs feature {dimension}")]
    MissingProjectionFeature {
        component: String,
        dimension: Dimension,
    },

    /// No transform weights are stored for this PCA component.
    #[error("no PCA weights for component {0}")]
    UnknownComponent(String),

    /// A caller-supplied parameter is out of range or unparseable.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A feature weights file could not be read or parsed.
    #[error("failed to load weights from {path}: {message}")]
    Weights { path: String, message: String },

    /// An error propagated from the core domain layer.
    #[error("catalog error: {0}")]
    Catalog(#[from] ambitus_core::Error),
}

impl SearchError {
    /// Returns `true` when the error is caused by data a track lacks.
    pub fn is_missing_data(&self) -> bool {
        matches!(
            self,
            Self::MissingPca { .. }
                | Self::MissingLatent { .. }
                | Self::MissingFeature { .. }
                | Self::MissingProjectionFeature { .. }
        )
    }
}

/// Convenience alias for search results.
pub type SearchResult<T> = std::result::Result<T, SearchError>;
