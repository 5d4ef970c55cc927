//! Catalog loading error types.

use ambitus_core::model::CalibrationMode;
use thiserror::Error;

/// Errors that can occur while loading or importing a catalog.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A required calibration mode has no buckets at all.
    #[error("no {mode} calibration found; run calibration or allow missing calibration")]
    MissingCalibration { mode: CalibrationMode },

    /// An import document could not be read or parsed.
    #[error("failed to import {path}: {message}")]
    Import { path: String, message: String },

    /// An error propagated from the core domain layer.
    #[error("store error: {0}")]
    Store(#[from] ambitus_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LoadError {
    /// Returns `true` when the failure is a setup problem the operator can
    /// fix by calibrating or changing configuration.
    pub fn is_setup(&self) -> bool {
        matches!(self, Self::MissingCalibration { .. })
    }
}

/// Convenience alias for loading results.
pub type LoadResult<T> = std::result::Result<T, LoadError>;
