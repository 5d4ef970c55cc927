//! Import a JSON catalog document into the store.
//!
//! ```json
//! {
//!   "tracks": [{"identifier": "...", "features": {"bpm": 120.0, ...}, "pca": {...}}],
//!   "calibration": [{"mode": "pca", "resolution": "magnifying_glass", ...}],
//!   "pca_weights": [{"component": "primary_d", "feature": "bpm", ...}]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use ambitus_core::model::{CalibrationBucket, PcaTransformWeight, Track};
use ambitus_core::schema::Database;

use crate::error::{LoadError, LoadResult};

/// Everything a catalog store holds, as one serializable document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub tracks: Vec<Track>,

    #[serde(default)]
    pub calibration: Vec<CalibrationBucket>,

    #[serde(default)]
    pub pca_weights: Vec<PcaTransformWeight>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub tracks: usize,
    pub skipped_tracks: usize,
    pub calibration_buckets: usize,
    pub pca_weights: usize,
}

/// Read a document from `path` and write it into `db`.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed, or a write fails.
pub fn import_file(db: &Database, path: &Path) -> LoadResult<ImportSummary> {
    let import_error = |message: String| LoadError::Import {
        path: path.display().to_string(),
        message,
    };
    let content = std::fs::read_to_string(path).map_err(|e| import_error(e.to_string()))?;
    let document: CatalogDocument =
        serde_json::from_str(&content).map_err(|e| import_error(e.to_string()))?;
    log::info!(
        "Importing {} tracks, {} calibration buckets and {} PCA weights from {}",
        document.tracks.len(),
        document.calibration.len(),
        document.pca_weights.len(),
        path.display()
    );
    import_document(db, &document)
}

/// Write a document into `db` in a single transaction.
///
/// Existing rows with the same keys are replaced. Tracks with an empty
/// identifier are skipped.
///
/// # Errors
///
/// Fails when a write fails; nothing is committed in that case.
pub fn import_document(db: &Database, document: &CatalogDocument) -> LoadResult<ImportSummary> {
    let tx = db
        .conn()
        .unchecked_transaction()
        .map_err(ambitus_core::Error::from)?;

    let mut summary = ImportSummary::default();
    for track in &document.tracks {
        if track.identifier.trim().is_empty() {
            log::warn!("Skipping imported track with an empty identifier");
            summary.skipped_tracks += 1;
            continue;
        }
        db.upsert_track(track)?;
        summary.tracks += 1;
    }
    for bucket in &document.calibration {
        db.upsert_calibration(bucket)?;
        summary.calibration_buckets += 1;
    }
    for weight in &document.pca_weights {
        db.upsert_pca_weight(weight)?;
        summary.pca_weights += 1;
    }

    tx.commit().map_err(ambitus_core::Error::from)?;
    Ok(summary)
}
