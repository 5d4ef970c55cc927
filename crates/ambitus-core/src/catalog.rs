//! The immutable in-memory catalog.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{CalibrationTable, Dimension, PcaWeights, Track};

/// Summary of one dimension across the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionStats {
    pub dimension: Dimension,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub mean: f64,
}

/// A fully materialized, read-only collection of tracks plus the reference
/// data (calibration, PCA transform weights) that queries need.
///
/// The catalog is never patched: a changed library produces a new catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    tracks: Vec<Arc<Track>>,
    by_id: HashMap<String, usize>,
    dimensions: Vec<Dimension>,
    calibration: CalibrationTable,
    pca_weights: PcaWeights,
}

impl Catalog {
    /// Build a catalog.
    ///
    /// Every track must carry all base dimensions. Algebraic dimensions
    /// become active only when every track carries them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Duplicate`] for a repeated identifier and
    /// [`Error::InvalidData`] for a track missing a base dimension.
    pub fn new(
        tracks: Vec<Track>,
        calibration: CalibrationTable,
        pca_weights: PcaWeights,
    ) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(tracks.len());
        for (index, track) in tracks.iter().enumerate() {
            if let Some(dimension) = Dimension::BASE
                .into_iter()
                .find(|d| !track.features.contains(*d))
            {
                return Err(Error::InvalidData(format!(
                    "track {} is missing base dimension {}",
                    track.identifier, dimension
                )));
            }
            if by_id.insert(track.identifier.clone(), index).is_some() {
                return Err(Error::Duplicate {
                    entity: "track",
                    id: track.identifier.clone(),
                });
            }
        }

        let mut dimensions = Dimension::BASE.to_vec();
        for dimension in Dimension::ALGEBRAIC {
            if tracks.iter().all(|t| t.features.contains(dimension)) {
                dimensions.push(dimension);
            } else {
                log::info!(
                    "Algebraic dimension {} is not present on every track; excluding it",
                    dimension
                );
            }
        }

        log::debug!(
            "Catalog built with {} tracks over {} dimensions",
            tracks.len(),
            dimensions.len()
        );

        Ok(Self {
            tracks: tracks.into_iter().map(Arc::new).collect(),
            by_id,
            dimensions,
            calibration,
            pca_weights,
        })
    }

    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&Arc<Track>> {
        self.by_id.get(identifier).map(|&i| &self.tracks[i])
    }

    #[must_use]
    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Active dimensions, in split-cycling order.
    #[must_use]
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    #[must_use]
    pub const fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    #[must_use]
    pub const fn pca_weights(&self) -> &PcaWeights {
        &self.pca_weights
    }

    /// Feature vector of a track over the active dimensions.
    ///
    /// Returns `None` if the track lacks any active dimension.
    #[must_use]
    pub fn vector(&self, track: &Track) -> Option<Vec<f64>> {
        self.dimensions.iter().map(|d| track.feature(*d)).collect()
    }

    /// Per-dimension min/max/median/mean over the catalog.
    #[must_use]
    pub fn stats(&self) -> Vec<DimensionStats> {
        self.dimensions
            .iter()
            .filter_map(|&dimension| {
                let mut values: Vec<f64> = self
                    .tracks
                    .iter()
                    .filter_map(|t| t.feature(dimension))
                    .filter(|v| v.is_finite())
                    .collect();
                if values.is_empty() {
                    return None;
                }
                values.sort_by(f64::total_cmp);

                let count = values.len();
                let mid = count / 2;
                let median = if count % 2 == 0 {
                    (values[mid - 1] + values[mid]) / 2.0
                } else {
                    values[mid]
                };
                let mean = values.iter().sum::<f64>() / count as f64;

                Some(DimensionStats {
                    dimension,
                    count,
                    min: values[0],
                    max: values[count - 1],
                    median,
                    mean,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Features;

    fn track(id: &str, bpm: f64) -> Track {
        let features: Features = Dimension::BASE
            .into_iter()
            .map(|d| (d, if d == Dimension::Bpm { bpm } else { 0.5 }))
            .collect();
        Track::new(id, features)
    }

    fn catalog(tracks: Vec<Track>) -> Result<Catalog> {
        Catalog::new(tracks, CalibrationTable::new(), PcaWeights::new())
    }

    #[test]
    fn test_lookup() {
        let catalog = catalog(vec![track("a", 100.0), track("b", 120.0)]).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("b").unwrap().feature(Dimension::Bpm), Some(120.0));
        assert!(catalog.get("c").is_none());
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let result = catalog(vec![track("a", 100.0), track("a", 120.0)]);
        assert!(matches!(result, Err(Error::Duplicate { .. })));
    }

    #[test]
    fn test_missing_base_dimension_rejected() {
        let mut t = track("a", 100.0);
        t.features = t
            .features
            .iter()
            .filter(|(d, _)| *d != Dimension::Crest)
            .collect();
        assert!(matches!(catalog(vec![t]), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_algebraic_dimensions_only_when_universal() {
        let mut a = track("a", 100.0);
        let mut b = track("b", 120.0);
        a.features.insert(Dimension::Opb, 1.0);
        b.features.insert(Dimension::Opb, 2.0);
        a.features.insert(Dimension::SpectralSlope, 0.1);

        let catalog = catalog(vec![a, b]).unwrap();
        assert!(catalog.dimensions().contains(&Dimension::Opb));
        assert!(!catalog.dimensions().contains(&Dimension::SpectralSlope));
        assert_eq!(catalog.dimensions().len(), 19);
    }

    #[test]
    fn test_vector_follows_dimension_order() {
        let catalog = catalog(vec![track("a", 100.0)]).unwrap();
        let vector = catalog.vector(&catalog.tracks()[0]).unwrap();
        assert_eq!(vector.len(), catalog.dimensions().len());
        assert_eq!(vector[0], 100.0);
    }

    #[test]
    fn test_stats() {
        let catalog = catalog(vec![
            track("a", 100.0),
            track("b", 140.0),
            track("c", 120.0),
            track("d", 130.0),
        ])
        .unwrap();
        let stats = catalog.stats();
        let bpm = stats.iter().find(|s| s.dimension == Dimension::Bpm).unwrap();
        assert_eq!(bpm.count, 4);
        assert_eq!(bpm.min, 100.0);
        assert_eq!(bpm.max, 140.0);
        assert!((bpm.median - 125.0).abs() < 1e-12);
        assert!((bpm.mean - 122.5).abs() < 1e-12);
    }

    #[test]
    fn test_stats_empty_catalog() {
        let catalog = catalog(Vec::new()).unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.stats().is_empty());
    }
}
