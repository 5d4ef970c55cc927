//! Per-dimension decomposition of the distance between two tracks.
//!
//! For each dimension the current track is cloned with just that dimension
//! set to the candidate's value, and the distance it alone produces is
//! reported next to the total.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use ambitus_core::model::{Dimension, Track};

use crate::distance::{pca_distance, DistanceEngine, DistanceMode, PcaSubmode};
use crate::error::{SearchError, SearchResult};
use crate::pca::PcaTransform;
use crate::weights::FeatureWeights;

/// The distance being decomposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionMode {
    Feature,
    Pca(PcaSubmode),
}

impl fmt::Display for ContributionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feature => f.write_str("feature"),
            Self::Pca(sub) => write!(f, "pca:{}", sub.as_str()),
        }
    }
}

impl FromStr for ContributionMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<DistanceMode>()? {
            DistanceMode::Feature => Ok(Self::Feature),
            DistanceMode::Pca(sub) => Ok(Self::Pca(sub)),
            other => Err(SearchError::InvalidParameter(format!(
                "contribution analysis does not support {other} distance"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContributionOptions {
    pub mode: ContributionMode,

    /// Listed first; every other slice is also expressed relative to it.
    pub reference: Dimension,
}

impl Default for ContributionOptions {
    fn default() -> Self {
        Self {
            mode: ContributionMode::Pca(PcaSubmode::PrimaryD),
            reference: Dimension::Bpm,
        }
    }
}

/// What one dimension contributes on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionSlice {
    pub key: Dimension,

    /// The candidate's value on this dimension.
    pub value: f64,
    pub delta: f64,

    /// Distance produced by changing only this dimension.
    pub distance: f64,

    /// `distance / total`, or 0 when the total is 0.
    pub fraction: f64,

    /// `distance / reference distance`, or 0 when that is 0.
    pub relative: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionReport {
    pub current: String,
    pub candidate: String,
    pub mode: ContributionMode,
    pub total: f64,
    pub reference: Dimension,

    /// Reference dimension first, then the rest in catalog order.
    pub slices: Vec<ContributionSlice>,
}

#[derive(Debug, Clone, Copy)]
pub struct ContributionAnalyzer<'a> {
    dimensions: &'a [Dimension],
    transform: &'a PcaTransform,
    weights: &'a FeatureWeights,
}

impl<'a> ContributionAnalyzer<'a> {
    #[must_use]
    pub const fn new(
        dimensions: &'a [Dimension],
        transform: &'a PcaTransform,
        weights: &'a FeatureWeights,
    ) -> Self {
        Self {
            dimensions,
            transform,
            weights,
        }
    }

    /// Decompose the distance from `current` to `candidate`.
    ///
    /// PCA totals compare freshly projected coordinates on both sides, so
    /// the slices and the total come from the same projection.
    ///
    /// # Errors
    ///
    /// Fails when the reference dimension is not active, when a PCA mode
    /// reads a component without transform weights, or when either track
    /// lacks a feature the analysis needs.
    pub fn analyze(
        &self,
        current: &Track,
        candidate: &Track,
        options: &ContributionOptions,
    ) -> SearchResult<ContributionReport> {
        if !self.dimensions.contains(&options.reference) {
            return Err(SearchError::InvalidParameter(format!(
                "reference dimension {} is not active in this catalog",
                options.reference
            )));
        }

        let engine = DistanceEngine::new(self.dimensions, self.weights);
        let projected = match options.mode {
            ContributionMode::Feature => None,
            ContributionMode::Pca(sub) => {
                self.transform.require(sub)?;
                Some((
                    self.transform
                        .recompute_all(&current.features, current.pca.as_ref())?,
                    self.transform
                        .recompute_all(&candidate.features, candidate.pca.as_ref())?,
                ))
            }
        };
        let total = match (options.mode, &projected) {
            (ContributionMode::Pca(sub), Some((from, to))) => pca_distance(from, to, sub),
            _ => engine.feature(current, candidate)?,
        };

        let order = std::iter::once(options.reference).chain(
            self.dimensions
                .iter()
                .copied()
                .filter(|&d| d != options.reference),
        );

        let mut slices = Vec::with_capacity(self.dimensions.len());
        for key in order {
            let missing = |track: &Track| SearchError::MissingFeature {
                track: track.identifier.clone(),
                dimension: key,
            };
            let from = current.feature(key).ok_or_else(|| missing(current))?;
            let value = candidate.feature(key).ok_or_else(|| missing(candidate))?;
            let delta = value - from;

            let distance = match (options.mode, &projected) {
                (ContributionMode::Pca(sub), Some((baseline, _))) => {
                    let changed = self.transform.counterfactual(
                        &current.features,
                        current.pca.as_ref(),
                        key,
                        value,
                    )?;
                    pca_distance(baseline, &changed.pca, sub)
                }
                _ => self.weights.weight(key) * delta.abs(),
            };

            slices.push(ContributionSlice {
                key,
                value,
                delta,
                distance,
                fraction: 0.0,
                relative: 0.0,
            });
        }

        let reference_distance = slices.first().map_or(0.0, |s| s.distance);
        for slice in &mut slices {
            slice.fraction = ratio(slice.distance, total);
            slice.relative = ratio(slice.distance, reference_distance);
        }

        Ok(ContributionReport {
            current: current.identifier.clone(),
            candidate: candidate.identifier.clone(),
            mode: options.mode,
            total,
            reference: options.reference,
            slices,
        })
    }
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambitus_core::model::{ComponentTerm, Features, Pca, PcaWeights, PRIMARY_D};

    const EPS: f64 = 1e-9;

    fn track(id: &str, bpm: f64, crest: f64, entropy: f64) -> Track {
        let features: Features = Dimension::BASE
            .into_iter()
            .map(|d| match d {
                Dimension::Bpm => (d, bpm),
                Dimension::Crest => (d, crest),
                Dimension::Entropy => (d, entropy),
                _ => (d, 0.5),
            })
            .collect();
        Track::new(id, features)
    }

    fn transform() -> PcaTransform {
        let mut weights = PcaWeights::new();
        for (feature, weight, scale) in [
            (Dimension::Bpm, 1.0, 20.0),
            (Dimension::Crest, 0.5, 1.0),
            (Dimension::Entropy, -1.0, 2.0),
        ] {
            weights.insert(
                PRIMARY_D,
                ComponentTerm {
                    feature,
                    weight,
                    mean: 0.0,
                    scale,
                },
            );
        }
        PcaTransform::new(weights)
    }

    #[test]
    fn test_feature_slices_sum_to_total() {
        let transform = transform();
        let weights = FeatureWeights::default().with_weight(Dimension::Bpm, 0.05);
        let analyzer = ContributionAnalyzer::new(&Dimension::BASE, &transform, &weights);
        let a = track("a", 120.0, 1.0, 3.0);
        let b = track("b", 130.0, 3.0, 2.0);

        let report = analyzer
            .analyze(
                &a,
                &b,
                &ContributionOptions {
                    mode: ContributionMode::Feature,
                    reference: Dimension::Crest,
                },
            )
            .unwrap();

        // 0.05 * 10 + 0.01 * 2 + 0.01 * 1
        assert!((report.total - 0.53).abs() < EPS);
        let fractions: f64 = report.slices.iter().map(|s| s.fraction).sum();
        assert!((fractions - 1.0).abs() < EPS);
        assert_eq!(report.slices.len(), Dimension::BASE.len());

        let first = &report.slices[0];
        assert_eq!(first.key, Dimension::Crest);
        assert_eq!(first.value, 3.0);
        assert_eq!(first.delta, 2.0);
        assert!((first.relative - 1.0).abs() < EPS);

        let bpm = report.slices.iter().find(|s| s.key == Dimension::Bpm).unwrap();
        assert!((bpm.distance - 0.5).abs() < EPS);
        assert!((bpm.relative - 25.0).abs() < EPS);
    }

    #[test]
    fn test_pca_slices_isolate_each_dimension() {
        let transform = transform();
        let weights = FeatureWeights::default();
        let analyzer = ContributionAnalyzer::new(&Dimension::BASE, &transform, &weights);
        let a = track("a", 120.0, 1.0, 3.0);
        let b = track("b", 140.0, 2.0, 3.0);

        let report = analyzer
            .analyze(&a, &b, &ContributionOptions::default())
            .unwrap();

        // bpm moves primary_d by 1.0, crest by 0.5.
        assert!((report.total - 1.5).abs() < EPS);
        assert_eq!(report.slices[0].key, Dimension::Bpm);
        assert!((report.slices[0].distance - 1.0).abs() < EPS);
        let crest = report.slices.iter().find(|s| s.key == Dimension::Crest).unwrap();
        assert!((crest.distance - 0.5).abs() < EPS);
        assert!((crest.fraction - 1.0 / 3.0).abs() < EPS);
        assert!((crest.relative - 0.5).abs() < EPS);
        let entropy = report.slices.iter().find(|s| s.key == Dimension::Entropy).unwrap();
        assert_eq!(entropy.distance, 0.0);
    }

    #[test]
    fn test_identical_tracks_have_zero_fractions() {
        let transform = transform();
        let weights = FeatureWeights::default();
        let analyzer = ContributionAnalyzer::new(&Dimension::BASE, &transform, &weights);
        let a = track("a", 120.0, 1.0, 3.0);

        let report = analyzer
            .analyze(&a, &a, &ContributionOptions::default())
            .unwrap();
        assert_eq!(report.total, 0.0);
        assert!(report.slices.iter().all(|s| s.fraction == 0.0 && s.relative == 0.0));
    }

    #[test]
    fn test_pca_mode_without_weights_fails() {
        let transform = PcaTransform::default();
        let weights = FeatureWeights::default();
        let analyzer = ContributionAnalyzer::new(&Dimension::BASE, &transform, &weights);
        let a = track("a", 120.0, 1.0, 3.0).with_pca(Pca::default());
        let b = track("b", 140.0, 2.0, 3.0).with_pca(Pca {
            primary_d: 3.0,
            ..Pca::default()
        });

        assert!(matches!(
            analyzer.analyze(&a, &b, &ContributionOptions::default()),
            Err(SearchError::UnknownComponent(name)) if name == PRIMARY_D
        ));
    }

    #[test]
    fn test_domain_mode_needs_every_component() {
        // Only primary_d weights exist; tonal_pc1..3 are missing.
        let transform = transform();
        let weights = FeatureWeights::default();
        let analyzer = ContributionAnalyzer::new(&Dimension::BASE, &transform, &weights);
        let a = track("a", 120.0, 1.0, 3.0);
        let b = track("b", 140.0, 2.0, 3.0);
        let options = ContributionOptions {
            mode: ContributionMode::Pca(PcaSubmode::Tonal),
            ..ContributionOptions::default()
        };
        assert!(matches!(
            analyzer.analyze(&a, &b, &options),
            Err(SearchError::UnknownComponent(_))
        ));

        let options = ContributionOptions {
            mode: ContributionMode::Feature,
            ..ContributionOptions::default()
        };
        assert!(analyzer.analyze(&a, &b, &options).is_ok());
    }

    #[test]
    fn test_inactive_reference_rejected() {
        let transform = transform();
        let weights = FeatureWeights::default();
        let analyzer = ContributionAnalyzer::new(&Dimension::BASE, &transform, &weights);
        let a = track("a", 120.0, 1.0, 3.0);
        let options = ContributionOptions {
            reference: Dimension::Opb,
            ..ContributionOptions::default()
        };
        assert!(matches!(
            analyzer.analyze(&a, &a, &options),
            Err(SearchError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            "feature".parse::<ContributionMode>().unwrap(),
            ContributionMode::Feature
        );
        assert_eq!(
            "pca:spectral".parse::<ContributionMode>().unwrap(),
            ContributionMode::Pca(PcaSubmode::Spectral)
        );
        assert!("vae".parse::<ContributionMode>().is_err());
    }
}
