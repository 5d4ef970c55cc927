//! Recomputing PCA coordinates from raw features.
//!
//! Each component is a linear projection of standardized features:
//! `sum(weight * (value - mean) / scale)`. Terms with a zero scale are
//! skipped. The same projection powers counterfactual analysis: change one
//! feature, reproject, and see how far the track moved.

use std::collections::BTreeMap;

use ambitus_core::model::{
    Dimension, Features, Pca, PcaDomain, PcaWeights, Track, DOMAIN_COMPONENTS, PRIMARY_D,
};

use crate::distance::PcaSubmode;
use crate::error::{SearchError, SearchResult};

/// Largest acceptable gap between stored and recomputed `primary_d`.
pub const VALIDATION_TOLERANCE: f64 = 0.001;

/// Features plus freshly projected PCA coordinates.
///
/// Used for analysis-only pseudo-tracks that never enter the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedTrack {
    pub features: Features,
    pub pca: Pca,
}

/// Projection from raw features to PCA coordinates.
#[derive(Debug, Clone, Default)]
pub struct PcaTransform {
    weights: PcaWeights,
}

impl PcaTransform {
    #[must_use]
    pub const fn new(weights: PcaWeights) -> Self {
        Self { weights }
    }

    #[must_use]
    pub const fn weights(&self) -> &PcaWeights {
        &self.weights
    }

    /// Whether weights exist for the primary discriminator.
    #[must_use]
    pub fn has_primary(&self) -> bool {
        self.weights.has_component(PRIMARY_D)
    }

    /// Project features onto one named component.
    ///
    /// # Errors
    ///
    /// Fails when no weights exist for `component` or a weighted feature is
    /// missing from `features`.
    pub fn project(&self, features: &Features, component: &str) -> SearchResult<f64> {
        let terms = self
            .weights
            .component(component)
            .ok_or_else(|| SearchError::UnknownComponent(component.to_string()))?;

        let mut total = 0.0;
        for term in terms {
            let value = features.get(term.feature).ok_or_else(|| {
                SearchError::MissingProjectionFeature {
                    component: component.to_string(),
                    dimension: term.feature,
                }
            })?;
            if term.scale == 0.0 {
                continue;
            }
            total += term.weight * ((value - term.mean) / term.scale);
        }
        Ok(total)
    }

    /// Names of the components a PCA sub-mode reads.
    #[must_use]
    pub fn components_for(submode: PcaSubmode) -> Vec<String> {
        let domain_components = |domain: PcaDomain| {
            (0..DOMAIN_COMPONENTS).map(move |index| domain.component_name(index))
        };
        match submode {
            PcaSubmode::PrimaryD => vec![PRIMARY_D.to_string()],
            PcaSubmode::Tonal => domain_components(PcaDomain::Tonal).collect(),
            PcaSubmode::Spectral => domain_components(PcaDomain::Spectral).collect(),
            PcaSubmode::Rhythmic => domain_components(PcaDomain::Rhythmic).collect(),
            PcaSubmode::FullPca => std::iter::once(PRIMARY_D.to_string())
                .chain(PcaDomain::ALL.into_iter().flat_map(domain_components))
                .collect(),
        }
    }

    /// Check that every component `submode` reads has weights.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::UnknownComponent`] naming the first component
    /// without weights.
    pub fn require(&self, submode: PcaSubmode) -> SearchResult<()> {
        match Self::components_for(submode)
            .into_iter()
            .find(|name| !self.weights.has_component(name))
        {
            Some(name) => Err(SearchError::UnknownComponent(name)),
            None => Ok(()),
        }
    }

    /// Recompute every PCA coordinate that has weights.
    ///
    /// Components without weights keep their value from `base`, or 0.0 when
    /// there is no base.
    ///
    /// # Errors
    ///
    /// Fails when a weighted feature is missing.
    pub fn recompute_all(&self, features: &Features, base: Option<&Pca>) -> SearchResult<Pca> {
        let mut pca = base.copied().unwrap_or_default();
        if self.has_primary() {
            pca.primary_d = self.project(features, PRIMARY_D)?;
        }
        for domain in PcaDomain::ALL {
            for index in 0..DOMAIN_COMPONENTS {
                let name = domain.component_name(index);
                if self.weights.has_component(&name) {
                    pca.domain_mut(domain)[index] = self.project(features, &name)?;
                }
            }
        }
        Ok(pca)
    }

    /// Project a bare feature set.
    ///
    /// # Errors
    ///
    /// See [`PcaTransform::recompute_all`].
    pub fn project_features(
        &self,
        features: Features,
        base: Option<&Pca>,
    ) -> SearchResult<ProjectedTrack> {
        let pca = self.recompute_all(&features, base)?;
        Ok(ProjectedTrack { features, pca })
    }

    /// Copy `features`, set one dimension to `value`, and reproject.
    ///
    /// # Errors
    ///
    /// See [`PcaTransform::recompute_all`].
    pub fn counterfactual(
        &self,
        features: &Features,
        base: Option<&Pca>,
        dimension: Dimension,
        value: f64,
    ) -> SearchResult<ProjectedTrack> {
        let mut features = features.clone();
        features.insert(dimension, value);
        self.project_features(features, base)
    }

    /// A detached copy of `track` with the given feature overrides and
    /// recomputed PCA coordinates.
    ///
    /// Unknown dimension names are logged and ignored. Components without
    /// weights keep the track's stored values.
    ///
    /// # Errors
    ///
    /// See [`PcaTransform::recompute_all`].
    pub fn build_counterfactual(
        &self,
        track: &Track,
        modifications: &BTreeMap<String, f64>,
    ) -> SearchResult<Track> {
        let mut copy = track.clone();
        for (name, &value) in modifications {
            match Dimension::from_name(name) {
                Some(dimension) => {
                    copy.features.insert(dimension, value);
                }
                None => log::warn!(
                    "Ignoring counterfactual change to unknown dimension '{}'",
                    name
                ),
            }
        }
        copy.pca = Some(self.recompute_all(&copy.features, track.pca.as_ref())?);
        Ok(copy)
    }

    /// Absolute gap between the stored and recomputed `primary_d`.
    ///
    /// Returns `None` when the track has no stored PCA, there are no
    /// primary weights, or the projection cannot be computed.
    #[must_use]
    pub fn validate(&self, track: &Track) -> Option<f64> {
        let stored = track.pca.as_ref()?;
        if !self.has_primary() {
            return None;
        }
        match self.project(&track.features, PRIMARY_D) {
            Ok(recomputed) => Some((recomputed - stored.primary_d).abs()),
            Err(e) => {
                log::debug!("Cannot validate PCA for {}: {}", track.identifier, e);
                None
            }
        }
    }
}
