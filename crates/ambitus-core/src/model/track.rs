use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::dimension::Dimension;
use crate::model::pca::Pca;

/// Number of components in a latent (VAE) embedding.
pub const LATENT_DIMENSIONS: usize = 8;

/// Ordered mapping of dimensions to raw feature values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Features(BTreeMap<Dimension, f64>);

impl Features {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        self.0.get(&dimension).copied()
    }

    /// Set a value, returning the previous one.
    pub fn insert(&mut self, dimension: Dimension, value: f64) -> Option<f64> {
        self.0.insert(dimension, value)
    }

    #[must_use]
    pub fn contains(&self, dimension: Dimension) -> bool {
        self.0.contains_key(&dimension)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        self.0.iter().map(|(d, v)| (*d, *v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Dimension, f64)> for Features {
    fn from_iter<I: IntoIterator<Item = (Dimension, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A learned latent embedding for a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Latent {
    pub latent: [f64; LATENT_DIMENSIONS],

    /// Version tag of the model that produced the embedding.
    #[serde(default)]
    pub model_version: Option<String>,
}

/// Descriptive metadata for a track. Never used for similarity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub artist: Option<String>,

    #[serde(default)]
    pub album: Option<String>,

    #[serde(default)]
    pub path: Option<String>,

    /// Duration in seconds.
    #[serde(default)]
    pub duration: Option<f64>,

    /// Remaining sanitized key/value pairs from the source metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// One analysed track.
///
/// Tracks are created once when the catalog is loaded and never mutated in
/// place; counterfactual variants are always fresh clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub identifier: String,

    #[serde(default)]
    pub metadata: TrackMetadata,

    pub features: Features,

    #[serde(default)]
    pub pca: Option<Pca>,

    #[serde(default)]
    pub vae: Option<Latent>,
}

impl Track {
    #[must_use]
    pub fn new(identifier: impl Into<String>, features: Features) -> Self {
        Self {
            identifier: identifier.into(),
            metadata: TrackMetadata::default(),
            features,
            pca: None,
            vae: None,
        }
    }

    #[must_use]
    pub fn with_pca(mut self, pca: Pca) -> Self {
        self.pca = Some(pca);
        self
    }

    #[must_use]
    pub fn with_latent(mut self, latent: Latent) -> Self {
        self.vae = Some(latent);
        self
    }

    #[must_use]
    pub fn feature(&self, dimension: Dimension) -> Option<f64> {
        self.features.get(dimension)
    }

    /// Short human-readable label for logs.
    #[must_use]
    pub fn label(&self) -> String {
        match (&self.metadata.artist, &self.metadata.title) {
            (Some(artist), Some(title)) => format!("{artist} - {title}"),
            (None, Some(title)) => title.clone(),
            _ => self.identifier.clone(),
        }
    }
}
