//! Per-dimension weights for raw feature distance.
//!
//! Weights can be built in code or loaded from a TOML file:
//!
//! ```toml
//! default_weight = 0.01
//! ignore = ["crest", "entropy"]
//!
//! [weights]
//! bpm = 0.02
//! spectral_centroid = 0.0005
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use ambitus_core::model::Dimension;

use crate::error::{SearchError, SearchResult};

/// Weight used for dimensions without an explicit entry.
pub const DEFAULT_FEATURE_WEIGHT: f64 = 0.01;

fn default_weight() -> f64 {
    DEFAULT_FEATURE_WEIGHT
}

/// Explicit weights, a fallback weight, and an ignore list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeights {
    #[serde(default)]
    pub weights: BTreeMap<Dimension, f64>,

    /// Dimensions skipped entirely by feature distance.
    #[serde(default)]
    pub ignore: BTreeSet<Dimension>,

    #[serde(default = "default_weight")]
    pub default_weight: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            ignore: BTreeSet::new(),
            default_weight: DEFAULT_FEATURE_WEIGHT,
        }
    }
}

impl FeatureWeights {
    /// Load weights from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a weight
    /// is negative or not finite.
    pub fn load(path: &Path) -> SearchResult<Self> {
        let weights_error = |message: String| SearchError::Weights {
            path: path.display().to_string(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| weights_error(e.to_string()))?;
        let weights: Self = toml::from_str(&content).map_err(|e| weights_error(e.to_string()))?;
        weights.validate().map_err(weights_error)?;
        Ok(weights)
    }

    fn validate(&self) -> Result<(), String> {
        let bad = |w: f64| !w.is_finite() || w < 0.0;
        if bad(self.default_weight) {
            return Err(format!("invalid default_weight {}", self.default_weight));
        }
        if let Some((dimension, weight)) = self.weights.iter().find(|(_, w)| bad(**w)) {
            return Err(format!("invalid weight {weight} for {dimension}"));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_weight(mut self, dimension: Dimension, weight: f64) -> Self {
        self.weights.insert(dimension, weight);
        self
    }

    #[must_use]
    pub fn with_ignored(mut self, dimension: Dimension) -> Self {
        self.ignore.insert(dimension);
        self
    }

    #[must_use]
    pub fn is_ignored(&self, dimension: Dimension) -> bool {
        self.ignore.contains(&dimension)
    }

    /// Effective weight; zero for ignored dimensions.
    #[must_use]
    pub fn weight(&self, dimension: Dimension) -> f64 {
        if self.is_ignored(dimension) {
            return 0.0;
        }
        self.weights
            .get(&dimension)
            .copied()
            .unwrap_or(self.default_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_weight_for_unlisted() {
        let weights = FeatureWeights::default().with_weight(Dimension::Bpm, 0.5);
        assert_eq!(weights.weight(Dimension::Bpm), 0.5);
        assert_eq!(weights.weight(Dimension::Crest), DEFAULT_FEATURE_WEIGHT);
    }

    #[test]
    fn test_ignored_dimension_has_zero_weight() {
        let weights = FeatureWeights::default()
            .with_weight(Dimension::Bpm, 0.5)
            .with_ignored(Dimension::Bpm);
        assert!(weights.is_ignored(Dimension::Bpm));
        assert_eq!(weights.weight(Dimension::Bpm), 0.0);
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_weight = 0.05
ignore = ["crest"]

[weights]
bpm = 0.02
"#
        )
        .unwrap();

        let weights = FeatureWeights::load(file.path()).unwrap();
        assert_eq!(weights.default_weight, 0.05);
        assert_eq!(weights.weight(Dimension::Bpm), 0.02);
        assert_eq!(weights.weight(Dimension::Crest), 0.0);
        assert_eq!(weights.weight(Dimension::Entropy), 0.05);
    }

    #[test]
    fn test_load_defaults_when_fields_absent() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let weights = FeatureWeights::load(file.path()).unwrap();
        assert_eq!(weights, FeatureWeights::default());
    }

    #[test]
    fn test_load_rejects_negative_weight() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[weights]\nbpm = -1.0").unwrap();
        assert!(matches!(
            FeatureWeights::load(file.path()),
            Err(SearchError::Weights { .. })
        ));
    }

    #[test]
    fn test_load_rejects_unknown_dimension() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[weights]\nloudness = 1.0").unwrap();
        assert!(FeatureWeights::load(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = FeatureWeights::load(Path::new("/nonexistent/weights.toml"));
        assert!(result.is_err());
    }
}
