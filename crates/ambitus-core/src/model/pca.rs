use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::dimension::Dimension;

/// Name of the global PCA discriminator component.
pub const PRIMARY_D: &str = "primary_d";

/// Components per domain vector.
pub const DOMAIN_COMPONENTS: usize = 3;

/// One of the three per-domain PCA projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PcaDomain {
    Tonal,
    Spectral,
    Rhythmic,
}

impl PcaDomain {
    pub const ALL: [Self; 3] = [Self::Tonal, Self::Spectral, Self::Rhythmic];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tonal => "tonal",
            Self::Spectral => "spectral",
            Self::Rhythmic => "rhythmic",
        }
    }

    /// Stored component name, e.g. `tonal_pc2` for `index == 1`.
    #[must_use]
    pub fn component_name(self, index: usize) -> String {
        format!("{}_pc{}", self.as_str(), index + 1)
    }
}

impl fmt::Display for PcaDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Precomputed principal-component coordinates for a track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    pub primary_d: f64,
    pub tonal: [f64; DOMAIN_COMPONENTS],
    pub spectral: [f64; DOMAIN_COMPONENTS],
    pub rhythmic: [f64; DOMAIN_COMPONENTS],
}

impl Pca {
    #[must_use]
    pub const fn domain(&self, domain: PcaDomain) -> &[f64; DOMAIN_COMPONENTS] {
        match domain {
            PcaDomain::Tonal => &self.tonal,
            PcaDomain::Spectral => &self.spectral,
            PcaDomain::Rhythmic => &self.rhythmic,
        }
    }

    pub fn domain_mut(&mut self, domain: PcaDomain) -> &mut [f64; DOMAIN_COMPONENTS] {
        match domain {
            PcaDomain::Tonal => &mut self.tonal,
            PcaDomain::Spectral => &mut self.spectral,
            PcaDomain::Rhythmic => &mut self.rhythmic,
        }
    }
}

/// A stored transform row: how one feature contributes to one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaTransformWeight {
    pub component: String,
    pub feature: String,
    pub weight: f64,
    pub mean: f64,
    pub scale: f64,
}

/// A transform row whose feature name resolved to a known [`Dimension`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentTerm {
    pub feature: Dimension,
    pub weight: f64,
    pub mean: f64,
    pub scale: f64,
}

/// Per-component projection weights, grouped by component name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PcaWeights {
    components: BTreeMap<String, Vec<ComponentTerm>>,
}

impl PcaWeights {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Group stored rows by component.
    ///
    /// Rows naming an unknown feature are skipped with a warning.
    #[must_use]
    pub fn from_rows(rows: &[PcaTransformWeight]) -> Self {
        let mut weights = Self::new();
        for row in rows {
            let Some(feature) = Dimension::from_name(&row.feature) else {
                log::warn!(
                    "Skipping PCA weight for unknown feature '{}' in component '{}'",
                    row.feature,
                    row.component
                );
                continue;
            };
            weights.insert(
                &row.component,
                ComponentTerm {
                    feature,
                    weight: row.weight,
                    mean: row.mean,
                    scale: row.scale,
                },
            );
        }
        weights
    }

    pub fn insert(&mut self, component: &str, term: ComponentTerm) {
        self.components
            .entry(component.to_string())
            .or_default()
            .push(term);
    }

    #[must_use]
    pub fn component(&self, name: &str) -> Option<&[ComponentTerm]> {
        self.components.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn has_component(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Flatten back into storage rows.
    #[must_use]
    pub fn to_rows(&self) -> Vec<PcaTransformWeight> {
        self.components
            .iter()
            .flat_map(|(component, terms)| {
                terms.iter().map(move |term| PcaTransformWeight {
                    component: component.clone(),
                    feature: term.feature.name().to_string(),
                    weight: term.weight,
                    mean: term.mean,
                    scale: term.scale,
                })
            })
            .collect()
    }
}
