//! Balanced k-d tree over raw feature vectors.
//!
//! The tree is built once from a [`Catalog`] by recursive median split,
//! cycling the split axis through the catalog's active dimensions. It never
//! changes afterwards; a new catalog means a new tree.

use std::sync::Arc;

use ambitus_core::model::{Dimension, Track};
use ambitus_core::Catalog;

use crate::distance::DistanceEngine;
use crate::error::{SearchError, SearchResult};
use crate::weights::FeatureWeights;

/// Slack added to the outer radius before an annular query prunes a node.
///
/// The tree is split in raw feature space while annular queries measure in
/// PCA or latent space, so no tight per-node bound exists. This constant is
/// deliberately generous and never derived from the node.
pub const CONSERVATIVE_SUBTREE_RADIUS: f64 = 1.0;

/// A track found by a radius query, with its distance to the query.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub track: Arc<Track>,
    pub distance: f64,
}

#[derive(Debug)]
struct Node {
    track: Arc<Track>,
    vector: Vec<f64>,
    axis: usize,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

/// Spatial index over a catalog's feature vectors.
#[derive(Debug)]
pub struct SpatialIndex {
    root: Option<Box<Node>>,
    dimensions: Vec<Dimension>,
    len: usize,
}

impl SpatialIndex {
    /// Build the tree from every track in the catalog.
    #[must_use]
    pub fn build(catalog: &Catalog) -> Self {
        let dimensions = catalog.dimensions().to_vec();
        let points: Vec<(Arc<Track>, Vec<f64>)> = catalog
            .tracks()
            .iter()
            .filter_map(|track| match catalog.vector(track) {
                Some(vector) => Some((Arc::clone(track), vector)),
                None => {
                    log::warn!(
                        "Track {} lacks an active dimension; leaving it out of the index",
                        track.identifier
                    );
                    None
                }
            })
            .collect();

        let len = points.len();
        let root = build_node(points, 0, dimensions.len());
        log::debug!(
            "Built spatial index over {} tracks and {} dimensions",
            len,
            dimensions.len()
        );

        Self {
            root,
            dimensions,
            len,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Every indexed track, in depth-first order.
    #[must_use]
    pub fn tracks(&self) -> Vec<Arc<Track>> {
        let mut out = Vec::with_capacity(self.len);
        let mut stack: Vec<&Node> = self.root.as_deref().into_iter().collect();
        while let Some(node) = stack.pop() {
            out.push(Arc::clone(&node.track));
            stack.extend(node.right.as_deref());
            stack.extend(node.left.as_deref());
        }
        out
    }

    /// All tracks whose weighted feature distance to `query` is at most
    /// `radius`, excluding the query itself. Unsorted.
    ///
    /// # Errors
    ///
    /// Fails when the query lacks an active dimension.
    pub fn radius_search(
        &self,
        query: &Track,
        radius: f64,
        weights: &FeatureWeights,
    ) -> SearchResult<Vec<Neighbor>> {
        let vector = self
            .dimensions
            .iter()
            .map(|&dimension| {
                query
                    .feature(dimension)
                    .ok_or_else(|| SearchError::MissingFeature {
                        track: query.identifier.clone(),
                        dimension,
                    })
            })
            .collect::<SearchResult<Vec<f64>>>()?;

        let engine = DistanceEngine::new(&self.dimensions, weights);
        let mut found = Vec::new();
        if let Some(root) = self.root.as_deref() {
            self.radius_visit(root, query, &vector, radius, &engine, &mut found);
        }
        Ok(found)
    }

    fn radius_visit(
        &self,
        node: &Node,
        query: &Track,
        vector: &[f64],
        radius: f64,
        engine: &DistanceEngine<'_>,
        found: &mut Vec<Neighbor>,
    ) {
        if node.track.identifier != query.identifier {
            match engine.features_between(&query.features, &node.track.features, None) {
                Ok(distance) if distance <= radius => found.push(Neighbor {
                    track: Arc::clone(&node.track),
                    distance,
                }),
                Ok(_) => {}
                Err((_, dimension)) => log::debug!(
                    "Skipping {} during radius search: missing {}",
                    node.track.identifier,
                    dimension
                ),
            }
        }

        let gap = vector[node.axis] - node.vector[node.axis];
        let (near, far) = if gap < 0.0 {
            (node.left.as_deref(), node.right.as_deref())
        } else {
            (node.right.as_deref(), node.left.as_deref())
        };

        if let Some(child) = near {
            self.radius_visit(child, query, vector, radius, engine, found);
        }
        // Weighted axis gap is a lower bound on the weighted Manhattan
        // distance to anything on the far side.
        let bound = engine.weights().weight(self.dimensions[node.axis]) * gap.abs();
        if bound <= radius {
            if let Some(child) = far {
                self.radius_visit(child, query, vector, radius, engine, found);
            }
        }
    }

    /// All tracks with `inner <= distance <= outer` under an arbitrary
    /// metric, excluding the query. Unsorted.
    ///
    /// `metric` returns `None` for tracks lacking the data it needs; those
    /// tracks are skipped but their subtrees are still visited.
    pub fn annular_search<F>(&self, query: &Track, inner: f64, outer: f64, metric: F) -> Vec<Neighbor>
    where
        F: Fn(&Track) -> Option<f64>,
    {
        let mut found = Vec::new();
        let mut stack: Vec<&Node> = self.root.as_deref().into_iter().collect();
        while let Some(node) = stack.pop() {
            let distance = metric(&node.track);
            if let Some(d) = distance {
                if node.track.identifier != query.identifier && inner <= d && d <= outer {
                    found.push(Neighbor {
                        track: Arc::clone(&node.track),
                        distance: d,
                    });
                }
                if d > outer + CONSERVATIVE_SUBTREE_RADIUS {
                    continue;
                }
            }
            stack.extend(node.left.as_deref());
            stack.extend(node.right.as_deref());
        }
        found
    }
}

fn build_node(
    mut points: Vec<(Arc<Track>, Vec<f64>)>,
    depth: usize,
    dimension_count: usize,
) -> Option<Box<Node>> {
    if points.is_empty() || dimension_count == 0 {
        return None;
    }
    let axis = depth % dimension_count;
    points.sort_by(|a, b| a.1[axis].total_cmp(&b.1[axis]));

    let median = points.len() / 2;
    let right = points.split_off(median + 1);
    let (track, vector) = points.pop()?;
    let left = points;

    Some(Box::new(Node {
        track,
        vector,
        axis,
        left: build_node(left, depth + 1, dimension_count),
        right: build_node(right, depth + 1, dimension_count),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambitus_core::model::{CalibrationTable, Features, PcaWeights};
    use std::collections::HashSet;

    fn track(id: &str, bpm: f64, crest: f64) -> Track {
        let features: Features = Dimension::BASE
            .into_iter()
            .map(|d| match d {
                Dimension::Bpm => (d, bpm),
                Dimension::Crest => (d, crest),
                _ => (d, 0.5),
            })
            .collect();
        Track::new(id, features)
    }

    fn catalog(tracks: Vec<Track>) -> Catalog {
        Catalog::new(tracks, CalibrationTable::new(), PcaWeights::new()).unwrap()
    }

    fn grid(n: usize) -> Catalog {
        catalog(
            (0..n)
                .map(|i| track(&format!("t{i}"), 80.0 + i as f64, (i % 7) as f64))
                .collect(),
        )
    }

    fn check_axes(node: &Node, depth: usize, dims: usize) {
        assert_eq!(node.axis, depth % dims);
        for child in [node.left.as_deref(), node.right.as_deref()].into_iter().flatten() {
            check_axes(child, depth + 1, dims);
        }
    }

    #[test]
    fn test_empty_catalog() {
        let index = SpatialIndex::build(&catalog(Vec::new()));
        assert!(index.is_empty());
        assert!(index.tracks().is_empty());
        let query = track("q", 100.0, 1.0);
        let found = index
            .radius_search(&query, 10.0, &FeatureWeights::default())
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_every_track_indexed_once() {
        let index = SpatialIndex::build(&grid(37));
        assert_eq!(index.len(), 37);
        let ids: Vec<String> = index
            .tracks()
            .iter()
            .map(|t| t.identifier.clone())
            .collect();
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(ids.len(), 37);
        assert_eq!(unique.len(), 37);
    }

    #[test]
    fn test_split_axis_cycles_with_depth() {
        let index = SpatialIndex::build(&grid(50));
        check_axes(index.root.as_deref().unwrap(), 0, index.dimensions().len());
    }

    #[test]
    fn test_radius_search_matches_linear_scan() {
        let catalog = grid(60);
        let index = SpatialIndex::build(&catalog);
        let weights = FeatureWeights::default().with_weight(Dimension::Bpm, 0.1);
        let engine = DistanceEngine::new(catalog.dimensions(), &weights);
        let query = catalog.get("t30").unwrap();

        for radius in [0.0, 0.25, 1.0, 2.5] {
            let mut found: Vec<String> = index
                .radius_search(query, radius, &weights)
                .unwrap()
                .into_iter()
                .map(|n| n.track.identifier.clone())
                .collect();
            found.sort();

            let mut expected: Vec<String> = catalog
                .tracks()
                .iter()
                .filter(|t| t.identifier != query.identifier)
                .filter(|t| engine.feature(query, t).unwrap() <= radius)
                .map(|t| t.identifier.clone())
                .collect();
            expected.sort();

            assert_eq!(found, expected, "radius {radius}");
        }
    }

    #[test]
    fn test_radius_search_excludes_query() {
        let catalog = grid(10);
        let index = SpatialIndex::build(&catalog);
        let query = catalog.get("t3").unwrap();
        let found = index
            .radius_search(query, f64::MAX, &FeatureWeights::default())
            .unwrap();
        assert_eq!(found.len(), 9);
        assert!(found.iter().all(|n| n.track.identifier != "t3"));
    }

    #[test]
    fn test_ignored_axis_never_prunes() {
        let catalog = grid(40);
        let index = SpatialIndex::build(&catalog);
        let weights = FeatureWeights::default().with_ignored(Dimension::Bpm);
        let query = catalog.get("t0").unwrap();
        // With bpm ignored every track with the same crest is at distance 0.
        let found = index.radius_search(query, 0.0, &weights).unwrap();
        let expected = catalog
            .tracks()
            .iter()
            .filter(|t| t.identifier != "t0" && t.feature(Dimension::Crest) == Some(0.0))
            .count();
        assert_eq!(found.len(), expected);
    }

    #[test]
    fn test_radius_search_query_missing_feature() {
        let index = SpatialIndex::build(&grid(5));
        let query = Track::new("bare", Features::new());
        let result = index.radius_search(&query, 1.0, &FeatureWeights::default());
        assert!(matches!(result, Err(SearchError::MissingFeature { .. })));
    }

    #[test]
    fn test_annular_search_bounds() {
        let catalog = grid(30);
        let index = SpatialIndex::build(&catalog);
        let query = catalog.get("t10").unwrap();
        // Every distance stays within the prune slack, so nothing is pruned.
        let metric = |t: &Track| Some((t.feature(Dimension::Bpm)? - 90.0).abs() / 20.0);

        let found = index.annular_search(query, 0.1, 0.25, metric);
        let mut bpms: Vec<f64> = found
            .iter()
            .map(|n| {
                assert!(n.distance >= 0.1 && n.distance <= 0.25);
                n.track.feature(Dimension::Bpm).unwrap()
            })
            .collect();
        bpms.sort_by(f64::total_cmp);
        // bpm 90 is the query itself and sits at distance 0 anyway.
        assert_eq!(bpms, vec![85.0, 86.0, 87.0, 88.0, 92.0, 93.0, 94.0, 95.0]);
    }

    #[test]
    fn test_annular_search_skips_tracks_without_data() {
        let catalog = grid(12);
        let index = SpatialIndex::build(&catalog);
        let query = catalog.get("t0").unwrap();
        let metric = |t: &Track| {
            if t.identifier == "t5" {
                None
            } else {
                Some(0.1)
            }
        };
        let found = index.annular_search(query, 0.0, 1.0, metric);
        assert_eq!(found.len(), 10);
        assert!(found.iter().all(|n| n.track.identifier != "t5"));
    }
}
