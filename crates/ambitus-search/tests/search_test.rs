//! End-to-end tests for the search engine facade.

use ambitus_core::model::{
    CalibrationBucket, CalibrationMode, CalibrationTable, ComponentTerm, Dimension,
    Discriminator, Features, Latent, Pca, PcaWeights, Resolution, Track, LATENT_DIMENSIONS, PRIMARY_D,
};
use ambitus_core::Catalog;
use ambitus_search::{
    ContributionMode, ContributionOptions, DistanceMode, ExploreOptions, PcaSubmode,
    PcaTransform, SearchEngine, SearchError, SearchParams,
};
use chrono::Utc;

fn features(bpm: f64, centroid: f64) -> Features {
    Dimension::BASE
        .into_iter()
        .map(|d| match d {
            Dimension::Bpm => (d, bpm),
            Dimension::SpectralCentroid => (d, centroid),
            _ => (d, 0.5),
        })
        .collect()
}

fn pca_weights() -> PcaWeights {
    let mut weights = PcaWeights::new();
    let terms = [
        (PRIMARY_D, Dimension::Bpm, 1.0, 120.0, 20.0),
        (PRIMARY_D, Dimension::SpectralCentroid, 0.5, 0.5, 0.1),
        ("spectral_pc1", Dimension::SpectralCentroid, 1.0, 0.5, 0.1),
        ("rhythmic_pc1", Dimension::Bpm, 1.0, 120.0, 40.0),
    ];
    for (component, feature, weight, mean, scale) in terms {
        weights.insert(
            component,
            ComponentTerm {
                feature,
                weight,
                mean,
                scale,
            },
        );
    }
    weights
}

fn bucket(
    mode: CalibrationMode,
    discriminator: Discriminator,
    inner: f64,
    outer: f64,
) -> CalibrationBucket {
    CalibrationBucket {
        mode,
        resolution: Resolution::MagnifyingGlass,
        discriminator,
        inner_radius: inner,
        outer_radius: outer,
        base_x: inner,
        target_percentage: 2.0,
        achieved_percentage: 2.0,
        library_size: 3,
        sample_size: 3,
        calibrated_at: Utc::now(),
        checksum: "test".to_string(),
    }
}

fn tempo_catalog() -> Catalog {
    let transform = PcaTransform::new(pca_weights());
    let tracks = [("slow", 100.0), ("mid", 120.0), ("fast", 140.0)]
        .into_iter()
        .map(|(id, bpm)| {
            let f = features(bpm, 0.5);
            let pca = transform.recompute_all(&f, None).unwrap();
            Track::new(id, f).with_pca(pca)
        })
        .collect();
    let calibration: CalibrationTable = [
        bucket(CalibrationMode::Pca, Discriminator::PrimaryD, 0.0, 2.0),
        bucket(CalibrationMode::Pca, Discriminator::Rhythmic, 0.1, 0.6),
    ]
    .into_iter()
    .collect();
    Catalog::new(tracks, calibration, pca_weights()).unwrap()
}

#[test]
fn test_explore_faster_from_middle() {
    let engine = SearchEngine::new(tempo_catalog());
    let exploration = engine
        .explore_direction("mid", "faster", &ExploreOptions::default())
        .unwrap();

    let ids: Vec<&str> = exploration
        .candidates
        .iter()
        .map(|c| c.track.identifier.as_str())
        .collect();
    assert_eq!(ids, vec!["fast"]);
    assert_eq!(exploration.dimension(), Dimension::Bpm);
    assert!(exploration.candidates.iter().all(|c| c.delta > 0.0));
}

#[test]
fn test_vae_search_without_embedding_fails() {
    let engine = SearchEngine::new(tempo_catalog());
    let params = SearchParams {
        mode: DistanceMode::Vae,
        ..SearchParams::default()
    };
    let err = engine.search("mid", &params).unwrap_err();
    assert!(matches!(err, SearchError::MissingLatent { ref track } if track == "mid"));
}

#[test]
fn test_pca_search_respects_annulus() {
    let engine = SearchEngine::new(tempo_catalog());
    let params = SearchParams {
        mode: DistanceMode::Pca(PcaSubmode::Rhythmic),
        ..SearchParams::default()
    };
    // rhythmic_pc1 moves 0.5 per 20 bpm.
    let found = engine.search("mid", &params).unwrap().neighbors;
    assert_eq!(found.len(), 2);
    for neighbor in &found {
        assert_ne!(neighbor.track.identifier, "mid");
        assert!(neighbor.distance >= 0.1 && neighbor.distance <= 0.6);
    }
}

#[test]
fn test_auto_search_uses_latent_when_present() {
    let transform = PcaTransform::new(pca_weights());
    let tracks = (0..6)
        .map(|i| {
            let f = features(100.0 + f64::from(i) * 5.0, 0.5);
            let pca = transform.recompute_all(&f, None).unwrap();
            let mut latent = [0.0; LATENT_DIMENSIONS];
            latent[3] = f64::from(i) * 0.1;
            Track::new(format!("t{i}"), f)
                .with_pca(pca)
                .with_latent(Latent {
                    latent,
                    model_version: Some("v1".to_string()),
                })
        })
        .collect();
    let catalog = Catalog::new(tracks, CalibrationTable::new(), pca_weights()).unwrap();
    let engine = SearchEngine::new(catalog);

    let found = engine.search("t0", &SearchParams::default()).unwrap();
    assert_eq!(found.mode, DistanceMode::Vae);
    // No latent calibration: default outer radius 0.5, t1..t5 sit at 0.1..0.5.
    assert!(found.degraded);
    let ids: Vec<&str> = found
        .neighbors
        .iter()
        .map(|n| n.track.identifier.as_str())
        .collect();
    assert_eq!(ids, vec!["t1", "t2", "t3", "t4", "t5"]);
}

#[test]
fn test_serialized_tracks_recompute_within_tolerance() {
    let transform = PcaTransform::new(pca_weights());
    let f = features(131.0, 0.57);
    let pca = transform.recompute_all(&f, None).unwrap();
    let track = Track::new("x", f).with_pca(pca).with_latent(Latent {
        latent: [0.25; LATENT_DIMENSIONS],
        model_version: None,
    });

    let json = serde_json::to_string(&track).unwrap();
    let restored: Track = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.features, track.features);
    assert_eq!(restored.vae, track.vae);

    let recomputed = transform.recompute_all(&restored.features, None).unwrap();
    let stored = restored.pca.unwrap();
    assert!((recomputed.primary_d - stored.primary_d).abs() < 0.001);
    assert!((recomputed.spectral[0] - stored.spectral[0]).abs() < 0.001);
    assert!(transform.validate(&restored).unwrap() < 0.001);
}

#[test]
fn test_contributions_through_engine() {
    let engine = SearchEngine::new(tempo_catalog());
    let report = engine
        .analyze_contributions(
            "mid",
            "fast",
            &ContributionOptions {
                mode: ContributionMode::Pca(PcaSubmode::PrimaryD),
                reference: Dimension::Bpm,
            },
        )
        .unwrap();
    assert_eq!(report.slices[0].key, Dimension::Bpm);
    assert!((report.total - 1.0).abs() < 1e-9);
    assert!((report.slices[0].fraction - 1.0).abs() < 1e-9);
}

#[test]
fn test_pca_contributions_need_transform_weights() {
    let tracks = [("a", 120.0, 0.0), ("b", 180.0, 3.0)]
        .into_iter()
        .map(|(id, bpm, primary_d)| {
            Track::new(id, features(bpm, 0.5)).with_pca(Pca {
                primary_d,
                ..Pca::default()
            })
        })
        .collect();
    let catalog = Catalog::new(tracks, CalibrationTable::new(), PcaWeights::new()).unwrap();
    let engine = SearchEngine::new(catalog);

    let err = engine
        .analyze_contributions("a", "b", &ContributionOptions::default())
        .unwrap_err();
    assert!(matches!(err, SearchError::UnknownComponent(ref name) if name == PRIMARY_D));
}

#[test]
fn test_swapped_catalog_is_visible_to_new_queries() {
    let engine = SearchEngine::new(tempo_catalog());
    let old = engine.handle().snapshot();

    let transform = PcaTransform::new(pca_weights());
    let f = features(160.0, 0.5);
    let pca = transform.recompute_all(&f, None).unwrap();
    let mut tracks: Vec<Track> = old
        .catalog()
        .tracks()
        .iter()
        .map(|t| t.as_ref().clone())
        .collect();
    tracks.push(Track::new("faster", f).with_pca(pca));
    let calibration = old.catalog().calibration().clone();
    engine.replace_catalog(Catalog::new(tracks, calibration, pca_weights()).unwrap());

    assert_eq!(old.catalog().len(), 3);
    assert!(engine.get_track("faster").is_some());
    let exploration = engine
        .explore_direction("fast", "faster", &ExploreOptions::default())
        .unwrap();
    assert_eq!(exploration.candidates[0].track.identifier, "faster");
}
