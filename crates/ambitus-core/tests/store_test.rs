//! Integration tests for the on-disk catalog store.

use ambitus_core::model::{
    CalibrationBucket, CalibrationMode, Dimension, Discriminator, Features, Latent, Pca,
    PcaTransformWeight, PcaWeights, Resolution, Track, LATENT_DIMENSIONS,
};
use ambitus_core::schema::Database;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

fn track(id: &str, bpm: f64) -> Track {
    let features: Features = Dimension::BASE
        .into_iter()
        .map(|d| (d, if d == Dimension::Bpm { bpm } else { 0.25 }))
        .collect();
    let mut track = Track::new(id, features)
        .with_pca(Pca {
            primary_d: bpm / 100.0,
            tonal: [0.1, 0.2, 0.3],
            spectral: [0.4, 0.5, 0.6],
            rhythmic: [0.7, 0.8, 0.9],
        })
        .with_latent(Latent {
            latent: [0.5; LATENT_DIMENSIONS],
            model_version: Some("beta-2".to_string()),
        });
    track.metadata.title = Some(format!("Title {id}"));
    track.metadata.path = Some(format!("/music/{id}.flac"));
    track
}

/// Data written through one connection is readable after reopening the file.
#[test]
fn test_reopen_preserves_catalog() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");

    {
        let db = Database::open(&db_path).expect("Failed to open database");
        db.upsert_track(&track("b", 128.0)).unwrap();
        db.upsert_track(&track("a", 96.0)).unwrap();
        db.upsert_calibration(&CalibrationBucket {
            mode: CalibrationMode::Pca,
            resolution: Resolution::Binoculars,
            discriminator: Discriminator::Tonal,
            inner_radius: 0.2,
            outer_radius: 0.9,
            base_x: 0.2,
            target_percentage: 8.0,
            achieved_percentage: 6.5,
            library_size: 2,
            sample_size: 2,
            calibrated_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            checksum: "abc123".to_string(),
        })
        .unwrap();
        db.upsert_pca_weight(&PcaTransformWeight {
            component: "primary_d".to_string(),
            feature: "bpm".to_string(),
            weight: 0.7,
            mean: 120.0,
            scale: 25.0,
        })
        .unwrap();
    }

    let db = Database::open(&db_path).expect("Failed to reopen database");
    assert_eq!(db.count_tracks().unwrap(), 2);

    let rows = db.list_tracks().unwrap();
    assert_eq!(rows[0].identifier, "a");
    assert_eq!(rows[0].features.get(Dimension::Bpm), Some(96.0));
    assert_eq!(rows[0].path.as_deref(), Some(b"/music/a.flac".as_slice()));
    let pca = rows[1].pca.unwrap();
    assert_eq!(pca.primary_d, 1.28);
    assert_eq!(pca.rhythmic, [0.7, 0.8, 0.9]);
    assert_eq!(rows[1].latent.as_ref().map(Vec::len), Some(LATENT_DIMENSIONS));
    assert_eq!(rows[1].vae_model_version.as_deref(), Some("beta-2"));

    let buckets = db.list_calibration().unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].discriminator, Discriminator::Tonal);
    assert_eq!(buckets[0].checksum, "abc123");

    let weights = PcaWeights::from_rows(&db.list_pca_weights().unwrap());
    assert_eq!(weights.component("primary_d").map(<[_]>::len), Some(1));
}

/// Opening an existing database does not fail on already-created tables.
#[test]
fn test_schema_creation_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");

    for _ in 0..3 {
        let db = Database::open(&db_path).expect("Failed to open database");
        assert_eq!(db.count_tracks().unwrap(), 0);
    }
}
