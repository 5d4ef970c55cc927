//! Integration tests for import → load → search.

use ambitus_core::model::{
    CalibrationBucket, CalibrationMode, Dimension, Discriminator, Features, Pca,
    PcaTransformWeight, Resolution, Track,
};
use ambitus_core::schema::Database;
use ambitus_load::import::import_document;
use ambitus_load::{load_catalog, CatalogDocument, LoadError, LoadOptions};
use ambitus_search::{ExploreOptions, SearchEngine};
use chrono::Utc;
use tempfile::TempDir;

fn track(id: &str, bpm: f64, primary_d: f64) -> Track {
    let features: Features = Dimension::BASE
        .into_iter()
        .map(|d| (d, if d == Dimension::Bpm { bpm } else { 0.5 }))
        .collect();
    Track::new(id, features).with_pca(Pca {
        primary_d,
        ..Pca::default()
    })
}

fn document() -> CatalogDocument {
    CatalogDocument {
        tracks: vec![
            // primary_d = (bpm - 120) / 20; "off" is stored wrong on purpose.
            track("slow", 100.0, -1.0),
            track("mid", 120.0, 0.0),
            track("fast", 140.0, 1.0),
            track("off", 130.0, 0.9),
        ],
        calibration: vec![CalibrationBucket {
            mode: CalibrationMode::Pca,
            resolution: Resolution::MagnifyingGlass,
            discriminator: Discriminator::PrimaryD,
            inner_radius: 0.0,
            outer_radius: 2.0,
            base_x: 0.0,
            target_percentage: 3.0,
            achieved_percentage: 3.0,
            library_size: 4,
            sample_size: 4,
            calibrated_at: Utc::now(),
            checksum: String::new(),
        }],
        pca_weights: vec![PcaTransformWeight {
            component: "primary_d".to_string(),
            feature: "bpm".to_string(),
            weight: 1.0,
            mean: 120.0,
            scale: 20.0,
        }],
    }
}

#[test]
fn test_import_then_load_and_explore() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");

    {
        let db = Database::open(&db_path).expect("Failed to open database");
        import_document(&db, &document()).unwrap();
    }

    let db = Database::open(&db_path).expect("Failed to reopen database");
    let loaded = load_catalog(&db, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.catalog.len(), 4);
    assert_eq!(loaded.report.calibration_buckets, 1);
    assert_eq!(loaded.report.pca_checked, 4);
    assert_eq!(loaded.report.pca_mismatches, 1);
    assert!((loaded.report.max_pca_deviation - 0.4).abs() < 1e-9);

    let engine = SearchEngine::new(loaded.catalog);
    let exploration = engine
        .explore_direction("mid", "faster", &ExploreOptions::default())
        .unwrap();
    assert!(exploration.candidates.iter().all(|c| c.delta > 0.0));
    assert!(exploration
        .candidates
        .iter()
        .all(|c| c.track.identifier != "slow"));
}

#[test]
fn test_missing_required_calibration_is_fatal() {
    let db = Database::open_in_memory().unwrap();
    let mut doc = document();
    doc.calibration.clear();
    import_document(&db, &doc).unwrap();

    let err = load_catalog(&db, &LoadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        LoadError::MissingCalibration {
            mode: CalibrationMode::Pca
        }
    ));
    assert!(err.is_setup());
}

#[test]
fn test_missing_calibration_allowed_by_override() {
    let db = Database::open_in_memory().unwrap();
    import_document(&db, &document()).unwrap();

    let options = LoadOptions {
        required_calibration: vec![CalibrationMode::Pca, CalibrationMode::Vae],
        allow_missing_calibration: true,
        ..LoadOptions::default()
    };
    let loaded = load_catalog(&db, &options).unwrap();
    assert_eq!(loaded.report.missing_calibration, vec![CalibrationMode::Vae]);
    assert_eq!(loaded.catalog.len(), 4);
}

#[test]
fn test_validation_can_be_disabled() {
    let db = Database::open_in_memory().unwrap();
    import_document(&db, &document()).unwrap();

    let options = LoadOptions {
        validate_pca: false,
        ..LoadOptions::default()
    };
    let loaded = load_catalog(&db, &options).unwrap();
    assert_eq!(loaded.report.pca_checked, 0);
    assert_eq!(loaded.report.pca_mismatches, 0);
}
