/// Table definitions for the catalog store.
///
/// Every statement is idempotent; opening an existing store re-runs them
/// harmlessly. The layout is fixed and never versioned.
pub const SCHEMA: &str = r#"
-- Analysed tracks
CREATE TABLE IF NOT EXISTS tracks (
    identifier TEXT PRIMARY KEY,
    title TEXT,
    artist TEXT,
    album TEXT,
    path BLOB,
    duration REAL,
    metadata TEXT,
    features TEXT NOT NULL,
    primary_d REAL,
    tonal_pc1 REAL,
    tonal_pc2 REAL,
    tonal_pc3 REAL,
    spectral_pc1 REAL,
    spectral_pc2 REAL,
    spectral_pc3 REAL,
    rhythmic_pc1 REAL,
    rhythmic_pc2 REAL,
    rhythmic_pc3 REAL,
    vae_latent TEXT,
    vae_model_version TEXT,
    imported_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_tracks_primary_d ON tracks(primary_d);

-- Calibrated neighborhood radii
CREATE TABLE IF NOT EXISTS calibration_settings (
    mode TEXT NOT NULL,
    resolution_level TEXT NOT NULL,
    discriminator TEXT NOT NULL,
    base_x REAL NOT NULL DEFAULT 0,
    inner_radius REAL NOT NULL,
    outer_radius REAL NOT NULL,
    target_percentage REAL NOT NULL,
    achieved_percentage REAL NOT NULL,
    library_size INTEGER NOT NULL DEFAULT 0,
    sample_size INTEGER NOT NULL DEFAULT 0,
    calibrated_at TEXT NOT NULL,
    checksum TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (mode, resolution_level, discriminator)
);

-- PCA projection weights
CREATE TABLE IF NOT EXISTS pca_transformations (
    component TEXT NOT NULL,
    feature_name TEXT NOT NULL,
    weight REAL NOT NULL,
    mean REAL NOT NULL,
    scale REAL NOT NULL,
    PRIMARY KEY (component, feature_name)
);
"#;
