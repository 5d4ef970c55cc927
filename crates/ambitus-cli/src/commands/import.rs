use anyhow::{Context, Result};
use std::path::Path;

use ambitus_core::schema::Database;
use ambitus_load::{import_file, Config};

/// Import a JSON catalog document into the configured store.
pub fn run_import(config: &Config, file: &Path) -> Result<()> {
    let db = Database::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open catalog store at {}",
            config.database_path.display()
        )
    })?;

    println!("Importing {}...", file.display());
    let summary = import_file(&db, file)?;

    println!("\n✓ Import complete");
    println!("  Tracks:              {}", summary.tracks);
    if summary.skipped_tracks > 0 {
        println!("  Skipped tracks:      {}", summary.skipped_tracks);
    }
    println!("  Calibration buckets: {}", summary.calibration_buckets);
    println!("  PCA weights:         {}", summary.pca_weights);
    println!("\nStore now holds {} tracks", db.count_tracks()?);

    Ok(())
}
