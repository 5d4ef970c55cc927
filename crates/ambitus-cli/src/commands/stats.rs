use anyhow::Result;

use ambitus_load::Config;

/// Show catalog size, calibration coverage and per-dimension statistics.
pub fn show_stats(config: &Config) -> Result<()> {
    let loaded = super::load(config)?;
    let catalog = &loaded.catalog;

    println!("Ambitus Catalog");
    println!("===============\n");
    println!("Store:  {}", config.database_path.display());
    println!("Tracks: {}", catalog.len());

    let with_pca = catalog.tracks().iter().filter(|t| t.pca.is_some()).count();
    let with_latent = catalog.tracks().iter().filter(|t| t.vae.is_some()).count();
    println!("  With PCA coordinates: {}", with_pca);
    println!("  With latent vectors:  {}", with_latent);

    println!("\nCalibration buckets: {}", catalog.calibration().len());
    for bucket in catalog.calibration().iter() {
        println!(
            "  {:<4} {:<17} {:<10} inner {:.4}  outer {:.4}  ({} tracks)",
            bucket.mode.as_str(),
            bucket.resolution.as_str(),
            bucket.discriminator.as_str(),
            bucket.inner_radius,
            bucket.outer_radius,
            bucket.library_size
        );
    }

    let stats = catalog.stats();
    if !stats.is_empty() {
        println!(
            "\n{:<22} {:>6} {:>12} {:>12} {:>12} {:>12}",
            "dimension", "count", "min", "median", "mean", "max"
        );
        for s in &stats {
            println!(
                "{:<22} {:>6} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
                s.dimension.name(), s.count, s.min, s.median, s.mean, s.max
            );
        }
    }

    Ok(())
}
