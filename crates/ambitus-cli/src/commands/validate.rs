use anyhow::Result;

use ambitus_load::Config;

/// Load the catalog with PCA validation on and summarize what was found.
///
/// Fails when anything was skipped or any stored coordinates disagree with
/// the recomputed ones.
pub fn run_validate(config: &Config) -> Result<()> {
    let mut config = config.clone();
    config.validate_pca = true;

    let loaded = super::load(&config)?;
    let report = &loaded.report;

    println!("Validation");
    println!("==========\n");
    println!("Tracks loaded:        {}", report.tracks);
    println!("Rows skipped:         {}", report.skipped);
    println!("Latents dropped:      {}", report.dropped_latents);
    println!("Calibration buckets:  {}", report.calibration_buckets);
    if !report.missing_calibration.is_empty() {
        let modes: Vec<String> = report
            .missing_calibration
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("Missing calibration:  {}", modes.join(", "));
    }
    println!("PCA components:       {}", report.pca_weight_components);
    println!("PCA checked:          {}", report.pca_checked);
    println!("PCA mismatches:       {}", report.pca_mismatches);
    if report.pca_mismatches > 0 {
        println!("Max PCA deviation:    {:.4}", report.max_pca_deviation);
    }

    let problems = report.skipped + report.dropped_latents + report.pca_mismatches;
    if problems > 0 {
        anyhow::bail!("{} integrity problems found", problems);
    }
    println!("\n✓ No problems found");
    Ok(())
}
