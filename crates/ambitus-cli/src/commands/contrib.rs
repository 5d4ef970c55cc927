use anyhow::Result;

use ambitus_core::model::Dimension;
use ambitus_load::Config;
use ambitus_search::{ContributionMode, ContributionOptions};

/// Print how much each dimension contributes to the distance between two
/// tracks.
pub fn run_contrib(
    config: &Config,
    current: &str,
    candidate: &str,
    mode: &str,
    reference: &str,
    json: bool,
) -> Result<()> {
    let options = ContributionOptions {
        mode: mode.parse::<ContributionMode>()?,
        reference: reference.parse::<Dimension>()?,
    };

    let engine = super::open_engine(config)?;
    let report = engine.analyze_contributions(current, candidate, &options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Contributions: {} → {} ({})", current, candidate, report.mode);
    println!("{}\n", "=".repeat(40));
    println!("Total distance: {:.4}\n", report.total);
    println!(
        "{:<22} {:>10} {:>10} {:>10} {:>8} {:>8}",
        "dimension", "value", "delta", "distance", "share", "vs ref"
    );
    for slice in &report.slices {
        let marker = if slice.key == report.reference { "*" } else { " " };
        println!(
            "{}{:<21} {:>10.4} {:>+10.4} {:>10.4} {:>7.1}% {:>8.2}",
            marker,
            slice.key.name(),
            slice.value,
            slice.delta,
            slice.distance,
            slice.fraction * 100.0,
            slice.relative
        );
    }
    println!("\n* reference dimension");

    Ok(())
}
