use anyhow::Result;
use serde_json::json;

use ambitus_core::model::Resolution;
use ambitus_load::Config;
use ambitus_search::{DistanceMode, Radii, SearchParams};

#[derive(Debug)]
pub struct SearchArgs {
    pub mode: String,
    pub resolution: String,
    pub limit: Option<usize>,
    pub radius: Option<f64>,
    pub radii: Option<(f64, f64)>,
    pub apply_scaling: bool,
    pub json: bool,
}

impl SearchArgs {
    fn params(&self) -> Result<SearchParams> {
        let defaults = SearchParams::default();
        let override_radii = self
            .radii
            .map(|(inner, outer)| Radii::new(inner, outer))
            .transpose()?;
        Ok(SearchParams {
            mode: self.mode.parse::<DistanceMode>()?,
            resolution: self.resolution.parse::<Resolution>()?,
            limit: self.limit.unwrap_or(defaults.limit),
            feature_radius: self.radius,
            override_radii,
            apply_scaling: self.apply_scaling,
        })
    }
}

/// Print the neighbors of a track.
pub fn run_search(config: &Config, id: &str, args: &SearchArgs) -> Result<()> {
    let params = args.params()?;
    let engine = super::open_engine(config)?;
    let outcome = engine.search(id, &params)?;
    let neighbors = &outcome.neighbors;

    if args.json {
        let results: Vec<_> = neighbors
            .iter()
            .map(|n| {
                json!({
                    "identifier": n.track.identifier,
                    "title": n.track.metadata.title,
                    "artist": n.track.metadata.artist,
                    "distance": n.distance,
                })
            })
            .collect();
        let output = json!({
            "center": id,
            "mode": outcome.mode.to_string(),
            "resolution": params.resolution.as_str(),
            "radii": outcome.radii,
            "radius_source": outcome.source,
            "scaling_factor": outcome.scaling_factor,
            "degraded": outcome.degraded,
            "results": results,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "Neighbors of {} ({} distance, {})",
        id, outcome.mode, params.resolution
    );
    println!("{}\n", "=".repeat(40));

    if outcome.degraded {
        println!(
            "⚠ No calibration for this mode and resolution; using default radius {:.4}\n",
            outcome.radii.outer
        );
    }
    println!(
        "Radii: {:.4} .. {:.4} (scaling {:.3})\n",
        outcome.radii.inner, outcome.radii.outer, outcome.scaling_factor
    );

    if neighbors.is_empty() {
        println!("No tracks found in range.");
        return Ok(());
    }

    for (rank, neighbor) in neighbors.iter().enumerate() {
        println!(
            "{:>3}. {:<50} {:.4}",
            rank + 1,
            neighbor.track.label(),
            neighbor.distance
        );
    }
    println!("\n{} results", neighbors.len());

    Ok(())
}
