use anyhow::Result;
use serde_json::json;

use ambitus_core::model::{Direction, Resolution};
use ambitus_load::Config;
use ambitus_search::{Exploration, ExploreOptions};

#[derive(Debug)]
pub struct ExploreArgs {
    pub resolution: String,
    pub limit: Option<usize>,
    pub radius: Option<f64>,
    pub json: bool,
}

/// Print every known direction label with the dimension it moves.
pub fn list_directions() {
    for label in Direction::labels() {
        if let Some(direction) = Direction::resolve(label) {
            println!("{:<22} {}", label, direction);
        }
    }
    println!("\nAny dimension also accepts <dimension>_up and <dimension>_down.");
}

/// Explore from a track in one direction and print the ranked candidates.
pub fn run_explore(config: &Config, id: &str, direction: &str, args: &ExploreArgs) -> Result<()> {
    let defaults = ExploreOptions::default();
    let options = ExploreOptions {
        resolution: args.resolution.parse::<Resolution>()?,
        limit: args.limit.unwrap_or(defaults.limit),
        radius: args.radius,
    };

    let engine = super::open_engine(config)?;
    let exploration = engine.explore_direction(id, direction, &options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&to_json(id, &exploration))?);
        return Ok(());
    }

    print_exploration(id, direction, &exploration);
    Ok(())
}

fn to_json(id: &str, exploration: &Exploration) -> serde_json::Value {
    let diagnostics = &exploration.diagnostics;
    let candidates: Vec<_> = exploration
        .candidates
        .iter()
        .map(|c| {
            json!({
                "identifier": c.track.identifier,
                "title": c.track.metadata.title,
                "artist": c.track.metadata.artist,
                "delta": c.delta,
                "similarity": c.similarity,
                "feature_distance": c.feature_distance,
            })
        })
        .collect();
    json!({
        "center": id,
        "direction": exploration.direction.to_string(),
        "current_value": exploration.current_value,
        "minimum_delta": exploration.minimum_delta,
        "total_available": exploration.total_available,
        "candidates": candidates,
        "diagnostics": {
            "direction_fallback": diagnostics.direction_fallback,
            "radius": diagnostics.radius,
            "radius_calibrated": diagnostics.radius_calibrated,
            "considered": diagnostics.considered,
            "direction_matched": diagnostics.direction_matched,
            "locality_applied": diagnostics.locality_applied,
            "locality_rejected": diagnostics.locality_rejected,
            "locality_fallback": diagnostics.locality_fallback,
            "threshold_rejected": diagnostics.threshold_rejected,
            "threshold_fallback": diagnostics.threshold_fallback,
            "rejection_rate": diagnostics.rejection_rate,
        },
    })
}

fn print_exploration(id: &str, key: &str, exploration: &Exploration) {
    let diagnostics = &exploration.diagnostics;
    let dimension = exploration.direction.dimension;

    println!("Exploring {} from {}", key, id);
    println!("{}\n", "=".repeat(40));

    if diagnostics.direction_fallback {
        println!("⚠ Unknown direction '{}', using {}\n", key, exploration.direction);
    }
    println!(
        "Current {}: {:.4}   minimum step: {:.4}",
        dimension, exploration.current_value, exploration.minimum_delta
    );
    println!(
        "Radius: {:.4} ({})",
        diagnostics.radius,
        if diagnostics.radius_calibrated {
            "calibrated"
        } else {
            "default"
        }
    );

    if exploration.candidates.is_empty() {
        println!("\nNo tracks move in that direction within range.");
        return;
    }

    println!();
    for (rank, candidate) in exploration.candidates.iter().enumerate() {
        println!(
            "{:>3}. {:<50} Δ {:+.4}  sim {:.3}",
            rank + 1,
            candidate.track.label(),
            candidate.delta,
            candidate.similarity
        );
    }

    println!("\nDiagnostics:");
    println!("  Considered:        {}", diagnostics.considered);
    println!("  Direction matched: {}", diagnostics.direction_matched);
    if diagnostics.locality_applied {
        println!(
            "  Locality rejected: {}{}",
            diagnostics.locality_rejected,
            if diagnostics.locality_fallback {
                " (filter relaxed)"
            } else {
                ""
            }
        );
    }
    println!(
        "  Below min step:    {}{}",
        diagnostics.threshold_rejected,
        if diagnostics.threshold_fallback {
            " (filter relaxed)"
        } else {
            ""
        }
    );
    println!("  Available:         {}", exploration.total_available);
    println!("  Rejection rate:    {:.1}%", diagnostics.rejection_rate * 100.0);
}
