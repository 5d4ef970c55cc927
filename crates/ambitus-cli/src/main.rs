use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use ambitus_load::Config;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "ambitus", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the catalog store (default: ~/.local/share/ambitus/ambitus.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML file with per-dimension feature weights
    #[arg(long, global = true)]
    weights: Option<PathBuf>,

    /// Load even when a required calibration mode has no buckets
    #[arg(long, global = true)]
    allow_missing_calibration: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Import a JSON catalog document into the store
    ///
    /// The document holds up to three arrays: `tracks` (identifier, metadata,
    /// features, optional PCA coordinates and latent embedding),
    /// `calibration` (one bucket per mode, resolution and discriminator) and
    /// `pca_weights` (one row per component and feature). Rows with existing
    /// keys are replaced. The whole document is written in one transaction.
    Import {
        /// Path to the JSON document
        file: PathBuf,
    },
    /// Find tracks similar to a given track
    ///
    /// Modes: auto, feature, pca, pca:<tonal|spectral|rhythmic|full_pca>, vae.
    /// PCA and latent searches use the calibrated annulus for the chosen
    /// resolution unless both --inner and --outer are given.
    Search {
        /// Identifier of the center track
        id: String,

        /// Distance mode
        #[arg(long, default_value = "auto")]
        mode: String,

        /// Resolution tier: microscope, magnifying_glass, binoculars
        #[arg(long, default_value = "magnifying_glass")]
        resolution: String,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,

        /// Radius for feature-mode searches
        #[arg(long)]
        radius: Option<f64>,

        /// Inner radius override
        #[arg(long, requires = "outer")]
        inner: Option<f64>,

        /// Outer radius override
        #[arg(long, requires = "inner")]
        outer: Option<f64>,

        /// Do not scale calibrated radii by library size
        #[arg(long)]
        no_scaling: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find tracks that move away from a track in a musical direction
    ///
    /// Directions are semantic labels such as `faster`, `brighter` or
    /// `more_bass`, or `<dimension>_up` / `<dimension>_down`. Run with
    /// `--list` to print every label.
    Explore {
        /// Identifier of the current track
        id: Option<String>,

        /// Direction key
        direction: Option<String>,

        /// Resolution tier used to pick the calibrated radius
        #[arg(long, default_value = "magnifying_glass")]
        resolution: String,

        /// Maximum number of candidates
        #[arg(long)]
        limit: Option<usize>,

        /// Feature-space radius, bypassing calibration
        #[arg(long)]
        radius: Option<f64>,

        /// List the known direction labels and exit
        #[arg(long)]
        list: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Break the distance between two tracks down by dimension
    Contrib {
        /// Identifier of the current track
        current: String,

        /// Identifier of the candidate track
        candidate: String,

        /// Distance mode: feature, pca or pca:<submode>
        #[arg(long, default_value = "pca")]
        mode: String,

        /// Reference dimension listed first
        #[arg(long, default_value = "bpm")]
        reference: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one track
    Track {
        /// Track identifier
        id: String,
    },
    /// Show catalog statistics
    Stats,
    /// Load the catalog and report integrity problems
    Validate,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file with defaults if it does not exist
    Init,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.db {
        Some(db_path) => Config::load_with_db_path(db_path)?,
        None => Config::load()?,
    };
    if let Some(weights) = cli.weights {
        config.weights_path = Some(weights);
    }
    if cli.allow_missing_calibration {
        config.allow_missing_calibration = true;
    }

    twyg::setup(config.logging.clone())
        .map_err(|e| anyhow::anyhow!("Failed to set up logging: {e}"))?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    match cli.command {
        Commands::Import { file } => {
            commands::run_import(&config, &file)?;
        }
        Commands::Search {
            id,
            mode,
            resolution,
            limit,
            radius,
            inner,
            outer,
            no_scaling,
            json,
        } => {
            let args = commands::SearchArgs {
                mode,
                resolution,
                limit,
                radius,
                radii: inner.zip(outer),
                apply_scaling: !no_scaling,
                json,
            };
            commands::run_search(&config, &id, &args)?;
        }
        Commands::Explore {
            id,
            direction,
            resolution,
            limit,
            radius,
            list,
            json,
        } => {
            if list {
                commands::list_directions();
            } else {
                let (Some(id), Some(direction)) = (id, direction) else {
                    anyhow::bail!("explore needs a track identifier and a direction (or --list)");
                };
                let args = commands::ExploreArgs {
                    resolution,
                    limit,
                    radius,
                    json,
                };
                commands::run_explore(&config, &id, &direction, &args)?;
            }
        }
        Commands::Contrib {
            current,
            candidate,
            mode,
            reference,
            json,
        } => {
            commands::run_contrib(&config, &current, &candidate, &mode, &reference, json)?;
        }
        Commands::Track { id } => {
            commands::show_track(&config, &id)?;
        }
        Commands::Stats => {
            commands::show_stats(&config)?;
        }
        Commands::Validate => {
            commands::run_validate(&config)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(&config)?,
            ConfigAction::Path => commands::config::show_path()?,
            ConfigAction::Example => commands::config::show_example()?,
            ConfigAction::Init => commands::config::init_config()?,
        },
    }

    Ok(())
}
