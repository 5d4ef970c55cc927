pub mod config;
pub mod contrib;
pub mod explore;
pub mod import;
pub mod search;
pub mod stats;
pub mod track;
pub mod validate;

pub use contrib::run_contrib;
pub use explore::{list_directions, run_explore, ExploreArgs};
pub use import::run_import;
pub use search::{run_search, SearchArgs};
pub use stats::show_stats;
pub use track::show_track;
pub use validate::run_validate;

use anyhow::{Context, Result};

use ambitus_core::schema::Database;
use ambitus_load::{load_catalog, Config, LoadOptions, LoadedCatalog};
use ambitus_search::{FeatureWeights, SearchEngine};

/// Open the store and load the catalog it holds.
pub(crate) fn load(config: &Config) -> Result<LoadedCatalog> {
    let db = Database::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open catalog store at {}",
            config.database_path.display()
        )
    })?;
    let loaded = load_catalog(&db, &LoadOptions::from(config))?;
    if loaded.catalog.is_empty() {
        log::warn!(
            "Catalog at {} is empty; run 'ambitus import' first",
            config.database_path.display()
        );
    }
    Ok(loaded)
}

/// Load the catalog and wrap it in a search engine with the configured
/// feature weights.
pub(crate) fn open_engine(config: &Config) -> Result<SearchEngine> {
    let loaded = load(config)?;
    let weights = match &config.weights_path {
        Some(path) => FeatureWeights::load(path)?,
        None => FeatureWeights::default(),
    };
    Ok(SearchEngine::new(loaded.catalog).with_weights(weights))
}
