use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use ambitus_core::model::CalibrationMode;

/// Configuration for ambitus.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (AMBITUS_* prefix)
/// 3. Config file (~/.config/ambitus/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite catalog store.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: AMBITUS_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/ambitus/ambitus.db
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,

    /// Optional TOML file with per-dimension feature weights.
    ///
    /// Can be set via:
    /// - CLI: --weights /path/to/weights.toml
    /// - ENV: AMBITUS_WEIGHTS_PATH
    /// - Config: weights_path = "/path/to/weights.toml"
    #[serde(default)]
    pub weights_path: Option<PathBuf>,

    /// Calibration modes that must have at least one bucket.
    #[serde(default = "default_required_calibration")]
    pub required_calibration: Vec<CalibrationMode>,

    /// Load the catalog even when required calibration is missing.
    ///
    /// Can be set via:
    /// - ENV: AMBITUS_ALLOW_MISSING_CALIBRATION=true
    /// - Config: allow_missing_calibration = true
    #[serde(default)]
    pub allow_missing_calibration: bool,

    /// Compare stored and recomputed PCA coordinates while loading.
    #[serde(default = "default_true")]
    pub validate_pca: bool,

    /// Logger settings passed to twyg.
    #[serde(default)]
    pub logging: twyg::Opts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            weights_path: None,
            required_calibration: default_required_calibration(),
            allow_missing_calibration: false,
            validate_pca: true,
            logging: twyg::Opts::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/ambitus/config.toml
    /// Reads environment variables with AMBITUS_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("ambitus");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration with custom database path.
    ///
    /// This is used when the --db CLI flag is provided.
    pub fn load_with_db_path(db_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.database_path = db_path;
        Ok(config)
    }
}

fn default_true() -> bool {
    true
}

fn default_required_calibration() -> Vec<CalibrationMode> {
    vec![CalibrationMode::Pca]
}

/// Get the default database path.
///
/// Returns: ~/.local/share/ambitus/ambitus.db (or platform equivalent)
fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ambitus")
        .join("ambitus.db")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/ambitus/config.toml
/// - macOS: ~/Library/Application Support/ambitus/config.toml
/// - Windows: %APPDATA%\ambitus\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ambitus")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Ambitus Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (AMBITUS_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Path to the SQLite catalog store
#
# Holds tracks with their features, PCA coordinates and latent embeddings,
# plus calibration buckets and PCA transform weights.
#
# Can also be set via:
# - CLI: ambitus --db /custom/path.db stats
# - Environment: AMBITUS_DATABASE_PATH=/custom/path.db
#
# Default: Platform-specific data directory
#database_path = "/path/to/custom/ambitus.db"

# Feature weights for raw-feature distance (TOML file)
#
# Example file contents:
#   default_weight = 0.01
#   ignore = ["crest"]
#   [weights]
#   bpm = 0.02
#weights_path = "/path/to/weights.toml"

# Calibration modes that must be present when loading ("pca", "vae")
required_calibration = ["pca"]

# Load anyway when a required calibration mode has no buckets.
# Searches fall back to default radii and report themselves as degraded.
allow_missing_calibration = false

# Warn about tracks whose stored primary_d disagrees with the value
# recomputed from their features.
validate_pca = true

# Logger settings
#[logging]
#level = "debug"
#coloured = true
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.database_path.as_os_str().is_empty());
        assert!(config.weights_path.is_none());
        assert_eq!(config.required_calibration, vec![CalibrationMode::Pca]);
        assert!(!config.allow_missing_calibration);
        assert!(config.validate_pca);
    }

    #[test]
    fn test_config_load() {
        // Should not fail even if config file doesn't exist
        let result = Config::load();
        assert!(result.is_ok());
    }

    #[test]
    fn test_config_with_custom_db_path() {
        let custom_path = PathBuf::from("/tmp/test.db");
        let config = Config::load_with_db_path(custom_path.clone());
        assert!(config.is_ok());
        assert_eq!(config.unwrap().database_path, custom_path);
    }

    #[test]
    fn test_config_file_path_is_namespaced() {
        let path = config_file_path();
        assert!(path.ends_with("ambitus/config.toml"));
    }
}
