use anyhow::Result;
use ambitus_load::{config, Config};

/// Show the current effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());

    let exists = config::config_file_path().exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    let required: Vec<String> = config
        .required_calibration
        .iter()
        .map(ToString::to_string)
        .collect();

    println!("Settings:");
    println!("  database_path: {}", config.database_path.display());
    println!(
        "  weights_path: {}",
        config
            .weights_path
            .as_ref()
            .map_or_else(|| String::from("<not set>"), |p| p.display().to_string())
    );
    println!("  required_calibration: [{}]", required.join(", "));
    println!("  allow_missing_calibration: {}", config.allow_missing_calibration);
    println!("  validate_pca: {}", config.validate_pca);
    println!("  logging.level: {:?}", config.logging.level());
    println!("  logging.coloured: {}", config.logging.coloured());
    println!("  logging.output: {:?}", config.logging.output());

    println!("\nPriority: CLI args > ENV vars (AMBITUS_*) > Config file > Defaults");

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    let config_path = config::config_file_path();
    println!("{}", config_path.display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure ambitus.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
