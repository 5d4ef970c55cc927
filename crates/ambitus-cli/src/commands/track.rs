use anyhow::Result;

use ambitus_load::Config;

/// Print one track as JSON.
pub fn show_track(config: &Config, id: &str) -> Result<()> {
    let engine = super::open_engine(config)?;
    let Some(track) = engine.get_track(id) else {
        anyhow::bail!("Track not found: {}", id);
    };
    println!("{}", serde_json::to_string_pretty(track.as_ref())?);
    Ok(())
}
