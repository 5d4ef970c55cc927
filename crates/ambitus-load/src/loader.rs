//! Materialize a [`Catalog`] from the catalog store.
//!
//! Rows are decoded (binary paths, JSON metadata), sanitized, and checked:
//! required calibration must exist and stored PCA coordinates should agree
//! with the ones recomputed from features.

use serde_json::Value;
use std::collections::BTreeMap;

use ambitus_core::model::{
    CalibrationMode, CalibrationTable, Dimension, Latent, PcaWeights, Track, TrackMetadata,
    LATENT_DIMENSIONS,
};
use ambitus_core::schema::{Database, TrackRow};
use ambitus_core::Catalog;
use ambitus_search::pca::{PcaTransform, VALIDATION_TOLERANCE};

use crate::config::Config;
use crate::error::{LoadError, LoadResult};

/// Loader switches, normally taken from [`Config`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub required_calibration: Vec<CalibrationMode>,
    pub allow_missing_calibration: bool,
    pub validate_pca: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            required_calibration: vec![CalibrationMode::Pca],
            allow_missing_calibration: false,
            validate_pca: true,
        }
    }
}

impl From<&Config> for LoadOptions {
    fn from(config: &Config) -> Self {
        Self {
            required_calibration: config.required_calibration.clone(),
            allow_missing_calibration: config.allow_missing_calibration,
            validate_pca: config.validate_pca,
        }
    }
}

/// What happened during a load.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub tracks: usize,

    /// Rows left out because they lack a base dimension.
    pub skipped: usize,

    /// Rows whose latent embedding had the wrong length and was dropped.
    pub dropped_latents: usize,

    pub calibration_buckets: usize,

    /// Required modes that had no buckets but were allowed through.
    pub missing_calibration: Vec<CalibrationMode>,

    pub pca_weight_components: usize,
    pub pca_checked: usize,
    pub pca_mismatches: usize,
    pub max_pca_deviation: f64,
}

#[derive(Debug)]
pub struct LoadedCatalog {
    pub catalog: Catalog,
    pub report: LoadReport,
}

/// Load and check the full catalog from `db`.
///
/// # Errors
///
/// Fails with [`LoadError::MissingCalibration`] when a required mode has no
/// buckets and missing calibration is not allowed, and with a store error
/// when rows cannot be read.
pub fn load_catalog(db: &Database, options: &LoadOptions) -> LoadResult<LoadedCatalog> {
    let mut report = LoadReport::default();

    let calibration: CalibrationTable = db.list_calibration()?.into_iter().collect();
    report.calibration_buckets = calibration.len();
    for &mode in &options.required_calibration {
        if calibration.count_for(mode) > 0 {
            continue;
        }
        if !options.allow_missing_calibration {
            return Err(LoadError::MissingCalibration { mode });
        }
        log::warn!(
            "No {} calibration found; searches will use default radii",
            mode
        );
        report.missing_calibration.push(mode);
    }

    let pca_weights = PcaWeights::from_rows(&db.list_pca_weights()?);
    report.pca_weight_components = pca_weights.component_names().count();

    let mut tracks = Vec::new();
    for row in db.list_tracks()? {
        let identifier = row.identifier.clone();
        if let Some(dimension) = Dimension::BASE
            .into_iter()
            .find(|d| !row.features.contains(*d))
        {
            log::warn!(
                "Skipping track {}: missing base dimension {}",
                identifier,
                dimension
            );
            report.skipped += 1;
            continue;
        }
        let (track, latent_dropped) = track_from_row(row);
        if latent_dropped {
            report.dropped_latents += 1;
        }
        tracks.push(track);
    }

    if options.validate_pca {
        validate_pca(&tracks, &pca_weights, &mut report);
    }

    report.tracks = tracks.len();
    let catalog = Catalog::new(tracks, calibration, pca_weights)?;
    log::info!(
        "Loaded {} tracks ({} skipped), {} calibration buckets, {} PCA components",
        report.tracks,
        report.skipped,
        report.calibration_buckets,
        report.pca_weight_components
    );

    Ok(LoadedCatalog { catalog, report })
}

fn validate_pca(tracks: &[Track], weights: &PcaWeights, report: &mut LoadReport) {
    let transform = PcaTransform::new(weights.clone());
    if !transform.has_primary() {
        log::warn!("No primary_d transform weights stored; skipping PCA validation");
        return;
    }
    for track in tracks {
        let Some(deviation) = transform.validate(track) else {
            continue;
        };
        report.pca_checked += 1;
        report.max_pca_deviation = report.max_pca_deviation.max(deviation);
        if deviation > VALIDATION_TOLERANCE {
            report.pca_mismatches += 1;
            log::warn!(
                "Stored primary_d for {} differs from recomputed value by {:.6}",
                track.identifier,
                deviation
            );
        }
    }
    if report.pca_mismatches > 0 {
        log::warn!(
            "{} of {} tracks failed PCA validation",
            report.pca_mismatches,
            report.pca_checked
        );
    }
}

/// Build a track from a stored row. Also reports whether a malformed latent
/// was dropped.
fn track_from_row(row: TrackRow) -> (Track, bool) {
    let mut extra = row
        .metadata
        .as_deref()
        .and_then(|text| match serde_json::from_str::<Value>(text) {
            Ok(value) => Some(sanitize_metadata(&value)),
            Err(e) => {
                log::warn!("Ignoring unparseable metadata for {}: {}", row.identifier, e);
                None
            }
        })
        .unwrap_or_default();

    let mut text_field = |column: Option<String>, key: &str| {
        column
            .map(|s| clean_text(&s))
            .filter(|s| !s.is_empty())
            .or_else(|| extra.remove(key))
    };
    let title = text_field(row.title, "title");
    let artist = text_field(row.artist, "artist");
    let album = text_field(row.album, "album");

    let metadata = TrackMetadata {
        title,
        artist,
        album,
        path: row.path.as_deref().map(decode_path),
        duration: row.duration,
        extra,
    };

    let mut latent_dropped = false;
    let vae = row.latent.and_then(|values| {
        match <[f64; LATENT_DIMENSIONS]>::try_from(values.as_slice()) {
            Ok(latent) => Some(Latent {
                latent,
                model_version: row.vae_model_version.clone(),
            }),
            Err(_) => {
                log::warn!(
                    "Dropping latent for {}: expected {} components, found {}",
                    row.identifier,
                    LATENT_DIMENSIONS,
                    values.len()
                );
                latent_dropped = true;
                None
            }
        }
    });

    let track = Track {
        identifier: row.identifier,
        metadata,
        features: row.features,
        pca: row.pca,
        vae,
    };
    (track, latent_dropped)
}

/// Decode a stored path.
///
/// Accepts raw bytes or a Postgres-style `\x` hex escape; invalid UTF-8 is
/// replaced rather than rejected.
#[must_use]
pub fn decode_path(bytes: &[u8]) -> String {
    let decoded = bytes
        .strip_prefix(b"\\x")
        .and_then(decode_hex)
        .unwrap_or_else(|| bytes.to_vec());
    String::from_utf8_lossy(&decoded).into_owned()
}

fn decode_hex(hex: &[u8]) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    hex.chunks_exact(2)
        .map(|pair| {
            let high = char::from(pair[0]).to_digit(16)?;
            let low = char::from(pair[1]).to_digit(16)?;
            u8::try_from(high * 16 + low).ok()
        })
        .collect()
}

/// Flatten and clean a metadata document.
///
/// Scalars are kept as strings, strings are trimmed and stripped of control
/// characters, nested objects are flattened with `.`-joined keys, and nulls
/// and arrays are dropped.
#[must_use]
pub fn sanitize_metadata(value: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Value::Object(map) = value {
        for (key, value) in map {
            flatten_into(&mut out, clean_text(key), value);
        }
    }
    out
}

fn flatten_into(out: &mut BTreeMap<String, String>, key: String, value: &Value) {
    if key.is_empty() {
        return;
    }
    match value {
        Value::Null | Value::Array(_) => {}
        Value::Bool(b) => {
            out.insert(key, b.to_string());
        }
        Value::Number(n) => {
            out.insert(key, n.to_string());
        }
        Value::String(s) => {
            let cleaned = clean_text(s);
            if !cleaned.is_empty() {
                out.insert(key, cleaned);
            }
        }
        Value::Object(map) => {
            for (child, value) in map {
                flatten_into(out, format!("{key}.{}", clean_text(child)), value);
            }
        }
    }
}

fn clean_text(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambitus_core::model::Features;
    use serde_json::json;

    fn row(id: &str) -> TrackRow {
        TrackRow {
            identifier: id.to_string(),
            title: None,
            artist: None,
            album: None,
            path: None,
            duration: Some(215.5),
            metadata: None,
            features: Dimension::BASE.into_iter().map(|d| (d, 0.5)).collect(),
            pca: None,
            latent: None,
            vae_model_version: None,
        }
    }

    #[test]
    fn test_decode_raw_path() {
        assert_eq!(decode_path(b"/music/a.flac"), "/music/a.flac");
    }

    #[test]
    fn test_decode_hex_path() {
        assert_eq!(decode_path(b"\\x2f6d2f632e6f6767"), "/m/c.ogg");
        assert_eq!(decode_path(b"\\x2F6D"), "/m");
    }

    #[test]
    fn test_decode_bad_hex_falls_back_to_raw() {
        assert_eq!(decode_path(b"\\xZZ"), "\\xZZ");
        assert_eq!(decode_path(b"\\x2f6"), "\\x2f6");
    }

    #[test]
    fn test_decode_invalid_utf8_is_lossy() {
        let decoded = decode_path(b"\\x2fff");
        assert!(decoded.starts_with('/'));
        assert!(decoded.contains('\u{FFFD}'));
    }

    #[test]
    fn test_sanitize_metadata() {
        let value = json!({
            "genre": "  ambient\u{0007} ",
            "year": 1994,
            "explicit": false,
            "tags": ["a", "b"],
            "mood": null,
            "empty": "   ",
            "beets": {"album_id": 12, "source": {"name": "disc\n"}},
        });
        let clean = sanitize_metadata(&value);

        assert_eq!(clean.get("genre").map(String::as_str), Some("ambient"));
        assert_eq!(clean.get("year").map(String::as_str), Some("1994"));
        assert_eq!(clean.get("explicit").map(String::as_str), Some("false"));
        assert_eq!(clean.get("beets.album_id").map(String::as_str), Some("12"));
        assert_eq!(clean.get("beets.source.name").map(String::as_str), Some("disc"));
        assert!(!clean.contains_key("tags"));
        assert!(!clean.contains_key("mood"));
        assert!(!clean.contains_key("empty"));
    }

    #[test]
    fn test_sanitize_non_object_is_empty() {
        assert!(sanitize_metadata(&json!("just a string")).is_empty());
        assert!(sanitize_metadata(&json!([1, 2])).is_empty());
    }

    #[test]
    fn test_track_from_row_prefers_columns_then_metadata() {
        let mut r = row("a");
        r.title = Some(" Column Title ".to_string());
        r.metadata = Some(r#"{"title": "Meta Title", "artist": "Meta Artist"}"#.to_string());
        r.path = Some(b"\\x2f612e6d7033".to_vec());

        let (track, dropped) = track_from_row(r);
        assert!(!dropped);
        assert_eq!(track.metadata.title.as_deref(), Some("Column Title"));
        assert_eq!(track.metadata.artist.as_deref(), Some("Meta Artist"));
        assert_eq!(track.metadata.path.as_deref(), Some("/a.mp3"));
        // Metadata keys promoted to columns are not repeated in extra.
        assert!(!track.metadata.extra.contains_key("artist"));
        assert!(track.metadata.extra.contains_key("title"));
    }

    #[test]
    fn test_track_from_row_drops_malformed_latent() {
        let mut r = row("a");
        r.latent = Some(vec![0.1, 0.2, 0.3]);
        let (track, dropped) = track_from_row(r);
        assert!(dropped);
        assert!(track.vae.is_none());

        let mut r = row("b");
        r.latent = Some(vec![0.5; LATENT_DIMENSIONS]);
        r.vae_model_version = Some("v3".to_string());
        let (track, dropped) = track_from_row(r);
        assert!(!dropped);
        assert_eq!(track.vae.unwrap().model_version.as_deref(), Some("v3"));
    }

    #[test]
    fn test_bad_metadata_json_is_ignored() {
        let mut r = row("a");
        r.metadata = Some("{not json".to_string());
        let (track, _) = track_from_row(r);
        assert!(track.metadata.extra.is_empty());
    }

    #[test]
    fn test_load_skips_incomplete_rows() {
        let db = Database::open_in_memory().unwrap();
        let complete: Features = Dimension::BASE.into_iter().map(|d| (d, 0.5)).collect();
        db.upsert_track(&Track::new("full", complete)).unwrap();
        let mut partial = Features::new();
        partial.insert(Dimension::Bpm, 120.0);
        db.upsert_track(&Track::new("partial", partial)).unwrap();

        let options = LoadOptions {
            allow_missing_calibration: true,
            ..LoadOptions::default()
        };
        let loaded = load_catalog(&db, &options).unwrap();
        assert_eq!(loaded.catalog.len(), 1);
        assert_eq!(loaded.report.skipped, 1);
        assert_eq!(loaded.report.missing_calibration, vec![CalibrationMode::Pca]);
    }
}
