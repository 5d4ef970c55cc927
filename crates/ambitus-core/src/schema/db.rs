use chrono::{DateTime, Utc};
use rusqlite::types::{Type, ValueRef};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::str::FromStr;

use crate::error::Result;
use crate::model::{CalibrationBucket, Features, Pca, PcaTransformWeight, Track};

use super::tables::SCHEMA;

/// A track as stored, before the loader decodes and sanitizes it.
///
/// `path` is kept as raw bytes and `metadata` as raw JSON text so the
/// loader can apply its own decoding rules.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRow {
    pub identifier: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub path: Option<Vec<u8>>,
    pub duration: Option<f64>,
    pub metadata: Option<String>,
    pub features: Features,
    pub pca: Option<Pca>,
    pub latent: Option<Vec<f64>>,
    pub vae_model_version: Option<String>,
}

/// A connection to the catalog store.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a store at the given path and ensure its tables exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.create_tables()?;
        Ok(db)
    }

    /// Open an in-memory store (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.create_tables()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn create_tables(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }
}

fn conversion_error(
    column: usize,
    kind: Type,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, kind, Box::new(err))
}

fn json_column<T: DeserializeOwned>(column: usize, text: &str) -> rusqlite::Result<T> {
    serde_json::from_str(text).map_err(|e| conversion_error(column, Type::Text, e))
}

fn parsed_column<T>(column: usize, text: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    text.parse().map_err(|e| conversion_error(column, Type::Text, e))
}

// Track CRUD
impl Database {
    /// Insert a track, replacing any existing track with the same identifier.
    pub fn upsert_track(&self, track: &Track) -> Result<()> {
        let pca = track.pca.as_ref();
        let metadata = if track.metadata.extra.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&track.metadata.extra)?)
        };
        let latent = track
            .vae
            .as_ref()
            .map(|v| serde_json::to_string(&v.latent))
            .transpose()?;

        self.conn.execute(
            "INSERT OR REPLACE INTO tracks (
                identifier, title, artist, album, path, duration, metadata, features,
                primary_d, tonal_pc1, tonal_pc2, tonal_pc3,
                spectral_pc1, spectral_pc2, spectral_pc3,
                rhythmic_pc1, rhythmic_pc2, rhythmic_pc3,
                vae_latent, vae_model_version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            rusqlite::params![
                track.identifier,
                track.metadata.title,
                track.metadata.artist,
                track.metadata.album,
                track.metadata.path.as_ref().map(|p| p.as_bytes().to_vec()),
                track.metadata.duration,
                metadata,
                serde_json::to_string(&track.features)?,
                pca.map(|p| p.primary_d),
                pca.map(|p| p.tonal[0]),
                pca.map(|p| p.tonal[1]),
                pca.map(|p| p.tonal[2]),
                pca.map(|p| p.spectral[0]),
                pca.map(|p| p.spectral[1]),
                pca.map(|p| p.spectral[2]),
                pca.map(|p| p.rhythmic[0]),
                pca.map(|p| p.rhythmic[1]),
                pca.map(|p| p.rhythmic[2]),
                latent,
                track.vae.as_ref().and_then(|v| v.model_version.clone()),
            ],
        )?;
        Ok(())
    }

    /// List every stored track, ordered by identifier.
    pub fn list_tracks(&self) -> Result<Vec<TrackRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT identifier, title, artist, album, path, duration, metadata, features,
                    primary_d, tonal_pc1, tonal_pc2, tonal_pc3,
                    spectral_pc1, spectral_pc2, spectral_pc3,
                    rhythmic_pc1, rhythmic_pc2, rhythmic_pc3,
                    vae_latent, vae_model_version
             FROM tracks
             ORDER BY identifier",
        )?;

        let rows = stmt
            .query_map([], |row| self.row_to_track(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Number of stored tracks.
    pub fn count_tracks(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn row_to_track(&self, row: &rusqlite::Row) -> rusqlite::Result<TrackRow> {
        // Paths may arrive as BLOB or TEXT depending on the producer.
        let path = match row.get_ref(4)? {
            ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Some(bytes.to_vec()),
            _ => None,
        };

        let features_text: String = row.get(7)?;
        let features: Features = json_column(7, &features_text)?;

        let mut pca_values = [0.0_f64; 10];
        let mut pca_complete = true;
        for (offset, slot) in pca_values.iter_mut().enumerate() {
            match row.get::<_, Option<f64>>(8 + offset)? {
                Some(value) => *slot = value,
                None => pca_complete = false,
            }
        }
        let pca = pca_complete.then(|| Pca {
            primary_d: pca_values[0],
            tonal: [pca_values[1], pca_values[2], pca_values[3]],
            spectral: [pca_values[4], pca_values[5], pca_values[6]],
            rhythmic: [pca_values[7], pca_values[8], pca_values[9]],
        });

        let latent = row
            .get::<_, Option<String>>(18)?
            .map(|text| json_column::<Vec<f64>>(18, &text))
            .transpose()?;

        Ok(TrackRow {
            identifier: row.get(0)?,
            title: row.get(1)?,
            artist: row.get(2)?,
            album: row.get(3)?,
            path,
            duration: row.get(5)?,
            metadata: row.get(6)?,
            features,
            pca,
            latent,
            vae_model_version: row.get(19)?,
        })
    }
}

// Calibration CRUD
impl Database {
    /// Insert or replace a calibration bucket.
    pub fn upsert_calibration(&self, bucket: &CalibrationBucket) -> Result<()> {
        self.conn.execute(
            "INSERT INTO calibration_settings (
                mode, resolution_level, discriminator, base_x, inner_radius, outer_radius,
                target_percentage, achieved_percentage, library_size, sample_size,
                calibrated_at, checksum
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT (mode, resolution_level, discriminator) DO UPDATE SET
                base_x = excluded.base_x,
                inner_radius = excluded.inner_radius,
                outer_radius = excluded.outer_radius,
                target_percentage = excluded.target_percentage,
                achieved_percentage = excluded.achieved_percentage,
                library_size = excluded.library_size,
                sample_size = excluded.sample_size,
                calibrated_at = excluded.calibrated_at,
                checksum = excluded.checksum",
            rusqlite::params![
                bucket.mode.as_str(),
                bucket.resolution.as_str(),
                bucket.discriminator.as_str(),
                bucket.base_x,
                bucket.inner_radius,
                bucket.outer_radius,
                bucket.target_percentage,
                bucket.achieved_percentage,
                i64::try_from(bucket.library_size).unwrap_or(i64::MAX),
                i64::try_from(bucket.sample_size).unwrap_or(i64::MAX),
                bucket.calibrated_at.to_rfc3339(),
                bucket.checksum,
            ],
        )?;
        Ok(())
    }

    /// List all calibration buckets.
    pub fn list_calibration(&self) -> Result<Vec<CalibrationBucket>> {
        let mut stmt = self.conn.prepare(
            "SELECT mode, resolution_level, discriminator, base_x, inner_radius, outer_radius,
                    target_percentage, achieved_percentage, library_size, sample_size,
                    calibrated_at, checksum
             FROM calibration_settings
             ORDER BY mode, resolution_level, discriminator",
        )?;

        let buckets = stmt
            .query_map([], |row| self.row_to_bucket(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(buckets)
    }

    fn row_to_bucket(&self, row: &rusqlite::Row) -> rusqlite::Result<CalibrationBucket> {
        let mode: String = row.get(0)?;
        let resolution: String = row.get(1)?;
        let discriminator: String = row.get(2)?;
        let calibrated_at: String = row.get(10)?;

        Ok(CalibrationBucket {
            mode: parsed_column(0, &mode)?,
            resolution: parsed_column(1, &resolution)?,
            discriminator: parsed_column(2, &discriminator)?,
            base_x: row.get(3)?,
            inner_radius: row.get(4)?,
            outer_radius: row.get(5)?,
            target_percentage: row.get(6)?,
            achieved_percentage: row.get(7)?,
            library_size: u64::try_from(row.get::<_, i64>(8)?).unwrap_or(0),
            sample_size: u64::try_from(row.get::<_, i64>(9)?).unwrap_or(0),
            calibrated_at: DateTime::parse_from_rfc3339(&calibrated_at)
                .map_err(|e| conversion_error(10, Type::Text, e))?
                .with_timezone(&Utc),
            checksum: row.get(11)?,
        })
    }
}

// PCA transform CRUD
impl Database {
    /// Insert or replace one PCA transform row.
    pub fn upsert_pca_weight(&self, weight: &PcaTransformWeight) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO pca_transformations (component, feature_name, weight, mean, scale)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                weight.component,
                weight.feature,
                weight.weight,
                weight.mean,
                weight.scale,
            ],
        )?;
        Ok(())
    }

    /// List all PCA transform rows.
    pub fn list_pca_weights(&self) -> Result<Vec<PcaTransformWeight>> {
        let mut stmt = self.conn.prepare(
            "SELECT component, feature_name, weight, mean, scale
             FROM pca_transformations
             ORDER BY component, feature_name",
        )?;

        let weights = stmt
            .query_map([], |row| {
                Ok(PcaTransformWeight {
                    component: row.get(0)?,
                    feature: row.get(1)?,
                    weight: row.get(2)?,
                    mean: row.get(3)?,
                    scale: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(weights)
    }
}
