//! Core domain model for ambitus.
//!
//! This crate defines the track model (audio features, PCA coordinates,
//! latent embeddings), the calibration and PCA-transform reference data,
//! the direction vocabulary, the immutable [`Catalog`], and the SQLite
//! catalog store.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod catalog;
pub mod error;
pub mod model;
pub mod schema;

pub use catalog::{Catalog, DimensionStats};
pub use error::{Error, Result};
