//! Configuration, catalog loading and import for ambitus.
//!
//! The loader turns the SQLite store into an in-memory
//! [`Catalog`](ambitus_core::Catalog), decoding and sanitizing stored rows
//! and checking the reference data on the way.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod import;
pub mod loader;

pub use config::Config;
pub use error::{LoadError, LoadResult};
pub use import::{import_file, CatalogDocument, ImportSummary};
pub use loader::{load_catalog, LoadOptions, LoadReport, LoadedCatalog};
