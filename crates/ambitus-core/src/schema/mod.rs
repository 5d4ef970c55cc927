//! SQLite catalog store.

pub mod db;
pub mod tables;

pub use db::{Database, TrackRow};
