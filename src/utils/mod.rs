//! Utility helpers: atomic file writes and JSON document persistence.
pub mod files;

pub use files::{atomic_write, read_json, write_json_pretty};
