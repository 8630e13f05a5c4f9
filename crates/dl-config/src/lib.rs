//! DataLogger configuration loading and validation.
//!
//! This crate provides:
//! - The global configuration (`datalogger.json`) and its resolved form
//! - The per-table metadata store with schema validation
//! - Base directory resolution (CLI → env → XDG → platform default)

pub mod global;
pub mod meta;
pub mod resolve;

pub use global::{DataLoggerConfig, GlobalConfig, Ownership};
pub use meta::{Datatype, TableMetadata};
pub use resolve::resolve_basedir;

/// Default name of the global configuration file inside the base directory.
pub const CONFIG_FILE_NAME: &str = "datalogger.json";

/// Cache directory used when the global configuration does not name one.
pub const DEFAULT_CACHE_DIR_NAME: &str = "global_cache";
