//! Error types for DataLogger.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for DataLogger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for DataLogger.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid table metadata: {0}")]
    InvalidMetadata(String),

    #[error("invalid day string: {0}")]
    InvalidDay(String),

    // Input availability errors (20-29)
    #[error("reading from live data is not allowed: {day}")]
    LiveData { day: String },

    #[error("no raw input file {path} (or .gz) found")]
    RawFileMissing { path: PathBuf },

    // Cache errors (30-39)
    #[error("filename {filename} could not be decoded to a key: {reason}")]
    FilenameDecode { filename: String, reason: String },

    #[error("cache archive {0} exists already")]
    CacheConflict(PathBuf),

    // Computation errors (40-49)
    #[error("quantile calculation failed: {0}")]
    Quantile(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidMetadata(_) => 11,
            Error::InvalidDay(_) => 12,
            Error::LiveData { .. } => 20,
            Error::RawFileMissing { .. } => 21,
            Error::FilenameDecode { .. } => 30,
            Error::CacheConflict(_) => 31,
            Error::Quantile(_) => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// True for failures detected while validating configuration or metadata.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::InvalidMetadata(_) | Error::InvalidDay(_)
        )
    }
}
