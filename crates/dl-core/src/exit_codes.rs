//! Exit codes for the dl-core CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.

use dl_common::Error;

/// Exit codes for dl-core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Clean = 0,

    /// Configuration or metadata error, invalid day string
    ConfigError = 10,

    /// The requested day is still accumulating data
    LiveData = 11,

    /// No raw input file for the requested day
    RawFileMissing = 12,

    /// I/O error
    IoError = 13,

    /// Unexpected content in the cache directory, or an import conflict
    CacheError = 14,

    /// Quantile computation error
    ComputationError = 15,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            _ if err.is_configuration() => ExitCode::ConfigError,
            Error::LiveData { .. } => ExitCode::LiveData,
            Error::RawFileMissing { .. } => ExitCode::RawFileMissing,
            Error::FilenameDecode { .. } | Error::CacheConflict(_) => ExitCode::CacheError,
            Error::Quantile(_) => ExitCode::ComputationError,
            Error::Io(_) => ExitCode::IoError,
            _ => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
