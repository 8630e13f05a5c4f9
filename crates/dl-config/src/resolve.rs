//! Base directory resolution.

use dl_common::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding the base directory.
pub const ENV_BASEDIR: &str = "DATALOGGER_BASEDIR";

const DIR_NAME: &str = "datalogger";

/// Resolve the base directory: CLI → env → XDG → platform default.
pub fn resolve_basedir(cli: Option<&Path>) -> Result<PathBuf> {
    // 1) Explicit argument
    if let Some(dir) = cli {
        return Ok(dir.to_path_buf());
    }

    // 2) Explicit override
    if let Ok(dir) = std::env::var(ENV_BASEDIR) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    // 3) XDG_DATA_HOME
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join(DIR_NAME));
        }
    }

    // 4) Platform default
    if let Some(base) = dirs::data_dir() {
        return Ok(base.join(DIR_NAME));
    }

    Err(Error::Config(
        "unable to resolve a base directory".to_string(),
    ))
}
