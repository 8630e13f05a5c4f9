//! On-disk cache layout and low-level artifact I/O.
//!
//! Every artifact of one `(day, project, table)` lives in a single directory
//! `<cachedir>/<day>/<project>/<table>/`. JSON artifacts are wrapped in a
//! [`Cached`] envelope carrying the format version; per-key sample files are
//! gzip-compressed CSV.

mod lock;
mod owner;

pub use lock::BuildLock;
pub use owner::apply_ownership;

use dl_common::schema::is_compatible;
use dl_common::{ArtifactTier, CompositeKey, Error, CACHE_FORMAT_VERSION};
use dl_config::Ownership;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// File name of the persisted quantile tier.
pub const QUANTILE_FILE: &str = "quantile.json";

/// File name of the persisted total-stats tier.
pub const TOTAL_STATS_FILE: &str = "total_stats.json";

/// Prefixes of every file the cache writes or has written.
pub const CACHE_FILE_PREFIXES: [&str; 6] =
    ["tsa_", "ts_", "tsastat_", "tsstat_", "quantile", "total_stats"];

/// Listing of a series array, keyed by its index columns.
pub fn series_array_file_name(index_keys: &[String]) -> String {
    format!("tsa_{}.json", CompositeKey::new(index_keys).encode())
}

/// Samples of one key of a series array.
pub fn series_file_name(key: &CompositeKey) -> String {
    format!("ts_{}.csv.gz", key.encode())
}

/// Series stats, keyed by index columns.
pub fn series_stats_file_name(index_keys: &[String]) -> String {
    format!("tsastat_{}.json", CompositeKey::new(index_keys).encode())
}

/// Failure reading one cached artifact.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file {0} not found")]
    Missing(PathBuf),

    #[error("cache file {path} corrupted: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl CacheError {
    /// Classify an error raised while reading `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => CacheError::Missing(path.to_path_buf()),
            ErrorKind::UnexpectedEof | ErrorKind::InvalidData | ErrorKind::InvalidInput => {
                CacheError::Corrupted {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                }
            }
            _ => CacheError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    pub fn corrupted(path: &Path, reason: impl Into<String>) -> Self {
        CacheError::Corrupted {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Whether rebuilding the artifact from its source tier fixes this.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CacheError::Io { .. })
    }
}

impl From<CacheError> for Error {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Io { source, .. } => Error::Io(source),
            other => Error::Io(io::Error::new(ErrorKind::InvalidData, other.to_string())),
        }
    }
}

/// Envelope around every JSON artifact.
#[derive(Debug, Serialize, Deserialize)]
struct Cached<T> {
    version: String,
    tier: ArtifactTier,
    cached_at: String,
    payload: T,
}

/// Write `payload` as the JSON artifact of `tier` at `path`.
pub fn write_cached<T: Serialize>(path: &Path, tier: ArtifactTier, payload: &T) -> Result<(), Error> {
    let cached = Cached {
        version: CACHE_FORMAT_VERSION.to_string(),
        tier,
        cached_at: chrono::Utc::now().to_rfc3339(),
        payload,
    };
    let json = serde_json::to_vec(&cached)?;
    write_atomic(path, &json)?;
    debug!(path = %path.display(), %tier, "artifact cached");
    Ok(())
}

/// Read the JSON artifact of `tier` at `path`.
pub fn read_cached<T: DeserializeOwned>(path: &Path, tier: ArtifactTier) -> Result<T, CacheError> {
    let contents = fs::read(path).map_err(|e| CacheError::from_io(path, e))?;
    let cached: Cached<T> = serde_json::from_slice(&contents)
        .map_err(|e| CacheError::corrupted(path, e.to_string()))?;
    if !is_compatible(&cached.version) {
        return Err(CacheError::corrupted(
            path,
            format!("format version {} is not readable", cached.version),
        ));
    }
    if cached.tier != tier {
        return Err(CacheError::corrupted(
            path,
            format!("holds {} instead of {tier}", cached.tier),
        ));
    }
    Ok(cached.payload)
}

/// Replace `path` with `bytes` via a temporary file and rename.
///
/// The temporary file is removed again when any step fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));
    let written = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp_path)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.flush()
        })
        .and_then(|()| fs::rename(&tmp_path, path));
    if let Err(e) = written {
        if let Err(cleanup) = remove_if_exists(&tmp_path) {
            warn!(path = %tmp_path.display(), error = %cleanup, "could not remove temporary file");
        }
        return Err(e);
    }
    Ok(())
}

/// Remove `path`, ignoring a file that is already gone.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Cache directory of one `(day, project, table)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLocation {
    root: PathBuf,
    day: String,
    project: String,
    table: String,
    dir: PathBuf,
}

impl CacheLocation {
    /// Path computation only; nothing is created until [`ensure`](Self::ensure).
    pub fn new(root: &Path, day: &str, project: &str, table: &str) -> Self {
        let dir = root.join(day).join(project).join(table);
        Self {
            root: root.to_path_buf(),
            day: day.to_string(),
            project: project.to_string(),
            table: table.to_string(),
            dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Create the directory chain and hand it to the configured owner.
    pub fn ensure(&self, ownership: Option<&Ownership>) -> io::Result<()> {
        if self.dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir)?;
        debug!(path = %self.dir.display(), "created cache directory");
        if let Some(owner) = ownership {
            let day_dir = self.root.join(&self.day);
            let project_dir = day_dir.join(&self.project);
            let table_dir = project_dir.join(&self.table);
            apply_ownership(&[day_dir, project_dir, table_dir], owner);
        }
        Ok(())
    }

    /// File names in the directory that carry a known cache prefix.
    pub fn cache_files(&self) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if CACHE_FILE_PREFIXES.iter().any(|p| name.starts_with(p)) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
