//! Global DataLogger configuration.
//!
//! The base directory holds `datalogger.json`:
//!
//! ```json
//! {
//!     "cachedir": "global_cache",
//!     "user": "datalogger",
//!     "group": "datalogger",
//!     "projects": {
//!         "vicenter": {"hostSystemCpuStats": {}, "virtualMachineMemoryStats": {}},
//!         "snmp": {"ifTable": {}}
//!     }
//! }
//! ```
//!
//! [`DataLoggerConfig`] is the resolved, validated form. It is built once per
//! process and shared read-only by every session.

use dl_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::meta::TableMetadata;
use crate::{CONFIG_FILE_NAME, DEFAULT_CACHE_DIR_NAME};

/// `datalogger.json` as written on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Cache root, relative to the base directory.
    #[serde(default)]
    pub cachedir: Option<String>,

    /// System user that should own created cache directories.
    #[serde(default)]
    pub user: Option<String>,

    /// System group that should own created cache directories.
    #[serde(default)]
    pub group: Option<String>,

    /// Defined projects and their tables.
    #[serde(default)]
    pub projects: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

/// Owner applied to cache directories for shared-access deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ownership {
    pub user: String,
    pub group: Option<String>,
}

/// Resolved configuration, immutable after construction.
#[derive(Debug, Clone, Serialize)]
pub struct DataLoggerConfig {
    basedir: PathBuf,
    cachedir: PathBuf,
    ownership: Option<Ownership>,
    projects: BTreeMap<String, Vec<String>>,
}

impl DataLoggerConfig {
    /// Load `datalogger.json` from `basedir`.
    pub fn load(basedir: impl Into<PathBuf>) -> Result<Self> {
        Self::load_file(basedir, CONFIG_FILE_NAME)
    }

    /// Load a differently named configuration file from `basedir`.
    pub fn load_file(basedir: impl Into<PathBuf>, filename: &str) -> Result<Self> {
        let basedir = basedir.into();
        if !basedir.is_dir() {
            return Err(Error::Config(format!(
                "global base directory {} does not exist",
                basedir.display()
            )));
        }
        let path = basedir.join(filename);
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let global: GlobalConfig = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("malformed {}: {e}", path.display())))?;
        Self::from_global(basedir, global)
    }

    /// Resolve an already parsed configuration against `basedir`.
    pub fn from_global(basedir: PathBuf, global: GlobalConfig) -> Result<Self> {
        let cachedir = match &global.cachedir {
            Some(dir) => basedir.join(dir),
            None => {
                info!(
                    "no cachedir defined in main configuration file, using {} below basedir",
                    DEFAULT_CACHE_DIR_NAME
                );
                basedir.join(DEFAULT_CACHE_DIR_NAME)
            }
        };
        if !cachedir.is_dir() {
            return Err(Error::Config(format!(
                "global cache directory {} does not exist",
                cachedir.display()
            )));
        }
        let ownership = global.user.map(|user| Ownership {
            user,
            group: global.group,
        });
        let projects = global
            .projects
            .into_iter()
            .map(|(project, tables)| (project, tables.into_keys().collect()))
            .collect();
        Ok(Self {
            basedir,
            cachedir,
            ownership,
            projects,
        })
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    /// Root of all cache partitions.
    pub fn cachedir(&self) -> &Path {
        &self.cachedir
    }

    pub fn ownership(&self) -> Option<&Ownership> {
        self.ownership.as_ref()
    }

    /// Names of all defined projects.
    pub fn projects(&self) -> Vec<&str> {
        self.projects.keys().map(String::as_str).collect()
    }

    /// Names of the tables defined for `project`.
    pub fn tables(&self, project: &str) -> Result<Vec<&str>> {
        self.projects
            .get(project)
            .map(|tables| tables.iter().map(String::as_str).collect())
            .ok_or_else(|| {
                Error::Config(format!(
                    "project {project} is not defined in main configuration file"
                ))
            })
    }

    /// Load the validated metadata of a defined table.
    pub fn table_metadata(&self, project: &str, table: &str) -> Result<TableMetadata> {
        if !self.tables(project)?.contains(&table) {
            return Err(Error::Config(format!(
                "table {table} is not defined in project {project}"
            )));
        }
        TableMetadata::load(&self.basedir, project, table)
    }
}
