//! Table metadata store.
//!
//! Every (project, table) pair has a definition file at
//! `<basedir>/<project>/meta/<table>.json` describing the raw CSV layout:
//!
//! ```json
//! {
//!     "headers": ["ts", "hostname", "ifDescr", "ifInOctets"],
//!     "delimiter": "\t",
//!     "ts_keyname": "ts",
//!     "index_keynames": ["hostname", "ifDescr"],
//!     "value_keynames": {"ifInOctets": "counter64"},
//!     "blacklist": [],
//!     "interval": 300
//! }
//! ```
//!
//! `value_keynames` may also be a plain list (older definitions), in which
//! case every column is read as-is.

use dl_common::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Declared datatype of a value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    /// Plain floating point value.
    Asis,
    /// Percentage, optionally suffixed with `%`.
    Percent,
    /// 32-bit wrapping counter.
    Counter32,
    /// 64-bit wrapping counter.
    Counter64,
    /// 32-bit gauge.
    Gauge32,
}

impl Datatype {
    /// Convert a raw field into a finite sample value.
    pub fn parse_value(self, raw: &str) -> Option<f64> {
        let raw = raw.trim();
        let raw = match self {
            Datatype::Percent => raw.strip_suffix('%').unwrap_or(raw).trim_end(),
            _ => raw,
        };
        raw.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

/// Value columns as written in the definition file.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
enum ValueColumns {
    Typed(serde_json::Map<String, serde_json::Value>),
    Legacy(Vec<String>),
}

/// On-disk layout of a table definition file.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct TableMetaFile {
    headers: Vec<String>,
    delimiter: String,
    ts_keyname: String,
    index_keynames: Vec<String>,
    value_keynames: ValueColumns,
    #[serde(default)]
    blacklist: Vec<String>,
    #[serde(default = "default_interval")]
    interval: u64,
}

fn default_interval() -> u64 {
    300
}

/// Immutable, validated schema of one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableMetadata {
    pub project: String,
    pub table: String,
    /// All headers, order matters.
    pub headers: Vec<String>,
    pub delimiter: String,
    pub ts_keyname: String,
    pub index_keynames: Vec<String>,
    /// Value columns in declaration order.
    pub value_keynames: Vec<String>,
    pub datatypes: BTreeMap<String, Datatype>,
    pub blacklist: Vec<String>,
    /// Sampling interval in seconds.
    pub interval: u64,
    /// Directory holding `<table>_<day>.csv[.gz]` files.
    pub raw_dir: PathBuf,
}

impl TableMetadata {
    /// Load and validate the definition of `project/table` below `basedir`.
    pub fn load(basedir: &Path, project: &str, table: &str) -> Result<Self> {
        let project_dir = basedir.join(project);
        if !project_dir.is_dir() {
            return Err(Error::Config(format!(
                "project directory {} does not exist",
                project_dir.display()
            )));
        }
        let meta_dir = project_dir.join("meta");
        if !meta_dir.is_dir() {
            return Err(Error::Config(format!(
                "project meta directory {} does not exist",
                meta_dir.display()
            )));
        }
        let meta_file = meta_dir.join(format!("{table}.json"));
        if !meta_file.is_file() {
            return Err(Error::Config(format!(
                "table definition file {} does not exist",
                meta_file.display()
            )));
        }
        let raw_dir = project_dir.join("raw");
        if !raw_dir.is_dir() {
            return Err(Error::Config(format!(
                "project raw input directory {} does not exist",
                raw_dir.display()
            )));
        }
        let content = fs::read_to_string(&meta_file)?;
        let meta = Self::from_json(&content, project, table, raw_dir)?;
        debug!(path = %meta_file.display(), "loaded table definition");
        Ok(meta)
    }

    /// Parse and validate a definition file's content.
    pub fn from_json(json: &str, project: &str, table: &str, raw_dir: PathBuf) -> Result<Self> {
        let file: TableMetaFile = serde_json::from_str(json)
            .map_err(|e| Error::InvalidMetadata(format!("{project}/{table}: {e}")))?;

        let (value_keynames, datatypes) = match file.value_keynames {
            ValueColumns::Typed(columns) => {
                let mut names = Vec::with_capacity(columns.len());
                let mut datatypes = BTreeMap::new();
                for (name, value) in columns {
                    let datatype: Datatype = serde_json::from_value(value).map_err(|e| {
                        Error::InvalidMetadata(format!("{project}/{table}: column {name}: {e}"))
                    })?;
                    datatypes.insert(name.clone(), datatype);
                    names.push(name);
                }
                (names, datatypes)
            }
            ValueColumns::Legacy(names) => {
                warn!(
                    project,
                    table, "value_keynames should be declared as an object with datatypes"
                );
                let datatypes = names.iter().map(|n| (n.clone(), Datatype::Asis)).collect();
                (names, datatypes)
            }
        };

        let meta = TableMetadata {
            project: project.to_string(),
            table: table.to_string(),
            headers: file.headers,
            delimiter: file.delimiter,
            ts_keyname: file.ts_keyname,
            index_keynames: file.index_keynames,
            value_keynames,
            datatypes,
            blacklist: file.blacklist,
            interval: file.interval,
            raw_dir,
        };
        meta.validate()?;
        Ok(meta)
    }

    /// Check the column-role invariants.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| {
            Err(Error::InvalidMetadata(format!(
                "{}/{}: {}",
                self.project, self.table, msg
            )))
        };
        if self.headers.is_empty() {
            return fail("headers must not be empty".to_string());
        }
        if self.delimiter.is_empty() {
            return fail("delimiter must not be empty".to_string());
        }
        if self.value_keynames.is_empty() {
            return fail("at least one value column is required".to_string());
        }
        let headers: HashSet<&str> = self.headers.iter().map(String::as_str).collect();
        if headers.len() != self.headers.len() {
            return fail("headers contain duplicates".to_string());
        }
        if !headers.contains(self.ts_keyname.as_str()) {
            return fail(format!("ts_keyname {} is not a header", self.ts_keyname));
        }
        for name in self.index_keynames.iter().chain(&self.value_keynames) {
            if !headers.contains(name.as_str()) {
                return fail(format!("column {name} is not a header"));
            }
            if *name == self.ts_keyname {
                return fail(format!("column {name} is the timestamp column"));
            }
            if self.blacklist.contains(name) {
                return fail(format!("column {name} is blacklisted"));
            }
        }
        if let Some(name) = self
            .index_keynames
            .iter()
            .find(|n| self.value_keynames.contains(*n))
        {
            return fail(format!("column {name} is both index and value column"));
        }
        Ok(())
    }

    /// Datatype of a value column; `asis` for unknown names.
    pub fn datatype(&self, column: &str) -> Datatype {
        self.datatypes
            .get(column)
            .copied()
            .unwrap_or(Datatype::Asis)
    }

    /// JSON Schema of the definition file format.
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(TableMetaFile)
    }
}
