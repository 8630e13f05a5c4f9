//! Raw input files: `<raw_dir>/<table>_<day>.csv`, optionally gzipped.
//!
//! The first line is a header and is skipped. Empty lines and lines starting
//! with `#` are ignored. Every other line is split on the table delimiter and
//! zipped with the declared headers. Rows that are not UTF-8 or whose
//! timestamp cannot be parsed are logged and skipped; rows outside the day
//! window are dropped silently.

use crate::calendar::{day_window, format_day};
use chrono::NaiveDate;
use dl_common::{Error, Result};
use dl_config::TableMetadata;
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Locate the raw file of `table` for `day`, preferring the plain file.
pub fn resolve_raw_file(raw_dir: &Path, table: &str, day: NaiveDate) -> Result<PathBuf> {
    let plain = raw_dir.join(format!("{table}_{}.csv", format_day(day)));
    if plain.is_file() {
        return Ok(plain);
    }
    let mut gz = plain.clone().into_os_string();
    gz.push(".gz");
    let gz = PathBuf::from(gz);
    if gz.is_file() {
        return Ok(gz);
    }
    Err(Error::RawFileMissing { path: plain })
}

/// One parsed raw line.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// Corrected epoch seconds.
    pub ts: i64,
    /// Header name to raw field text, blacklisted columns removed.
    pub fields: BTreeMap<String, String>,
}

impl RawRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

/// Why a single row was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("timestamp column {0} missing")]
    MissingTimestamp(String),

    #[error("timestamp {0:?} is not a number")]
    BadTimestamp(String),

    #[error("column {0} missing")]
    MissingColumn(String),

    #[error("value {value:?} of column {column} is not numeric")]
    BadValue { column: String, value: String },
}

/// Streaming reader over the rows of one raw file.
pub struct RawReader {
    lines: Box<dyn BufRead + Send>,
    path: PathBuf,
    meta: Arc<TableMetadata>,
    window: (i64, i64),
    timedelta: f64,
    line_no: usize,
    accepted: usize,
    skipped: usize,
    done: bool,
}

impl std::fmt::Debug for RawReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawReader")
            .field("path", &self.path)
            .field("window", &self.window)
            .field("line_no", &self.line_no)
            .finish()
    }
}

impl RawReader {
    /// Open the raw file of `meta`'s table for `day`.
    ///
    /// `timedelta` seconds are added to every timestamp before the window
    /// check.
    pub fn open(meta: Arc<TableMetadata>, day: NaiveDate, timedelta: f64) -> Result<Self> {
        let path = resolve_raw_file(&meta.raw_dir, &meta.table, day)?;
        let file = File::open(&path)?;
        let lines: Box<dyn BufRead + Send> =
            if path.extension().is_some_and(|ext| ext == "gz") {
                Box::new(BufReader::new(GzDecoder::new(file)))
            } else {
                Box::new(BufReader::new(file))
            };
        let window = day_window(day);
        info!(path = %path.display(), start = window.0, stop = window.1, "reading raw input");
        Ok(Self {
            lines,
            path,
            meta,
            window,
            timedelta,
            line_no: 0,
            accepted: 0,
            skipped: 0,
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows rejected so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Parse one data line; `Ok(None)` for rows outside the window.
    fn parse_line(&self, line: &str) -> std::result::Result<Option<RawRow>, RowError> {
        let ts_name = &self.meta.ts_keyname;
        let mut fields = BTreeMap::new();
        let mut ts_field = None;
        for (header, value) in self
            .meta
            .headers
            .iter()
            .zip(line.split(self.meta.delimiter.as_str()))
        {
            if header == ts_name {
                ts_field = Some(value);
            } else if !self.meta.blacklist.contains(header) {
                fields.insert(header.clone(), value.to_string());
            }
        }
        let ts_field = ts_field.ok_or_else(|| RowError::MissingTimestamp(ts_name.clone()))?;
        let ts = ts_field
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|ts| ts.is_finite())
            .ok_or_else(|| RowError::BadTimestamp(ts_field.to_string()))?;
        let ts = (ts + self.timedelta) as i64;
        if ts < self.window.0 || ts > self.window.1 {
            return Ok(None);
        }
        Ok(Some(RawRow { ts, fields }))
    }
}

impl Iterator for RawReader {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = Vec::new();
        while !self.done {
            buf.clear();
            match self.lines.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    self.done = true;
                    debug!(
                        path = %self.path.display(),
                        accepted = self.accepted,
                        skipped = self.skipped,
                        "raw input exhausted"
                    );
                }
                Ok(_) => {
                    self.line_no += 1;
                    if self.line_no == 1 {
                        continue;
                    }
                    let Ok(line) = std::str::from_utf8(&buf) else {
                        self.skipped += 1;
                        warn!(path = %self.path.display(), line = self.line_no, "skipping raw row with invalid UTF-8");
                        continue;
                    };
                    let line = line.trim_end_matches(['\n', '\r']);
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    match self.parse_line(line) {
                        Ok(Some(row)) => {
                            self.accepted += 1;
                            return Some(Ok(row));
                        }
                        Ok(None) => {}
                        Err(e) => {
                            self.skipped += 1;
                            warn!(path = %self.path.display(), line = self.line_no, error = %e, "skipping raw row");
                        }
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(Error::Io(e)));
                }
            }
        }
        None
    }
}
