//! Per-key time series of one day.
//!
//! Persisted as a listing `tsa_<index token>.json` naming every key, plus one
//! gzip-compressed CSV `ts_<key token>.csv.gz` per key. The listing is
//! written last, so a complete listing implies complete sample files.

use crate::cache::{
    read_cached, series_array_file_name, series_file_name, write_atomic, write_cached, CacheError,
};
use crate::ingest::{RawReader, RawRow, RowError};
use crate::series::KeyFilter;
use dl_common::{ArtifactTier, CompositeKey, Error, Result};
use dl_config::TableMetadata;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Samples of one key: timestamps plus one column per value key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    ts: Vec<i64>,
    columns: Vec<Vec<f64>>,
}

impl Series {
    pub fn new(width: usize) -> Self {
        Self {
            ts: Vec::new(),
            columns: vec![Vec::new(); width],
        }
    }

    fn push(&mut self, ts: i64, values: &[f64]) {
        self.ts.push(ts);
        for (column, &value) in self.columns.iter_mut().zip(values) {
            column.push(value);
        }
    }

    pub fn len(&self) -> usize {
        self.ts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ts.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.ts
    }

    /// Samples of the value column at `index`.
    pub fn column(&self, index: usize) -> &[f64] {
        self.columns.get(index).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Listing {
    index_keys: Vec<String>,
    value_keys: Vec<String>,
    keys: Vec<CompositeKey>,
}

/// Mapping from composite key to its series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesArray {
    index_keys: Vec<String>,
    value_keys: Vec<String>,
    series: BTreeMap<CompositeKey, Series>,
}

impl SeriesArray {
    pub fn new(index_keys: Vec<String>, value_keys: Vec<String>) -> Self {
        Self {
            index_keys,
            value_keys,
            series: BTreeMap::new(),
        }
    }

    /// Empty array shaped like `meta`'s table.
    pub fn for_table(meta: &TableMetadata) -> Self {
        Self::new(meta.index_keynames.clone(), meta.value_keynames.clone())
    }

    /// Group the rows of a raw reader by key.
    ///
    /// Rows missing a column or carrying a non-numeric value are skipped.
    pub fn from_raw(reader: RawReader, meta: &TableMetadata) -> Result<Self> {
        let mut array = Self::for_table(meta);
        let mut skipped = 0usize;
        for row in reader {
            let row = row?;
            if let Err(e) = array.add_row(&row, meta) {
                skipped += 1;
                warn!(ts = row.ts, error = %e, "skipping raw row");
            }
        }
        debug!(keys = array.len(), skipped, "grouped raw rows into series");
        Ok(array)
    }

    /// Append one raw row to the series of its key.
    pub fn add_row(&mut self, row: &RawRow, meta: &TableMetadata) -> std::result::Result<(), RowError> {
        let key = self
            .index_keys
            .iter()
            .map(|column| {
                row.get(column)
                    .map(str::to_string)
                    .ok_or_else(|| RowError::MissingColumn(column.clone()))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let values = self
            .value_keys
            .iter()
            .map(|column| {
                let raw = row
                    .get(column)
                    .ok_or_else(|| RowError::MissingColumn(column.clone()))?;
                meta.datatype(column)
                    .parse_value(raw)
                    .ok_or_else(|| RowError::BadValue {
                        column: column.clone(),
                        value: raw.to_string(),
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.push(CompositeKey::from(key), row.ts, &values);
        Ok(())
    }

    /// Append one sample; `values` follow [`value_keys`](Self::value_keys).
    pub fn insert(&mut self, key: CompositeKey, ts: i64, values: &[f64]) -> Result<()> {
        if key.len() != self.index_keys.len() {
            return Err(Error::Config(format!(
                "key {key} has {} parts, expected {}",
                key.len(),
                self.index_keys.len()
            )));
        }
        if values.len() != self.value_keys.len() {
            return Err(Error::Config(format!(
                "sample for {key} has {} values, expected {}",
                values.len(),
                self.value_keys.len()
            )));
        }
        self.push(key, ts, values);
        Ok(())
    }

    fn push(&mut self, key: CompositeKey, ts: i64, values: &[f64]) {
        let width = self.value_keys.len();
        self.series
            .entry(key)
            .or_insert_with(|| Series::new(width))
            .push(ts, values);
    }

    pub fn index_keys(&self) -> &[String] {
        &self.index_keys
    }

    pub fn value_keys(&self) -> &[String] {
        &self.value_keys
    }

    /// Position of a value column.
    pub fn value_index(&self, column: &str) -> Option<usize> {
        self.value_keys.iter().position(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CompositeKey> {
        self.series.keys()
    }

    pub fn get(&self, key: &CompositeKey) -> Option<&Series> {
        self.series.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, &Series)> {
        self.series.iter()
    }

    /// Samples of one value column for every key.
    pub fn column(&self, column: &str) -> Option<impl Iterator<Item = (&CompositeKey, &[f64])>> {
        let index = self.value_index(column)?;
        Some(self.series.iter().map(move |(key, s)| (key, s.column(index))))
    }

    /// Copy holding only the keys passing `filter`.
    pub fn filtered(&self, filter: &KeyFilter) -> Self {
        Self {
            index_keys: self.index_keys.clone(),
            value_keys: self.value_keys.clone(),
            series: self
                .series
                .iter()
                .filter(|(key, _)| filter.matches(&self.index_keys, key))
                .map(|(key, s)| (key.clone(), s.clone()))
                .collect(),
        }
    }

    pub fn file_name(&self) -> String {
        series_array_file_name(&self.index_keys)
    }

    /// Persist into `dir`.
    pub fn dump(&self, dir: &Path) -> Result<()> {
        for (key, series) in &self.series {
            let path = dir.join(series_file_name(key));
            write_atomic(&path, &self.encode_series(series)?)?;
        }
        let listing = Listing {
            index_keys: self.index_keys.clone(),
            value_keys: self.value_keys.clone(),
            keys: self.series.keys().cloned().collect(),
        };
        write_cached(&dir.join(self.file_name()), ArtifactTier::SeriesArray, &listing)?;
        debug!(dir = %dir.display(), keys = self.len(), "series array dumped");
        Ok(())
    }

    fn encode_series(&self, series: &Series) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        writeln!(encoder, "ts,{}", self.value_keys.join(","))?;
        for (i, ts) in series.ts.iter().enumerate() {
            write!(encoder, "{ts}")?;
            for column in &series.columns {
                write!(encoder, ",{}", column[i])?;
            }
            writeln!(encoder)?;
        }
        encoder.finish()
    }

    /// Load the array persisted in `dir` for `index_keys`.
    ///
    /// A listing with other value columns is stale and reported as corrupt.
    /// Only sample files of keys passing `filter` are read.
    pub fn load(
        dir: &Path,
        index_keys: &[String],
        value_keys: &[String],
        filter: Option<&KeyFilter>,
    ) -> std::result::Result<Self, CacheError> {
        let listing_path = dir.join(series_array_file_name(index_keys));
        let listing: Listing = read_cached(&listing_path, ArtifactTier::SeriesArray)?;
        if listing.index_keys != index_keys {
            return Err(CacheError::corrupted(
                &listing_path,
                format!("listing is keyed by {:?}", listing.index_keys),
            ));
        }
        if listing.value_keys != value_keys {
            return Err(CacheError::corrupted(
                &listing_path,
                format!("listing holds value columns {:?}", listing.value_keys),
            ));
        }
        let mut array = Self::new(listing.index_keys, listing.value_keys);
        for key in listing.keys {
            if filter.is_some_and(|f| !f.matches(&array.index_keys, &key)) {
                continue;
            }
            let series = array.read_series(dir, &key)?;
            array.series.insert(key, series);
        }
        Ok(array)
    }

    fn read_series(&self, dir: &Path, key: &CompositeKey) -> std::result::Result<Series, CacheError> {
        let path = dir.join(series_file_name(key));
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                CacheError::corrupted(&path, format!("sample file of listed key {key} is missing"))
            }
            _ => CacheError::from_io(&path, e),
        })?;
        let mut text = String::new();
        GzDecoder::new(file)
            .read_to_string(&mut text)
            .map_err(|e| CacheError::from_io(&path, e))?;

        let mut lines = text.lines();
        if lines.next().is_none() {
            return Err(CacheError::corrupted(&path, "empty sample file"));
        }
        let width = self.value_keys.len();
        let mut series = Series::new(width);
        let mut values = Vec::with_capacity(width);
        for (n, line) in lines.enumerate() {
            let bad = || CacheError::corrupted(&path, format!("malformed sample line {}", n + 2));
            let mut fields = line.split(',');
            let ts = fields
                .next()
                .and_then(|f| f.parse::<i64>().ok())
                .ok_or_else(bad)?;
            values.clear();
            for field in fields {
                values.push(field.parse::<f64>().map_err(|_| bad())?);
            }
            if values.len() != width {
                return Err(bad());
            }
            series.push(ts, &values);
        }
        Ok(series)
    }
}
