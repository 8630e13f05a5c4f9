//! Per-key five-bucket distributions of a series array, one [`Quantile`] per
//! value column, persisted as `quantile.json`.
//!
//! All keys of a column share one [`Scale`], so histograms of different keys
//! are directly comparable and can be ranked against each other.

use crate::cache::{read_cached, write_cached, CacheError, QUANTILE_FILE};
use crate::series::SeriesArray;
use dl_common::{ArtifactTier, CompositeKey, Error, Result};
use dl_math::{histogram, weighted_score, Histogram, Scale, BUCKETS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantileError {
    #[error("no samples to calculate quantiles from")]
    Empty,

    #[error("value column {0} not found")]
    UnknownColumn(String),

    #[error("bucket {0} out of range, histograms have {BUCKETS} buckets")]
    InvalidBucket(usize),
}

impl From<QuantileError> for Error {
    fn from(err: QuantileError) -> Self {
        Error::Quantile(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuantileEntry {
    key: CompositeKey,
    buckets: Histogram,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuantileFile {
    max: f64,
    min: f64,
    histograms: Vec<QuantileEntry>,
}

/// Histograms of one value column for every key with samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "QuantileFile", into = "QuantileFile")]
pub struct Quantile {
    histograms: BTreeMap<CompositeKey, Histogram>,
    scale: Scale,
    /// Keys in ascending rank.
    order: Vec<CompositeKey>,
}

impl Quantile {
    /// Histograms over the scale spanning all samples of `column`.
    pub fn new(array: &SeriesArray, column: &str) -> std::result::Result<Self, QuantileError> {
        let samples = Self::samples(array, column)?;
        let scale =
            Scale::observed(samples.iter().map(|(_, values)| *values)).ok_or(QuantileError::Empty)?;
        Ok(Self::build(samples, scale))
    }

    /// Histograms over an explicit `max`/`min` scale.
    pub fn with_scale(
        array: &SeriesArray,
        column: &str,
        max: f64,
        min: f64,
    ) -> std::result::Result<Self, QuantileError> {
        let samples = Self::samples(array, column)?;
        if samples.is_empty() {
            return Err(QuantileError::Empty);
        }
        Ok(Self::build(samples, Scale::new(max, min)))
    }

    fn samples<'a>(
        array: &'a SeriesArray,
        column: &str,
    ) -> std::result::Result<Vec<(&'a CompositeKey, &'a [f64])>, QuantileError> {
        let samples = array
            .column(column)
            .ok_or_else(|| QuantileError::UnknownColumn(column.to_string()))?
            .filter(|(_, values)| !values.is_empty())
            .collect();
        Ok(samples)
    }

    fn build(samples: Vec<(&CompositeKey, &[f64])>, scale: Scale) -> Self {
        if scale.is_degenerate() {
            debug!(max = scale.max, min = scale.min, "degenerate scale, all histograms are empty");
        }
        let histograms = samples
            .into_iter()
            .map(|(key, values)| (key.clone(), histogram(&scale, values)))
            .collect();
        Self::ranked(histograms, scale)
    }

    fn ranked(histograms: BTreeMap<CompositeKey, Histogram>, scale: Scale) -> Self {
        let mut quantile = Self {
            histograms,
            scale,
            order: Vec::new(),
        };
        quantile.rank_by(weighted_score);
        quantile
    }

    fn rank_by(&mut self, score: impl Fn(&Histogram) -> u64) {
        let mut ranked: Vec<(&CompositeKey, &Histogram)> = self.histograms.iter().collect();
        ranked.sort_by_key(|(_, counts)| score(counts));
        self.order = ranked.into_iter().map(|(key, _)| key.clone()).collect();
    }

    /// Rank keys by the weighted score, or by the count of one bucket.
    ///
    /// Ascending and stable: keys with equal score stay in key order.
    pub fn sort(&mut self, bucket: Option<usize>) -> std::result::Result<(), QuantileError> {
        match bucket {
            None => self.rank_by(weighted_score),
            Some(b) if b < BUCKETS => self.rank_by(|counts| counts[b]),
            Some(b) => return Err(QuantileError::InvalidBucket(b)),
        }
        Ok(())
    }

    /// The `n` highest-ranked keys, highest first.
    pub fn head(&self, n: usize) -> Vec<(&CompositeKey, &Histogram)> {
        self.order
            .iter()
            .rev()
            .take(n)
            .filter_map(|key| self.histograms.get_key_value(key))
            .collect()
    }

    /// The `n` lowest-ranked keys, lowest first.
    pub fn tail(&self, n: usize) -> Vec<(&CompositeKey, &Histogram)> {
        self.order
            .iter()
            .take(n)
            .filter_map(|key| self.histograms.get_key_value(key))
            .collect()
    }

    pub fn get(&self, key: &CompositeKey) -> Option<&Histogram> {
        self.histograms.get(key)
    }

    pub fn histograms(&self) -> &BTreeMap<CompositeKey, Histogram> {
        &self.histograms
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn max(&self) -> f64 {
        self.scale.max
    }

    pub fn min(&self) -> f64 {
        self.scale.min
    }

    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }
}

impl PartialEq for Quantile {
    fn eq(&self, other: &Self) -> bool {
        self.histograms == other.histograms && self.scale == other.scale
    }
}

impl From<QuantileFile> for Quantile {
    fn from(file: QuantileFile) -> Self {
        let histograms = file
            .histograms
            .into_iter()
            .map(|entry| (entry.key, entry.buckets))
            .collect();
        Self::ranked(histograms, Scale::new(file.max, file.min))
    }
}

impl From<Quantile> for QuantileFile {
    fn from(quantile: Quantile) -> Self {
        QuantileFile {
            max: quantile.scale.max,
            min: quantile.scale.min,
            histograms: quantile
                .histograms
                .into_iter()
                .map(|(key, buckets)| QuantileEntry { key, buckets })
                .collect(),
        }
    }
}

/// One [`Quantile`] per value column of a series array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileArray {
    keys: Vec<CompositeKey>,
    value_keys: Vec<String>,
    quantiles: BTreeMap<String, Quantile>,
}

impl QuantileArray {
    pub fn new(array: &SeriesArray) -> std::result::Result<Self, QuantileError> {
        if array.is_empty() {
            return Err(QuantileError::Empty);
        }
        let quantiles = array
            .value_keys()
            .iter()
            .map(|column| Ok((column.clone(), Quantile::new(array, column)?)))
            .collect::<std::result::Result<_, QuantileError>>()?;
        Ok(Self {
            keys: array.keys().cloned().collect(),
            value_keys: array.value_keys().to_vec(),
            quantiles,
        })
    }

    pub fn keys(&self) -> &[CompositeKey] {
        &self.keys
    }

    pub fn value_keys(&self) -> &[String] {
        &self.value_keys
    }

    /// Quantile of one value column.
    pub fn get(&self, column: &str) -> Option<&Quantile> {
        self.quantiles.get(column)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut Quantile> {
        self.quantiles.get_mut(column)
    }

    /// Histogram of every value column for one key.
    pub fn for_key(&self, key: &CompositeKey) -> BTreeMap<&str, Histogram> {
        self.quantiles
            .iter()
            .filter_map(|(column, q)| q.get(key).map(|h| (column.as_str(), *h)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Quantile)> {
        self.quantiles.iter().map(|(column, q)| (column.as_str(), q))
    }

    pub fn dump(&self, dir: &Path) -> Result<()> {
        write_cached(&dir.join(QUANTILE_FILE), ArtifactTier::Quantile, self)
    }

    pub fn load(dir: &Path) -> std::result::Result<Self, CacheError> {
        read_cached(&dir.join(QUANTILE_FILE), ArtifactTier::Quantile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(name: &str) -> CompositeKey {
        CompositeKey::new([name])
    }

    fn array(series: &[(&str, &[f64])]) -> SeriesArray {
        let mut array = SeriesArray::new(vec!["host".into()], vec!["load".into()]);
        for (name, values) in series {
            for (i, v) in values.iter().enumerate() {
                array.insert(key(name), i as i64 * 300, &[*v]).unwrap();
            }
        }
        array
    }

    #[test]
    fn spread_key_outranks_low_key() {
        let array = array(&[
            ("a", &[0.0, 25.0, 50.0, 75.0, 100.0]),
            ("b", &[0.0, 1.0, 2.0, 3.0, 4.0]),
        ]);
        let mut q = Quantile::new(&array, "load").unwrap();
        assert_eq!(q.get(&key("a")), Some(&[1, 1, 1, 1, 1]));
        assert_eq!(q.get(&key("b")), Some(&[5, 0, 0, 0, 0]));
        assert_eq!(q.head(1), vec![(&key("a"), &[1, 1, 1, 1, 1])]);
        assert_eq!(q.tail(1), vec![(&key("b"), &[5, 0, 0, 0, 0])]);

        q.sort(Some(0)).unwrap();
        assert_eq!(q.head(1)[0].0, &key("b"));
        assert_eq!(q.sort(Some(5)), Err(QuantileError::InvalidBucket(5)));
    }

    #[test]
    fn head_and_tail_are_bounded() {
        let array = array(&[("a", &[1.0]), ("b", &[2.0]), ("c", &[3.0])]);
        let q = Quantile::new(&array, "load").unwrap();
        assert_eq!(q.head(10).len(), 3);
        assert_eq!(q.tail(2).len(), 2);
        assert!(q.head(0).is_empty());
        let head: Vec<_> = q.head(3).into_iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(head, vec![key("c"), key("b"), key("a")]);
    }

    #[test]
    fn ties_keep_key_order() {
        let array = array(&[("b", &[5.0]), ("a", &[5.0]), ("c", &[5.0])]);
        let q = Quantile::new(&array, "load").unwrap();
        let tail: Vec<_> = q.tail(3).into_iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(tail, vec![key("a"), key("b"), key("c")]);
    }

    #[test]
    fn zero_maximum_gives_empty_histograms() {
        let array = array(&[("a", &[0.0, -1.0]), ("b", &[-4.0])]);
        let q = Quantile::new(&array, "load").unwrap();
        assert!(q.histograms().values().all(|h| *h == [0; BUCKETS]));
        assert_eq!(q.max(), 0.0);
        assert_eq!(q.min(), -4.0);
    }

    #[test]
    fn explicit_scale_clamps() {
        let array = array(&[("a", &[10.0, 200.0])]);
        let q = Quantile::with_scale(&array, "load", 100.0, 0.0).unwrap();
        assert_eq!(q.get(&key("a")), Some(&[1, 0, 0, 0, 1]));
    }

    #[test]
    fn empty_input_is_an_error() {
        let empty = array(&[]);
        assert_eq!(QuantileArray::new(&empty), Err(QuantileError::Empty));
        assert_eq!(
            Quantile::new(&empty, "load").unwrap_err(),
            QuantileError::Empty
        );
        let some = array(&[("a", &[1.0])]);
        assert_eq!(
            Quantile::new(&some, "nope").unwrap_err(),
            QuantileError::UnknownColumn("nope".into())
        );
        let err: Error = QuantileError::Empty.into();
        assert_eq!(err.code(), 40);
    }

    #[test]
    fn equality_ignores_sort_order() {
        let array = array(&[("a", &[0.0, 100.0]), ("b", &[50.0])]);
        let q = Quantile::new(&array, "load").unwrap();
        let mut resorted = q.clone();
        resorted.sort(Some(2)).unwrap();
        assert_eq!(q, resorted);
    }

    #[test]
    fn array_roundtrip_restores_ranking() {
        let dir = TempDir::new().unwrap();
        let array = array(&[
            ("a", &[0.0, 25.0, 50.0, 75.0, 100.0]),
            ("b", &[0.0, 1.0, 2.0, 3.0, 4.0]),
        ]);
        let mut qa = QuantileArray::new(&array).unwrap();
        qa.get_mut("load").unwrap().sort(Some(0)).unwrap();
        qa.dump(dir.path()).unwrap();

        let loaded = QuantileArray::load(dir.path()).unwrap();
        assert_eq!(loaded, qa);
        assert_eq!(loaded.keys(), &[key("a"), key("b")]);
        // loaded quantiles start out weighted again
        assert_eq!(loaded.get("load").unwrap().head(1)[0].0, &key("a"));
        assert_eq!(loaded.for_key(&key("b"))["load"], [5, 0, 0, 0, 0]);
    }
}
