//! Per-key statistics of a series array, persisted as `tsastat_<index token>.json`.

use crate::cache::{read_cached, series_stats_file_name, write_cached, CacheError};
use crate::series::{KeyFilter, SeriesArray};
use dl_common::{ArtifactTier, CompositeKey, Result};
use dl_math::{stat_record, StatFunc, StatRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Statistics of every value column of one key.
pub type ColumnStats = BTreeMap<String, StatRecord>;

#[derive(Debug, Serialize, Deserialize)]
struct KeyStats {
    key: CompositeKey,
    stats: ColumnStats,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatsFile {
    index_keys: Vec<String>,
    value_keys: Vec<String>,
    entries: Vec<KeyStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStats {
    index_keys: Vec<String>,
    value_keys: Vec<String>,
    stats: BTreeMap<CompositeKey, ColumnStats>,
}

impl SeriesStats {
    /// Compute every statistical function for every key and value column.
    pub fn from_array(array: &SeriesArray) -> Self {
        let stats = array
            .iter()
            .map(|(key, series)| {
                let columns = array
                    .value_keys()
                    .iter()
                    .enumerate()
                    .map(|(i, column)| (column.clone(), stat_record(series.column(i))))
                    .collect();
                (key.clone(), columns)
            })
            .collect();
        Self {
            index_keys: array.index_keys().to_vec(),
            value_keys: array.value_keys().to_vec(),
            stats,
        }
    }

    pub fn index_keys(&self) -> &[String] {
        &self.index_keys
    }

    pub fn value_keys(&self) -> &[String] {
        &self.value_keys
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn get(&self, key: &CompositeKey) -> Option<&ColumnStats> {
        self.stats.get(key)
    }

    /// One statistic of one key and column.
    pub fn value(&self, key: &CompositeKey, column: &str, func: StatFunc) -> Option<f64> {
        self.stats.get(key)?.get(column)?.get(&func).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, &ColumnStats)> {
        self.stats.iter()
    }

    pub fn filtered(&self, filter: &KeyFilter) -> Self {
        Self {
            index_keys: self.index_keys.clone(),
            value_keys: self.value_keys.clone(),
            stats: self
                .stats
                .iter()
                .filter(|(key, _)| filter.matches(&self.index_keys, key))
                .map(|(key, s)| (key.clone(), s.clone()))
                .collect(),
        }
    }

    pub fn file_name(&self) -> String {
        series_stats_file_name(&self.index_keys)
    }

    pub fn dump(&self, dir: &Path) -> Result<()> {
        let file = StatsFile {
            index_keys: self.index_keys.clone(),
            value_keys: self.value_keys.clone(),
            entries: self
                .stats
                .iter()
                .map(|(key, stats)| KeyStats {
                    key: key.clone(),
                    stats: stats.clone(),
                })
                .collect(),
        };
        write_cached(&dir.join(self.file_name()), ArtifactTier::SeriesStats, &file)?;
        debug!(dir = %dir.display(), keys = self.len(), "series stats dumped");
        Ok(())
    }

    pub fn load(
        dir: &Path,
        index_keys: &[String],
        value_keys: &[String],
        filter: Option<&KeyFilter>,
    ) -> std::result::Result<Self, CacheError> {
        let path = dir.join(series_stats_file_name(index_keys));
        let file: StatsFile = read_cached(&path, ArtifactTier::SeriesStats)?;
        if file.index_keys != index_keys {
            return Err(CacheError::corrupted(
                &path,
                format!("stats are keyed by {:?}", file.index_keys),
            ));
        }
        if file.value_keys != value_keys {
            return Err(CacheError::corrupted(
                &path,
                format!("stats hold value columns {:?}", file.value_keys),
            ));
        }
        let stats = file
            .entries
            .into_iter()
            .filter(|entry| filter.map_or(true, |f| f.matches(&file.index_keys, &entry.key)))
            .map(|entry| (entry.key, entry.stats))
            .collect();
        Ok(Self {
            index_keys: file.index_keys,
            value_keys: file.value_keys,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn array() -> SeriesArray {
        let mut array = SeriesArray::new(vec!["host".into()], vec!["load".into(), "mem".into()]);
        let srv1 = CompositeKey::new(["srv1"]);
        array.insert(srv1.clone(), 0, &[1.0, 10.0]).unwrap();
        array.insert(srv1.clone(), 300, &[3.0, 5.0]).unwrap();
        array.insert(srv1, 600, &[2.0, 20.0]).unwrap();
        array.insert(CompositeKey::new(["srv2"]), 0, &[7.0, 0.0]).unwrap();
        array
    }

    #[test]
    fn stats_cover_every_column() {
        let stats = SeriesStats::from_array(&array());
        let srv1 = CompositeKey::new(["srv1"]);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats.value(&srv1, "load", StatFunc::Avg), Some(2.0));
        assert_eq!(stats.value(&srv1, "load", StatFunc::Inc), Some(2.0));
        assert_eq!(stats.value(&srv1, "load", StatFunc::Dec), Some(1.0));
        assert_eq!(stats.value(&srv1, "mem", StatFunc::Max), Some(20.0));
        assert_eq!(stats.value(&srv1, "mem", StatFunc::Count), Some(3.0));
        assert_eq!(stats.get(&srv1).unwrap()["mem"].len(), StatFunc::ALL.len());
    }

    #[test]
    fn dump_then_load_with_filter() {
        let dir = TempDir::new().unwrap();
        let stats = SeriesStats::from_array(&array());
        stats.dump(dir.path()).unwrap();

        let all = SeriesStats::load(dir.path(), stats.index_keys(), stats.value_keys(), None)
            .unwrap();
        assert_eq!(all, stats);

        let filter = KeyFilter::new().with_part("host", "srv2");
        let some =
            SeriesStats::load(dir.path(), stats.index_keys(), stats.value_keys(), Some(&filter))
                .unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some, stats.filtered(&filter));

        let err = SeriesStats::load(dir.path(), stats.index_keys(), &["load".to_string()], None)
            .unwrap_err();
        assert!(matches!(err, CacheError::Corrupted { .. }), "{err}");
    }
}
