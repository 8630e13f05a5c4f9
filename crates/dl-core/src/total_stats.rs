//! Day-wide aggregate of the per-key statistics, persisted as `total_stats.json`.

use crate::cache::{read_cached, write_cached, CacheError, TOTAL_STATS_FILE};
use crate::series::SeriesStats;
use dl_common::{ArtifactTier, Result};
use dl_math::{StatFunc, StatRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How one statistic is folded across keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Sum,
    Min,
    Max,
    /// Not meaningful across keys; reported as 0.0.
    Reset,
}

impl Combinator {
    pub fn for_stat(func: StatFunc) -> Combinator {
        match func {
            StatFunc::Sum | StatFunc::Count | StatFunc::Dec | StatFunc::Inc | StatFunc::Avg => {
                Combinator::Sum
            }
            StatFunc::Min => Combinator::Min,
            StatFunc::Max => Combinator::Max,
            StatFunc::Median
            | StatFunc::Last
            | StatFunc::Diff
            | StatFunc::First
            | StatFunc::Std
            | StatFunc::Mean => Combinator::Reset,
        }
    }

    /// Fold `value` into `acc`; every accumulator starts at 0.0.
    fn fold(self, acc: f64, value: f64) -> f64 {
        match self {
            Combinator::Sum => acc + value,
            Combinator::Min => acc.min(value),
            Combinator::Max => acc.max(value),
            Combinator::Reset => 0.0,
        }
    }
}

/// Aggregate of one value column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTotals {
    pub stats: StatRecord,
    /// Number of folded keys.
    pub total_count: u64,
    /// `sum / total_count`.
    pub total_avg: f64,
}

impl ColumnTotals {
    fn empty() -> Self {
        Self {
            stats: StatFunc::ALL.into_iter().map(|f| (f, 0.0)).collect(),
            total_count: 0,
            total_avg: 0.0,
        }
    }

    fn fold(&mut self, record: &StatRecord) {
        for (func, value) in record {
            let acc = self.stats.entry(*func).or_insert(0.0);
            *acc = Combinator::for_stat(*func).fold(*acc, *value);
        }
        self.total_count += 1;
    }

    fn finish(&mut self) {
        if self.total_count == 0 {
            self.total_avg = 0.0;
            return;
        }
        let keys = self.total_count as f64;
        self.total_avg = self.get(StatFunc::Sum) / keys;
        if let Some(avg) = self.stats.get_mut(&StatFunc::Avg) {
            *avg /= keys;
        }
    }

    pub fn get(&self, func: StatFunc) -> f64 {
        self.stats.get(&func).copied().unwrap_or(0.0)
    }
}

/// One [`ColumnTotals`] per value column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalStats {
    columns: BTreeMap<String, ColumnTotals>,
}

impl TotalStats {
    pub fn from_stats(stats: &SeriesStats) -> Self {
        let columns = stats
            .value_keys()
            .iter()
            .map(|column| {
                let mut totals = ColumnTotals::empty();
                for (_, per_column) in stats.iter() {
                    if let Some(record) = per_column.get(column) {
                        totals.fold(record);
                    }
                }
                totals.finish();
                (column.clone(), totals)
            })
            .collect();
        Self { columns }
    }

    pub fn get(&self, column: &str) -> Option<&ColumnTotals> {
        self.columns.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnTotals)> {
        self.columns.iter().map(|(c, t)| (c.as_str(), t))
    }

    pub fn dump(&self, dir: &Path) -> Result<()> {
        write_cached(&dir.join(TOTAL_STATS_FILE), ArtifactTier::TotalStats, self)
    }

    pub fn load(dir: &Path) -> std::result::Result<Self, CacheError> {
        read_cached(&dir.join(TOTAL_STATS_FILE), ArtifactTier::TotalStats)
    }
}
