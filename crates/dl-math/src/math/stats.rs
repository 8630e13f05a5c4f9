//! Per-series statistical functions.
//!
//! Every function maps a series of samples to one `f64`. An empty series
//! yields 0.0 for every function, so callers never have to special-case
//! keys without samples.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Statistical function applied to one value column of one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatFunc {
    Min,
    Max,
    Avg,
    Sum,
    Std,
    Median,
    Count,
    First,
    Last,
    /// Midrange, `(min + max) / 2`.
    Mean,
    /// `last - first`.
    Diff,
    /// Sum of all positive steps between consecutive samples.
    Inc,
    /// Sum of the magnitudes of all negative steps.
    Dec,
}

/// Computed statistics of one value column.
pub type StatRecord = BTreeMap<StatFunc, f64>;

impl StatFunc {
    pub const ALL: [StatFunc; 13] = [
        StatFunc::Min,
        StatFunc::Max,
        StatFunc::Avg,
        StatFunc::Sum,
        StatFunc::Std,
        StatFunc::Median,
        StatFunc::Count,
        StatFunc::First,
        StatFunc::Last,
        StatFunc::Mean,
        StatFunc::Diff,
        StatFunc::Inc,
        StatFunc::Dec,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StatFunc::Min => "min",
            StatFunc::Max => "max",
            StatFunc::Avg => "avg",
            StatFunc::Sum => "sum",
            StatFunc::Std => "std",
            StatFunc::Median => "median",
            StatFunc::Count => "count",
            StatFunc::First => "first",
            StatFunc::Last => "last",
            StatFunc::Mean => "mean",
            StatFunc::Diff => "diff",
            StatFunc::Inc => "inc",
            StatFunc::Dec => "dec",
        }
    }

    /// Parse a function name as used in cache files and on the CLI.
    pub fn from_name(name: &str) -> Option<StatFunc> {
        StatFunc::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Apply the function to a series.
    pub fn compute(self, values: &[f64]) -> f64 {
        let (Some(&first), Some(&last)) = (values.first(), values.last()) else {
            return 0.0;
        };
        match self {
            StatFunc::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            StatFunc::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            StatFunc::Avg => sum(values) / values.len() as f64,
            StatFunc::Sum => sum(values),
            StatFunc::Std => std_dev(values),
            StatFunc::Median => median(values),
            StatFunc::Count => values.len() as f64,
            StatFunc::First => first,
            StatFunc::Last => last,
            StatFunc::Mean => (StatFunc::Min.compute(values) + StatFunc::Max.compute(values)) / 2.0,
            StatFunc::Diff => last - first,
            StatFunc::Inc => values
                .windows(2)
                .map(|w| w[1] - w[0])
                .filter(|d| *d > 0.0)
                .sum(),
            StatFunc::Dec => values
                .windows(2)
                .map(|w| w[0] - w[1])
                .filter(|d| *d > 0.0)
                .sum(),
        }
    }
}

impl fmt::Display for StatFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compute every statistical function over `values`.
pub fn stat_record(values: &[f64]) -> StatRecord {
    StatFunc::ALL
        .into_iter()
        .map(|func| (func, func.compute(values)))
        .collect()
}

fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = sum(values) / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
