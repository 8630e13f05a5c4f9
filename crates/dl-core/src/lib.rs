//! DataLogger core library.
//!
//! Turns daily raw monitoring exports into a chain of cached, derived
//! artifacts: per-key series, per-key statistics, per-column histograms and
//! day-wide totals.

pub mod cache;
pub mod calendar;
pub mod exit_codes;
pub mod ingest;
pub mod logging;
pub mod quantile;
pub mod series;
pub mod session;
pub mod total_stats;

pub use dl_common::{ArtifactTier, CompositeKey, Error, Result};
pub use quantile::{Quantile, QuantileArray, QuantileError};
pub use series::{KeyFilter, SeriesArray, SeriesStats};
pub use session::{CacheInventory, DataLogger, Session};
pub use total_stats::{ColumnTotals, TotalStats};
