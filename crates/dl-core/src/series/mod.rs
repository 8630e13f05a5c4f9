//! Series arrays, their per-key statistics, and key selection.

mod array;
mod filter;
mod stats;

pub use array::{Series, SeriesArray};
pub use filter::KeyFilter;
pub use stats::{ColumnStats, SeriesStats};
