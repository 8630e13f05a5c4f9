//! Reading daily raw input files.

mod raw;

pub use raw::{resolve_raw_file, RawReader, RawRow, RowError};
