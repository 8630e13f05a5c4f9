//! DataLogger math utilities.

pub mod math;

pub use math::histogram::*;
pub use math::stats::*;
