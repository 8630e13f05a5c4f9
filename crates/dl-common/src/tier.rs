//! The artifact dependency chain.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One stage of raw → series array → series stats → quantile → total stats.
///
/// Each tier is derived only from its immediate predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactTier {
    Raw,
    SeriesArray,
    SeriesStats,
    Quantile,
    TotalStats,
}

impl ArtifactTier {
    /// All tiers in dependency order.
    pub const ALL: [ArtifactTier; 5] = [
        ArtifactTier::Raw,
        ArtifactTier::SeriesArray,
        ArtifactTier::SeriesStats,
        ArtifactTier::Quantile,
        ArtifactTier::TotalStats,
    ];

    /// The tier this one is derived from.
    pub fn predecessor(self) -> Option<ArtifactTier> {
        match self {
            ArtifactTier::Raw => None,
            ArtifactTier::SeriesArray => Some(ArtifactTier::Raw),
            ArtifactTier::SeriesStats => Some(ArtifactTier::SeriesArray),
            ArtifactTier::Quantile => Some(ArtifactTier::SeriesStats),
            ArtifactTier::TotalStats => Some(ArtifactTier::Quantile),
        }
    }

    /// The tier whose data the derivation actually reads.
    ///
    /// Histograms need raw samples and the totals need per-key statistics,
    /// so both skip over their chain predecessor.
    pub fn source(self) -> Option<ArtifactTier> {
        match self {
            ArtifactTier::Quantile => Some(ArtifactTier::SeriesArray),
            ArtifactTier::TotalStats => Some(ArtifactTier::SeriesStats),
            other => other.predecessor(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactTier::Raw => "raw",
            ArtifactTier::SeriesArray => "series_array",
            ArtifactTier::SeriesStats => "series_stats",
            ArtifactTier::Quantile => "quantile",
            ArtifactTier::TotalStats => "total_stats",
        }
    }
}

impl fmt::Display for ArtifactTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
