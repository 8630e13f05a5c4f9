//! Fixed five-bucket histograms over a percentage scale.
//!
//! A sample `v` is placed relative to a [`Scale`] as
//! `⌊(100 · (v + |min|) / (max + |min|)) / width⌋` with `width = ⌊100 / 4⌋`,
//! so the five buckets cover the percentiles 0-24, 25-49, 50-74, 75-99 and
//! exactly 100.

use serde::{Deserialize, Serialize};

/// Number of buckets per histogram.
pub const BUCKETS: usize = 5;

/// Sample counts per bucket, index 0 is the lowest.
pub type Histogram = [u64; BUCKETS];

/// Width of one bucket in percent.
pub const fn bucket_width() -> u32 {
    100 / (BUCKETS as u32 - 1)
}

/// Value range used to place samples into buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub max: f64,
    pub min: f64,
}

impl Scale {
    pub fn new(max: f64, min: f64) -> Self {
        Self { max, min }
    }

    /// Scale spanning every sample of every series; `None` without samples.
    pub fn observed<'a, I>(series: I) -> Option<Scale>
    where
        I: IntoIterator<Item = &'a [f64]>,
    {
        let mut bounds: Option<(f64, f64)> = None;
        for values in series {
            for &v in values {
                bounds = Some(match bounds {
                    None => (v, v),
                    Some((max, min)) => (max.max(v), min.min(v)),
                });
            }
        }
        bounds.map(|(max, min)| Scale { max, min })
    }

    /// True when every histogram over this scale is all-zero.
    pub fn is_degenerate(&self) -> bool {
        let span = self.max + self.min.abs();
        self.max == 0.0 || bucket_width() == 0 || span.is_nan() || span <= 0.0
    }

    /// Bucket of one sample, clamped into `0..BUCKETS`.
    pub fn bucket_index(&self, value: f64) -> usize {
        let offset = self.min.abs();
        let percent = 100.0 * (value + offset) / (self.max + offset);
        let index = (percent / f64::from(bucket_width())).floor();
        if index.is_nan() {
            0
        } else {
            index.clamp(0.0, (BUCKETS - 1) as f64) as usize
        }
    }
}

/// Histogram of one series; all-zero for a degenerate scale.
pub fn histogram(scale: &Scale, values: &[f64]) -> Histogram {
    let mut counts = [0u64; BUCKETS];
    if scale.is_degenerate() {
        return counts;
    }
    for &v in values {
        counts[scale.bucket_index(v)] += 1;
    }
    counts
}

/// Ranking score `Σ count[i] · 10^i`: samples in high buckets dominate.
pub fn weighted_score(counts: &Histogram) -> u64 {
    counts
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &count)| {
            acc.saturating_add(count.saturating_mul(10u64.pow(i as u32)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn width_is_25() {
        assert_eq!(bucket_width(), 25);
    }

    #[test]
    fn boundaries_follow_floor_formula() {
        let scale = Scale::new(100.0, 0.0);
        assert_eq!(histogram(&scale, &[0.0, 25.0, 50.0, 75.0, 100.0]), [1, 1, 1, 1, 1]);
        assert_eq!(histogram(&scale, &[10.0; 5]), [5, 0, 0, 0, 0]);
        assert_eq!(scale.bucket_index(24.999), 0);
        assert_eq!(scale.bucket_index(99.999), 3);
    }

    #[test]
    fn negative_minimum_shifts_samples() {
        let scale = Scale::new(10.0, -10.0);
        assert_eq!(scale.bucket_index(-10.0), 0);
        assert_eq!(scale.bucket_index(0.0), 2);
        assert_eq!(scale.bucket_index(10.0), 4);
    }

    #[test]
    fn zero_maximum_is_degenerate() {
        let scale = Scale::new(0.0, -5.0);
        assert!(scale.is_degenerate());
        assert_eq!(histogram(&scale, &[-5.0, -1.0, 0.0]), [0; BUCKETS]);
    }

    #[test]
    fn zero_span_is_degenerate() {
        let scale = Scale::new(-5.0, -5.0);
        assert!(scale.is_degenerate());
    }

    #[test]
    fn out_of_scale_samples_are_clamped() {
        let scale = Scale::new(50.0, 0.0);
        assert_eq!(scale.bucket_index(500.0), 4);
        assert_eq!(scale.bucket_index(-500.0), 0);
        assert_eq!(scale.bucket_index(f64::NAN), 0);
    }

    #[test]
    fn observed_scale() {
        let a = [3.0, 9.0];
        let b = [-1.0];
        let scale = Scale::observed([&a[..], &b[..]]).unwrap();
        assert_eq!(scale, Scale::new(9.0, -1.0));
        assert!(Scale::observed(Vec::<&[f64]>::new()).is_none());
    }

    #[test]
    fn weighted_score_prefers_high_buckets() {
        assert_eq!(weighted_score(&[1, 1, 1, 1, 1]), 11111);
        assert_eq!(weighted_score(&[5, 0, 0, 0, 0]), 5);
        assert!(weighted_score(&[0, 0, 0, 0, 1]) > weighted_score(&[9, 9, 9, 9, 0]));
    }

    proptest! {
        #[test]
        fn histogram_conserves_samples(
            values in proptest::collection::vec(-1.0e6f64..1.0e6, 0..200),
            max in 1.0f64..1.0e6,
            min in -1.0e6f64..1.0e6,
        ) {
            let scale = Scale::new(max, min);
            prop_assume!(!scale.is_degenerate());
            let counts = histogram(&scale, &values);
            prop_assert_eq!(counts.iter().sum::<u64>(), values.len() as u64);
        }
    }
}
