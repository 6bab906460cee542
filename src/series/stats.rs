//! Median and nearest-rank confidence wings over sparse measurements.
//!
//! The wings are order statistics, not interpolated percentiles: with `n`
//! valid values sorted ascending, the low wing is the element whose index is
//! closest to `(1 - f)·n` and the high wing the one closest to `f·n`, ties
//! going to the smaller index. For small `n` both can land on the same
//! element and the band collapses to a point.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum StatsError {
    #[error("No valid values to summarize")]
    InsufficientData,
    #[error("Band fraction {0} outside (0, 1)")]
    InvalidFraction(f64),
}

/// Median with asymmetric error bars: the band is `[median - err_low, median + err_high]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub median: f64,
    pub err_low: f64,
    pub err_high: f64,
}

impl Band {
    pub fn low(&self) -> f64 {
        self.median - self.err_low
    }

    pub fn high(&self) -> f64 {
        self.median + self.err_high
    }

    /// Rescale units (e.g. milliseconds → minutes).
    pub fn scaled(self, factor: f64) -> Band {
        Band {
            median: self.median * factor,
            err_low: self.err_low * factor,
            err_high: self.err_high * factor,
        }
    }
}

/// Drop missing and NaN values, sort ascending.
fn valid_sorted(values: &[Option<f64>]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| !v.is_nan())
        .collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

fn nearest_index(n: usize, target: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for i in 0..n {
        let dist = (i as f64 - target).abs();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// Indices of the low and high wings for `n` sorted values.
pub fn wing_indices(n: usize, frac: f64) -> (usize, usize) {
    let n_f = n as f64;
    (
        nearest_index(n, (1.0 - frac) * n_f),
        nearest_index(n, frac * n_f),
    )
}

pub fn check_fraction(frac: f64) -> Result<(), StatsError> {
    if frac > 0.0 && frac < 1.0 {
        Ok(())
    } else {
        Err(StatsError::InvalidFraction(frac))
    }
}

/// Low and high wing values.
pub fn confidence_wings(values: &[Option<f64>], frac: f64) -> Result<(f64, f64), StatsError> {
    check_fraction(frac)?;
    let sorted = valid_sorted(values);
    if sorted.is_empty() {
        return Err(StatsError::InsufficientData);
    }
    let (lo, hi) = wing_indices(sorted.len(), frac);
    Ok((sorted[lo], sorted[hi]))
}

/// Median of the valid values (mean of the middle pair for even counts).
pub fn median(values: &[Option<f64>]) -> Result<f64, StatsError> {
    let sorted = valid_sorted(values);
    median_of_sorted(&sorted)
}

fn median_of_sorted(sorted: &[f64]) -> Result<f64, StatsError> {
    let n = sorted.len();
    if n == 0 {
        return Err(StatsError::InsufficientData);
    }
    if n % 2 == 1 {
        Ok(sorted[n / 2])
    } else {
        Ok((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// Median plus distances to both wings.
pub fn band(values: &[Option<f64>], frac: f64) -> Result<Band, StatsError> {
    check_fraction(frac)?;
    let sorted = valid_sorted(values);
    let median = median_of_sorted(&sorted)?;
    let (lo, hi) = wing_indices(sorted.len(), frac);
    Ok(Band {
        median,
        err_low: median - sorted[lo],
        err_high: sorted[hi] - median,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|&v| Some(v)).collect()
    }

    #[test]
    fn test_wings_five_values() {
        let values = some(&[50.0, 10.0, 40.0, 20.0, 30.0]);
        // (1-0.84)*5 = 0.8 → index 1; 0.84*5 = 4.2 → index 4
        assert_eq!(wing_indices(5, 0.84), (1, 4));
        assert_eq!(confidence_wings(&values, 0.84).unwrap(), (20.0, 50.0));
    }

    #[test]
    fn test_wings_deterministic() {
        let values = some(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let first = confidence_wings(&values, 0.84).unwrap();
        for _ in 0..10 {
            assert_eq!(confidence_wings(&values, 0.84).unwrap(), first);
        }
    }

    #[test]
    fn test_wing_order_for_upper_fractions() {
        for n in 1..60 {
            for frac in [0.51, 0.6, 0.75, 0.84, 0.95, 0.99] {
                let (lo, hi) = wing_indices(n, frac);
                assert!(lo <= hi, "n={n} frac={frac}");
                assert!(hi < n);
            }
        }
    }

    #[test]
    fn test_tie_goes_to_smaller_index() {
        // n = 4, f = 0.875: high target 3.5 sits between 3 and 4, only 3 exists;
        // low target 0.5 is equidistant from 0 and 1 → 0
        assert_eq!(wing_indices(4, 0.875), (0, 3));
    }

    #[test]
    fn test_missing_values_ignored() {
        let values = vec![None, Some(3.0), Some(f64::NAN), Some(1.0), None, Some(2.0)];
        assert_eq!(median(&values).unwrap(), 2.0);
        let b = band(&values, 0.84).unwrap();
        assert_eq!(b.median, 2.0);
        assert_eq!(b.low(), 1.0);
        assert_eq!(b.high(), 3.0);
    }

    #[test]
    fn test_even_median_interpolates() {
        assert_eq!(median(&some(&[1.0, 2.0, 3.0, 10.0])).unwrap(), 2.5);
    }

    #[test]
    fn test_single_value_collapses_band() {
        let b = band(&some(&[7.0]), 0.84).unwrap();
        assert_eq!(b, Band { median: 7.0, err_low: 0.0, err_high: 0.0 });
    }

    #[test]
    fn test_empty_is_insufficient() {
        assert_eq!(confidence_wings(&[None, None], 0.84), Err(StatsError::InsufficientData));
        assert_eq!(median(&[]), Err(StatsError::InsufficientData));
        assert_eq!(band(&[Some(f64::NAN)], 0.84), Err(StatsError::InsufficientData));
    }

    #[test]
    fn test_fraction_validated() {
        let values = some(&[1.0]);
        assert_eq!(confidence_wings(&values, 1.0), Err(StatsError::InvalidFraction(1.0)));
        assert_eq!(band(&values, 0.0), Err(StatsError::InvalidFraction(0.0)));
    }

    #[test]
    fn test_band_scaling() {
        let b = band(&some(&[60_000.0, 120_000.0, 180_000.0]), 0.84)
            .unwrap()
            .scaled(1.0 / 60_000.0);
        assert!((b.median - 2.0).abs() < 1e-12);
        assert!((b.err_low - 1.0).abs() < 1e-12);
        assert!((b.err_high - 1.0).abs() < 1e-12);
    }
}
