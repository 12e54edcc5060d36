//! Percentiles, quartiles, and IQR outlier detection.

use serde::{Deserialize, Serialize};

use super::sorted_finite;

/// Default Tukey fence multiplier.
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 1.5;

/// Minimum sample size for outlier detection.
pub const MIN_OUTLIER_SAMPLE: usize = 4;

/// First, second and third quartiles.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quartiles {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
}

/// Linearly interpolated percentile over an already sorted, finite slice.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
            let rank = p / 100.0 * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            if lower == upper {
                return sorted[lower];
            }
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

/// The `p`th percentile (0..=100) using linear interpolation between ranks.
///
/// `p` is clamped to [0, 100]. Empty input yields 0.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    percentile_sorted(&sorted_finite(values), p)
}

/// Quartiles at the 25th, 50th and 75th percentiles.
pub fn quartiles(values: &[f64]) -> Quartiles {
    let sorted = sorted_finite(values);
    Quartiles {
        q1: percentile_sorted(&sorted, 25.0),
        q2: percentile_sorted(&sorted, 50.0),
        q3: percentile_sorted(&sorted, 75.0),
    }
}

/// Q3 - Q1.
pub fn interquartile_range(values: &[f64]) -> f64 {
    let q = quartiles(values);
    q.q3 - q.q1
}

/// Values outside `[q1 - k*iqr, q3 + k*iqr]`, in input order.
///
/// Needs at least [`MIN_OUTLIER_SAMPLE`] finite points; smaller samples
/// return no outliers.
pub fn detect_outliers(values: &[f64], threshold: f64) -> Vec<f64> {
    let sorted = sorted_finite(values);
    if sorted.len() < MIN_OUTLIER_SAMPLE {
        return Vec::new();
    }
    let q1 = percentile_sorted(&sorted, 25.0);
    let q3 = percentile_sorted(&sorted, 75.0);
    let iqr = q3 - q1;
    let lower = q1 - threshold * iqr;
    let upper = q3 + threshold * iqr;

    values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && (*v < lower || *v > upper))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 100.0), 4.0);
        assert!((percentile(&v, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&v, 25.0) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn percentile_clamps_argument() {
        let v = [10.0, 20.0, 30.0];
        assert_eq!(percentile(&v, -20.0), 10.0);
        assert_eq!(percentile(&v, 250.0), 30.0);
    }

    #[test]
    fn quartiles_and_iqr() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        let q = quartiles(&v);
        assert_eq!(q, Quartiles { q1: 2.0, q2: 3.0, q3: 4.0 });
        assert_eq!(interquartile_range(&v), 2.0);
    }

    #[test]
    fn outliers_need_four_points() {
        assert!(detect_outliers(&[1.0, 2.0, 100.0], DEFAULT_OUTLIER_THRESHOLD).is_empty());
    }

    #[test]
    fn outliers_flag_extremes() {
        let v = [10.0, 12.0, 11.0, 13.0, 12.0, 95.0, 11.0];
        let out = detect_outliers(&v, DEFAULT_OUTLIER_THRESHOLD);
        assert_eq!(out, vec![95.0]);
    }

    #[test]
    fn outliers_ignore_nan() {
        let v = [1.0, 2.0, f64::NAN, 2.0, 3.0];
        assert!(detect_outliers(&v, DEFAULT_OUTLIER_THRESHOLD).is_empty());
    }
}
