//! Property-based tests for cider-math statistics.
//!
//! Uses proptest to verify statistical invariants hold across many random inputs.

use cider_math::{
    detect_outliers, linear_regression, max, mean, min, percentile, shannon_entropy,
    standard_deviation, variance, Point, DEFAULT_OUTLIER_THRESHOLD,
};
use proptest::prelude::*;

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-9;

fn sample() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0e6..1.0e6f64, 1..64)
}

// ============================================================================
// Central tendency and spread
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// The mean lies between the extremes.
    #[test]
    fn mean_within_min_max(v in sample()) {
        let m = mean(&v);
        let lo = min(&v);
        let hi = max(&v);
        let slack = TOL * lo.abs().max(hi.abs()).max(1.0);
        prop_assert!(m >= lo - slack && m <= hi + slack, "mean {} outside [{}, {}]", m, lo, hi);
    }

    /// Variance is never negative.
    #[test]
    fn variance_non_negative(v in sample()) {
        prop_assert!(variance(&v) >= 0.0);
        prop_assert!(standard_deviation(&v) >= 0.0);
    }

    /// A constant sample has exactly zero variance.
    #[test]
    fn constant_sample_zero_variance(x in -1.0e6..1.0e6f64, n in 1usize..50) {
        let v = vec![x; n];
        prop_assert_eq!(variance(&v), 0.0);
    }

    /// Non-finite noise does not change the result.
    #[test]
    fn non_finite_values_are_ignored(v in sample()) {
        let mut noisy = v.clone();
        noisy.push(f64::NAN);
        noisy.push(f64::INFINITY);
        noisy.insert(0, f64::NEG_INFINITY);
        prop_assert_eq!(mean(&noisy), mean(&v));
        prop_assert_eq!(variance(&noisy), variance(&v));
    }
}

// ============================================================================
// Quantiles
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// percentile is monotonic non-decreasing in its argument.
    #[test]
    fn percentile_monotonic(v in sample(), a in 0.0..100.0f64, b in 0.0..100.0f64) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(percentile(&v, lo) <= percentile(&v, hi) + TOL);
    }

    /// Outlier detection on fewer than four points is always empty.
    #[test]
    fn outliers_small_samples_empty(v in prop::collection::vec(-1.0e6..1.0e6f64, 0..4)) {
        prop_assert!(detect_outliers(&v, DEFAULT_OUTLIER_THRESHOLD).is_empty());
    }
}

// ============================================================================
// Regression
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Points exactly on a line recover its slope and intercept.
    #[test]
    fn regression_recovers_exact_line(
        m in -100.0..100.0f64,
        b in -100.0..100.0f64,
        n in 2usize..40,
    ) {
        let pts: Vec<Point> = (0..n).map(|i| Point::new(i as f64, m * i as f64 + b)).collect();
        let r = linear_regression(&pts);
        prop_assert!((r.slope - m).abs() < 1e-3, "slope {} vs {}", r.slope, m);
        prop_assert!((r.intercept - b).abs() < 1e-3, "intercept {} vs {}", r.intercept, b);
        prop_assert!(r.r_squared > 0.999);
    }

    /// R² stays inside [0, 1] for arbitrary data.
    #[test]
    fn regression_r_squared_bounded(ys in prop::collection::vec(-1.0e3..1.0e3f64, 0..40)) {
        let pts: Vec<Point> = ys.iter().enumerate().map(|(i, y)| Point::new(i as f64, *y)).collect();
        let r = linear_regression(&pts);
        prop_assert!((0.0..=1.0).contains(&r.r_squared));
    }

    /// Entropy is non-negative and bounded by log2 of the distinct count.
    #[test]
    fn entropy_bounded(v in prop::collection::vec(0u8..8, 0..100)) {
        let values: Vec<f64> = v.iter().map(|x| *x as f64).collect();
        let h = shannon_entropy(&values);
        let mut distinct = v.clone();
        distinct.sort_unstable();
        distinct.dedup();
        let bound = (distinct.len().max(1) as f64).log2();
        prop_assert!(h >= 0.0);
        prop_assert!(h <= bound + TOL);
    }
}
