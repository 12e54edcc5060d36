//! Descriptive statistics over numeric samples.
//!
//! Variance and standard deviation use the sample (n - 1) estimator.

use super::{finite, sorted_finite};

/// Sum of the finite values. Empty input sums to 0.
pub fn sum(values: &[f64]) -> f64 {
    values.iter().filter(|v| v.is_finite()).sum()
}

/// Arithmetic mean of the finite values, or 0 when there are none.
pub fn mean(values: &[f64]) -> f64 {
    let clean = finite(values);
    if clean.is_empty() {
        return 0.0;
    }
    clean.iter().sum::<f64>() / clean.len() as f64
}

/// Median of the finite values, or 0 when there are none.
///
/// Even-length samples average the two middle values.
pub fn median(values: &[f64]) -> f64 {
    let sorted = sorted_finite(values);
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Most frequent finite value. Ties resolve to the value seen first.
pub fn mode(values: &[f64]) -> Option<f64> {
    // (value, count) in first-seen order; samples are small enough that a
    // linear scan beats hashing float bit patterns.
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for v in values.iter().copied().filter(|v| v.is_finite()) {
        let v = if v == 0.0 { 0.0 } else { v };
        match counts.iter_mut().find(|(seen, _)| *seen == v) {
            Some((_, c)) => *c += 1,
            None => counts.push((v, 1)),
        }
    }

    let mut best: Option<(f64, usize)> = None;
    for (v, c) in counts {
        match best {
            Some((_, best_c)) if c <= best_c => {}
            _ => best = Some((v, c)),
        }
    }
    best.map(|(v, _)| v)
}

/// Smallest finite value; `+inf` for empty input.
pub fn min(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::INFINITY, f64::min)
}

/// Largest finite value; `-inf` for empty input.
pub fn max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Sample variance (divides by n - 1). Returns 0 for fewer than two values.
pub fn variance(values: &[f64]) -> f64 {
    let clean = finite(values);
    let n = clean.len();
    if n < 2 {
        return 0.0;
    }
    let m = clean.iter().sum::<f64>() / n as f64;
    let ss: f64 = clean.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (n - 1) as f64).max(0.0)
}

/// Sample standard deviation.
pub fn standard_deviation(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Standard deviation relative to the mean.
///
/// Returns 0 when the mean is 0 or there are fewer than two values.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let clean = finite(values);
    if clean.len() < 2 {
        return 0.0;
    }
    let m = mean(&clean);
    if m == 0.0 {
        return 0.0;
    }
    standard_deviation(&clean) / m
}

/// Standard score of `value` against the sample.
///
/// Returns 0 when the sample has fewer than two values or no spread.
pub fn z_score(value: f64, values: &[f64]) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let clean = finite(values);
    if clean.len() < 2 {
        return 0.0;
    }
    let sd = standard_deviation(&clean);
    if sd == 0.0 {
        return 0.0;
    }
    (value - mean(&clean)) / sd
}
