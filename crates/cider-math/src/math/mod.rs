//! Core statistics modules.

pub mod descriptive;
pub mod entropy;
pub mod quantile;
pub mod regression;

/// Copy the finite values out of `values`, preserving order.
pub(crate) fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Finite values sorted ascending.
pub(crate) fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut out = finite(values);
    out.sort_by(f64::total_cmp);
    out
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
