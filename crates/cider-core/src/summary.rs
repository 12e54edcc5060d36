//! Descriptive statistics summary of a numeric series.

use serde::{Deserialize, Serialize};

use cider_math::{
    coefficient_of_variation, detect_outliers, interquartile_range, max, mean, median, min, mode,
    quartiles, shannon_entropy, standard_deviation, Quartiles, DEFAULT_OUTLIER_THRESHOLD,
};

/// Summary of the finite values in a series. Optional fields are `None` for
/// an empty series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub mode: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std_dev: f64,
    /// Coefficient of variation.
    pub cv: f64,
    pub quartiles: Quartiles,
    pub iqr: f64,
    pub outliers: Vec<f64>,
    /// Shannon entropy in bits.
    pub entropy: f64,
}

impl StatisticsSummary {
    pub fn from_values(values: &[f64]) -> Self {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        let present = !finite.is_empty();
        Self {
            count: finite.len(),
            mean: mean(&finite),
            median: median(&finite),
            mode: mode(&finite),
            min: present.then(|| min(&finite)),
            max: present.then(|| max(&finite)),
            std_dev: standard_deviation(&finite),
            cv: coefficient_of_variation(&finite),
            quartiles: quartiles(&finite),
            iqr: interquartile_range(&finite),
            outliers: detect_outliers(&finite, DEFAULT_OUTLIER_THRESHOLD),
            entropy: shannon_entropy(&finite),
        }
    }
}
