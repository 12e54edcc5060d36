//! Chart-ready projection of a trend's data points.

use cider_common::Granularity;
use serde::{Deserialize, Serialize};

use super::analyzer::DataPoint;

/// Parallel label/value series with summary bounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    /// 0 for an empty series.
    pub min: f64,
    /// 0 for an empty series.
    pub max: f64,
    pub mean: f64,
}

pub fn format_chart_data(points: &[DataPoint], granularity: Granularity) -> ChartData {
    if points.is_empty() {
        return ChartData::default();
    }
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    ChartData {
        labels: points
            .iter()
            .map(|p| granularity.label(&p.period))
            .collect(),
        min: cider_math::min(&values),
        max: cider_math::max(&values),
        mean: cider_math::round_to(cider_math::mean(&values), 4),
        values,
    }
}
