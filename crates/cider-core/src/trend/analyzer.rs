//! Direction classification and short-horizon prediction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cider_common::{Error, Granularity, PeriodKey, Result};
use cider_config::TrendSettings;
use cider_math::{linear_regression, round_to, Point, Regression};

use super::chart::{format_chart_data, ChartData};
use super::grouping::GroupedRecords;

/// Digits kept on predicted values and confidences.
const OUTPUT_PRECISION: u32 = 4;

/// One bucket's reduced value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub period: PeriodKey,
    /// Start of the period.
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    /// Records in the bucket.
    pub count: usize,
}

/// Classified trend direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

/// Extrapolated value for a future period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub period: PeriodKey,
    /// Never negative.
    pub value: f64,
    /// Within [0, 1].
    pub confidence: f64,
}

/// Finished analysis of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub label: String,
    pub direction: TrendDirection,
    pub slope: f64,
    /// Regression R², within [0, 1].
    pub confidence: f64,
    /// Chronological.
    pub data_points: Vec<DataPoint>,
    pub predictions: Vec<Prediction>,
    pub chart_data: ChartData,
}

/// Fits and classifies grouped series.
#[derive(Debug, Clone, Default)]
pub struct TrendAnalyzer {
    settings: TrendSettings,
}

impl TrendAnalyzer {
    pub fn new(settings: TrendSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TrendSettings {
        &self.settings
    }

    /// Direction implied by `slope` under the configured stable band.
    pub fn classify(&self, slope: f64) -> TrendDirection {
        let threshold = self.settings.stable_slope_threshold;
        if slope > threshold {
            TrendDirection::Increasing
        } else if slope < -threshold {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }

    /// Analyze one series.
    ///
    /// `extractor` reduces a bucket to its value; buckets where it returns
    /// `None` contribute no data point. Returns `Ok(None)` when no data point
    /// remains, and `Err(InvalidInput)` when the extractor produced a
    /// non-finite value.
    pub fn analyze_trend<R, F>(
        &self,
        grouped: &GroupedRecords<'_, R>,
        extractor: F,
        label: &str,
    ) -> Result<Option<TrendAnalysis>>
    where
        F: Fn(&[&R]) -> Option<f64>,
    {
        let granularity = grouped.granularity;
        let mut points = Vec::with_capacity(grouped.len());
        for (period, records) in &grouped.buckets {
            let Some(value) = extractor(records) else {
                continue;
            };
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!(
                    "{label}: non-finite value for period {period}"
                )));
            }
            let timestamp = granularity.period_start(period).ok_or_else(|| {
                Error::InvalidInput(format!("{label}: unparseable period key {period}"))
            })?;
            points.push(DataPoint {
                period: period.clone(),
                timestamp,
                value,
                count: records.len(),
            });
        }
        points.sort_by_key(|p| p.timestamp);

        match points.len() {
            0 => Ok(None),
            1 => Ok(Some(TrendAnalysis {
                label: label.to_string(),
                direction: TrendDirection::Stable,
                slope: 0.0,
                confidence: 0.0,
                chart_data: format_chart_data(&points, granularity),
                data_points: points,
                predictions: Vec::new(),
            })),
            _ => {
                let xy: Vec<Point> = points
                    .iter()
                    .enumerate()
                    .map(|(i, p)| Point::new(i as f64, p.value))
                    .collect();
                let regression = linear_regression(&xy);
                let predictions = match points.last() {
                    Some(last) => self.generate_predictions(
                        &regression,
                        points.len() - 1,
                        &last.period,
                        granularity,
                    ),
                    None => Vec::new(),
                };
                Ok(Some(TrendAnalysis {
                    label: label.to_string(),
                    direction: self.classify(regression.slope),
                    slope: regression.slope,
                    confidence: regression.r_squared.clamp(0.0, 1.0),
                    chart_data: format_chart_data(&points, granularity),
                    data_points: points,
                    predictions,
                }))
            }
        }
    }

    /// Extrapolate `prediction_periods` periods past `last_index`.
    ///
    /// Step `i` gets confidence `max(0, R² - i * step)`.
    pub fn generate_predictions(
        &self,
        regression: &Regression,
        last_index: usize,
        last_period: &PeriodKey,
        granularity: Granularity,
    ) -> Vec<Prediction> {
        let r_squared = regression.r_squared.clamp(0.0, 1.0);
        (1..=self.settings.prediction_periods)
            .map(|step| {
                let x = (last_index + step as usize) as f64;
                let value = regression.predict(x).max(0.0);
                let confidence = r_squared - f64::from(step) * self.settings.prediction_confidence_step;
                Prediction {
                    period: granularity
                        .advance(last_period, step)
                        .unwrap_or_else(|| PeriodKey(format!("{last_period}+{step}"))),
                    value: round_to(value, OUTPUT_PRECISION),
                    confidence: round_to(confidence.clamp(0.0, 1.0), OUTPUT_PRECISION),
                }
            })
            .collect()
    }
}
