//! Trend analysis over dated records.
//!
//! Records are filtered to a [`TimeRange`](cider_common::TimeRange), grouped
//! into period buckets, reduced to one value per bucket, and fitted with a
//! least-squares line over the bucket index. The slope classifies the
//! direction; R² becomes the confidence.

mod analyzer;
mod chart;
mod grouping;
mod range;
mod service;

pub use analyzer::{DataPoint, Prediction, TrendAnalysis, TrendAnalyzer, TrendDirection};
pub use chart::{format_chart_data, ChartData};
pub use grouping::{group_by_time_period, GroupedRecords};
pub use range::filter_by_time_range;
pub use service::{trend_cache_key, TrendQuery, TrendService, TrendSet, DEP_RECORDS, DEP_TRENDS};
