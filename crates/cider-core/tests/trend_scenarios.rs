//! End-to-end trend scenarios over journal records.

use std::sync::Arc;

use cider_common::{Granularity, TimeRange};
use cider_config::{AnalyticsConfig, SamplingSettings};
use cider_core::cache::MemoryStore;
use cider_core::trend::{group_by_time_period, TrendAnalyzer, TrendDirection, TrendQuery};
use cider_core::{AnalyticsEngine, CiderRecord, DateField};

/// `counts[m]` records in month `m + 1` of 2024.
fn monthly_records(counts: &[usize]) -> Vec<CiderRecord> {
    let mut records = Vec::new();
    for (month, &n) in counts.iter().enumerate() {
        for i in 0..n {
            records.push(
                CiderRecord::new(format!("m{}-{}", month + 1, i))
                    .with_created_at(format!("2024-{:02}-{:02}T12:00:00Z", month + 1, i + 1))
                    .with_price(4.0),
            );
        }
    }
    records
}

fn engine() -> AnalyticsEngine {
    AnalyticsEngine::new(AnalyticsConfig::default(), Arc::new(MemoryStore::new()))
}

#[test]
fn twelve_growing_months_trend_upwards() {
    let counts: Vec<usize> = (1..=12).collect();
    let records = monthly_records(&counts);
    let grouped = group_by_time_period(&records, Granularity::Month, |r| {
        r.parsed_date(DateField::CreatedAt)
    });
    assert_eq!(grouped.len(), 12);

    let analysis = TrendAnalyzer::default()
        .analyze_trend(&grouped, |bucket| Some(bucket.len() as f64), "growth")
        .unwrap()
        .unwrap();

    assert_eq!(analysis.direction, TrendDirection::Increasing);
    assert!(analysis.slope > 0.1);
    assert!((analysis.slope - 1.0).abs() < 1e-9);
    assert!(analysis.confidence > 0.95);

    assert_eq!(analysis.predictions.len(), 3);
    let periods: Vec<&str> = analysis.predictions.iter().map(|p| p.period.as_str()).collect();
    assert_eq!(periods, vec!["2025-01", "2025-02", "2025-03"]);
    let values: Vec<f64> = analysis.predictions.iter().map(|p| p.value).collect();
    assert_eq!(values, vec![13.0, 14.0, 15.0]);
    let confidences: Vec<f64> = analysis.predictions.iter().map(|p| p.confidence).collect();
    assert_eq!(confidences, vec![0.9, 0.8, 0.7]);

    assert_eq!(analysis.chart_data.labels.first().map(String::as_str), Some("Jan 2024"));
    assert_eq!(analysis.chart_data.max, 12.0);
}

#[test]
fn data_points_are_chronological_across_year_boundary() {
    let mut records = vec![
        CiderRecord::new("late").with_created_at("2025-01-03"),
        CiderRecord::new("early").with_created_at("2024-12-28"),
        CiderRecord::new("mid").with_created_at("2024-12-31"),
    ];
    records.push(CiderRecord::new("bad").with_created_at("31/12/2024"));
    let grouped = group_by_time_period(&records, Granularity::Week, |r| {
        r.parsed_date(DateField::CreatedAt)
    });
    assert_eq!(grouped.dropped, 1);

    let analysis = TrendAnalyzer::default()
        .analyze_trend(&grouped, |b| Some(b.len() as f64), "weekly")
        .unwrap()
        .unwrap();
    let periods: Vec<&str> = analysis.data_points.iter().map(|p| p.period.as_str()).collect();
    // 2024-12-28 is a Saturday in ISO week 52; the 31st and Jan 3rd share 2025-W01.
    assert_eq!(periods, vec!["2024-W52", "2025-W01"]);
    assert!(analysis.data_points[0].timestamp < analysis.data_points[1].timestamp);
}

#[tokio::test]
async fn relative_range_anchors_on_latest_record() {
    let counts: Vec<usize> = (1..=12).collect();
    let records = monthly_records(&counts);
    let query = TrendQuery {
        range: TimeRange::ThreeMonths,
        granularity: Granularity::Month,
        date_field: DateField::CreatedAt,
    };
    let set = engine().compute_trends(&records, &query).await;
    let growth = set.collection_growth.unwrap();
    // Latest record is 2024-12-12 noon, so the window opens 2024-09-12 noon
    // and every September record (days 1-9) falls before it.
    let periods: Vec<&str> = growth.data_points.iter().map(|p| p.period.as_str()).collect();
    assert_eq!(periods, vec!["2024-10", "2024-11", "2024-12"]);
    assert_eq!(set.record_count, 10 + 11 + 12);
    assert!(set.rating_trend.is_none());
    assert!(set.spending_trend.is_some());
}

#[tokio::test]
async fn empty_journal_yields_no_trends() {
    let set = engine().compute_trends(&[], &TrendQuery::default()).await;
    assert!(set.collection_growth.is_none());
    assert!(set.rating_trend.is_none());
    assert!(set.spending_trend.is_none());
    assert!(set.abv_trend.is_none());
    assert_eq!(set.record_count, 0);
}

#[tokio::test]
async fn oversized_journal_is_sampled_and_rescaled() {
    let mut config = AnalyticsConfig::default();
    config.sampling = SamplingSettings {
        threshold: 100,
        small_sample_size: 60,
        large_sample_size: 80,
        large_population: 10_000,
    };
    let engine = AnalyticsEngine::new(config, Arc::new(MemoryStore::new()));

    // 40 records per month for 6 months.
    let records = monthly_records(&[40; 6]);
    let set = engine.compute_trends(&records, &TrendQuery::default()).await;

    assert!(set.sampling.sampled);
    assert_eq!(set.sampling.total_population, 240);
    assert_eq!(set.sampling.sample_size, 60);
    assert_eq!(set.sampling.confidence_level, 0.90);

    let growth = set.collection_growth.unwrap();
    let estimated: f64 = growth.data_points.iter().map(|p| p.value).sum();
    assert!((estimated - 240.0).abs() < 1e-9);
    // Equal strata get equal allocations, so the estimate is flat.
    assert_eq!(growth.direction, TrendDirection::Stable);
}
