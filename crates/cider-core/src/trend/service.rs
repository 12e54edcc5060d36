//! Batch trend computation over journal records, cached.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use cider_common::{Granularity, Result, TimeRange};
use cider_config::SamplingSettings;
use cider_math::{mean, sum};

use super::analyzer::{TrendAnalysis, TrendAnalyzer};
use super::grouping::{group_by_time_period, GroupedRecords};
use super::range::filter_by_time_range;
use crate::cache::{CacheManager, SetOptions};
use crate::record::{CiderRecord, DateField, NumericField};
use crate::sampling::{apply_sampling, create_default_strategy, SamplingMetadata};

/// Cache dependency tag for anything derived from the record set.
pub const DEP_RECORDS: &str = "records";
/// Cache dependency tag for trend results.
pub const DEP_TRENDS: &str = "trends";

/// Hex digits of the record fingerprint kept in cache keys.
const FINGERPRINT_LEN: usize = 16;

/// Parameters of a trend computation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendQuery {
    pub range: TimeRange,
    pub granularity: Granularity,
    pub date_field: DateField,
}

/// All trends of one computation. A trend is `None` when it had no data or
/// its computation failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSet {
    pub collection_growth: Option<TrendAnalysis>,
    pub rating_trend: Option<TrendAnalysis>,
    pub spending_trend: Option<TrendAnalysis>,
    pub abv_trend: Option<TrendAnalysis>,
    pub sampling: SamplingMetadata,
    /// Records inside the query's time range.
    pub record_count: usize,
}

/// `trends:<range>:<granularity>:<fingerprint>`, with custom ranges encoded
/// as `custom:<start ms>..<end ms>`.
pub fn trend_cache_key(records: &[CiderRecord], query: &TrendQuery) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.date_field.to_string().as_bytes());
    for record in records {
        hasher.update(record.id.as_bytes());
        hasher.update([0x1f]);
        hasher.update(record.date(query.date_field).unwrap_or("").as_bytes());
        for field in [NumericField::Rating, NumericField::Price, NumericField::Abv] {
            match record.value(field) {
                Some(v) => hasher.update(v.to_bits().to_le_bytes()),
                None => hasher.update([0u8]),
            }
        }
        hasher.update([0x1e]);
    }
    let digest = hex::encode(hasher.finalize());
    format!(
        "trends:{}:{}:{}",
        query.range.cache_token(),
        query.granularity,
        &digest[..FINGERPRINT_LEN]
    )
}

/// Computes [`TrendSet`]s and keeps them in the [`CacheManager`].
#[derive(Debug, Clone)]
pub struct TrendService {
    analyzer: TrendAnalyzer,
    cache: Arc<CacheManager>,
    sampling: SamplingSettings,
}

impl TrendService {
    pub fn new(analyzer: TrendAnalyzer, cache: Arc<CacheManager>, sampling: SamplingSettings) -> Self {
        Self {
            analyzer,
            cache,
            sampling,
        }
    }

    pub fn analyzer(&self) -> &TrendAnalyzer {
        &self.analyzer
    }

    /// Compute (or fetch from cache) every trend for `records`.
    #[instrument(name = "trends.compute", skip(self, records), fields(
        records = records.len(),
        range = %query.range,
        granularity = %query.granularity,
    ))]
    pub async fn compute_trends(&self, records: &[CiderRecord], query: &TrendQuery) -> TrendSet {
        let key = trend_cache_key(records, query);
        if let Some(cached) = self.cache.get::<TrendSet>(&key).await {
            debug!(key = %key, "trend set served from cache");
            return cached;
        }

        let set = self.compute_uncached(records, query);

        let options = SetOptions::default()
            .with_dependency(DEP_RECORDS)
            .with_dependency(DEP_TRENDS);
        if let Err(e) = self.cache.set(&key, &set, options).await {
            warn!(key = %key, error = %e, "trend set not cached");
        }
        set
    }

    /// Compute every trend without consulting the cache.
    pub fn compute_uncached(&self, records: &[CiderRecord], query: &TrendQuery) -> TrendSet {
        let field = query.date_field;
        let granularity = query.granularity;
        let in_range = filter_by_time_range(records, &query.range, |r| r.parsed_date(field));

        let strategy = create_default_strategy(in_range.len(), &self.sampling);
        let (sample, sampling) = apply_sampling(&in_range, &strategy, |r| {
            r.parsed_date(field).map(|at| granularity.key_for(at))
        });
        let scale = sampling.scale_factor();

        let grouped = group_by_time_period(sample.iter().copied(), granularity, |r| {
            r.parsed_date(field)
        });
        debug!(
            buckets = grouped.len(),
            dropped = grouped.dropped,
            sampled = sampling.sampled,
            "records grouped"
        );

        TrendSet {
            collection_growth: self.guarded(
                "collection_growth",
                self.analyzer
                    .analyze_trend(&grouped, |b| Some(b.len() as f64 * scale), "collection_growth"),
            ),
            rating_trend: self.guarded(
                "rating_trend",
                self.field_trend(&grouped, NumericField::Rating, "rating_trend", |v| Some(mean(v))),
            ),
            spending_trend: self.guarded(
                "spending_trend",
                self.field_trend(&grouped, NumericField::Price, "spending_trend", |v| {
                    Some(sum(v) * scale)
                }),
            ),
            abv_trend: self.guarded(
                "abv_trend",
                self.field_trend(&grouped, NumericField::Abv, "abv_trend", |v| Some(mean(v))),
            ),
            sampling,
            record_count: in_range.len(),
        }
    }

    /// Trend over one numeric field; buckets with no value for it are skipped.
    fn field_trend<F>(
        &self,
        grouped: &GroupedRecords<'_, CiderRecord>,
        field: NumericField,
        label: &str,
        reduce: F,
    ) -> Result<Option<TrendAnalysis>>
    where
        F: Fn(&[f64]) -> Option<f64>,
    {
        self.analyzer.analyze_trend(
            grouped,
            |bucket| {
                let values: Vec<f64> = bucket
                    .iter()
                    .filter_map(|r| r.value(field))
                    .filter(|v| v.is_finite())
                    .collect();
                if values.is_empty() {
                    None
                } else {
                    reduce(&values)
                }
            },
            label,
        )
    }

    /// One failing trend must not take its siblings down.
    fn guarded(
        &self,
        label: &str,
        result: Result<Option<TrendAnalysis>>,
    ) -> Option<TrendAnalysis> {
        match result {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(trend = label, error = %e, "trend computation failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::trend::TrendDirection;
    use cider_config::{CacheSettings, TrendSettings};

    fn service() -> TrendService {
        let cache = Arc::new(CacheManager::new(
            Arc::new(MemoryStore::new()),
            CacheSettings::default(),
        ));
        TrendService::new(
            TrendAnalyzer::new(TrendSettings::default()),
            cache,
            SamplingSettings::default(),
        )
    }

    fn journal() -> Vec<CiderRecord> {
        let mut records = Vec::new();
        for month in 1..=4u32 {
            for n in 0..month {
                records.push(
                    CiderRecord::new(format!("c{month}-{n}"))
                        .with_created_at(format!("2024-{month:02}-{:02}", n + 1))
                        .with_rating(2.0 + f64::from(month) * 0.5)
                        .with_price(5.0),
                );
            }
        }
        records.push(CiderRecord::new("undated").with_rating(1.0));
        records
    }

    #[test]
    fn test_cache_key_shape_and_sensitivity() {
        let records = journal();
        let query = TrendQuery::default();
        let key = trend_cache_key(&records, &query);
        assert!(key.starts_with("trends:ALL:month:"));
        assert_eq!(key.len(), "trends:ALL:month:".len() + FINGERPRINT_LEN);

        let mut changed = records.clone();
        changed[0].rating = Some(5.0);
        assert_ne!(key, trend_cache_key(&changed, &query));
    }

    #[test]
    fn test_compute_uncached_trends() {
        let set = service().compute_uncached(&journal(), &TrendQuery::default());
        let growth = set.collection_growth.unwrap();
        assert_eq!(growth.direction, TrendDirection::Increasing);
        assert_eq!(growth.data_points.len(), 4);

        let rating = set.rating_trend.unwrap();
        assert_eq!(rating.direction, TrendDirection::Increasing);
        assert!((rating.slope - 0.5).abs() < 1e-9);

        let spending = set.spending_trend.unwrap();
        assert_eq!(spending.data_points[3].value, 20.0);

        assert!(set.abv_trend.is_none());
        assert!(!set.sampling.sampled);
        assert_eq!(set.record_count, 11);
    }

    #[tokio::test]
    async fn test_compute_trends_is_cached() {
        let svc = service();
        let records = journal();
        let query = TrendQuery::default();
        let first = svc.compute_trends(&records, &query).await;
        let second = svc.compute_trends(&records, &query).await;
        assert_eq!(first, second);
        assert_eq!(svc.cache.stats().hits, 1);

        assert_eq!(svc.cache.invalidate(DEP_RECORDS).await, 1);
        let _ = svc.compute_trends(&records, &query).await;
        assert_eq!(svc.cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_same_day_custom_ranges_cached_separately() {
        use chrono::TimeZone;

        let at = |h| chrono::Utc.with_ymd_and_hms(2024, 3, 10, h, 0, 0).unwrap();
        let records: Vec<CiderRecord> = [0, 6, 12, 18]
            .into_iter()
            .map(|h| {
                CiderRecord::new(format!("c{h}"))
                    .with_created_at(at(h).to_rfc3339())
                    .with_rating(7.0)
            })
            .collect();
        let query = |end_hour| TrendQuery {
            range: TimeRange::Custom {
                start: at(0),
                end: at(end_hour),
            },
            granularity: Granularity::Day,
            date_field: DateField::CreatedAt,
        };

        let svc = service();
        let narrow = svc.compute_trends(&records, &query(1)).await;
        let wide = svc.compute_trends(&records, &query(23)).await;
        assert_eq!(narrow.record_count, 1);
        assert_eq!(wide.record_count, 4);
        assert_eq!(svc.cache.stats().hits, 0);
        assert_ne!(
            trend_cache_key(&records, &query(1)),
            trend_cache_key(&records, &query(23))
        );
    }
}
