//! Composition root: one engine owns the cache, the trend service and the
//! task queue. Nothing here is global; hosts create as many engines as they
//! need.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use cider_common::{Result, TaskId};
use cider_config::AnalyticsConfig;

use crate::cache::{CacheManager, PersistentStore};
use crate::clock::{Clock, SystemClock};
use crate::record::CiderRecord;
use crate::summary::StatisticsSummary;
use crate::trend::{TrendAnalyzer, TrendQuery, TrendService, TrendSet, DEP_RECORDS};
use crate::worker::{
    ComputeTrendsHandler, ComputeTrendsPayload, SummarizeHandler, SummarizePayload, TaskQueue,
    TASK_COMPUTE_TRENDS, TASK_SUMMARIZE,
};

#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    config: AnalyticsConfig,
    cache: Arc<CacheManager>,
    trends: TrendService,
    queue: TaskQueue,
}

impl AnalyticsEngine {
    pub fn new(config: AnalyticsConfig, store: Arc<dyn PersistentStore>) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: AnalyticsConfig,
        store: Arc<dyn PersistentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(CacheManager::with_clock(store, config.cache.clone(), clock));
        let trends = TrendService::new(
            TrendAnalyzer::new(config.trends.clone()),
            Arc::clone(&cache),
            config.sampling.clone(),
        );
        let queue = TaskQueue::new(config.worker.clone());
        queue.register_handler(
            TASK_COMPUTE_TRENDS,
            Arc::new(ComputeTrendsHandler::new(trends.clone())),
        );
        queue.register_handler(TASK_SUMMARIZE, Arc::new(SummarizeHandler));
        Self {
            config,
            cache,
            trends,
            queue,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Query using the configured default range and granularity.
    pub fn default_query(&self) -> TrendQuery {
        TrendQuery {
            range: self.config.trends.default_range,
            granularity: self.config.trends.default_granularity,
            ..TrendQuery::default()
        }
    }

    /// Compute trends inline.
    pub async fn compute_trends(&self, records: &[CiderRecord], query: &TrendQuery) -> TrendSet {
        self.trends.compute_trends(records, query).await
    }

    /// Queue a trend computation; poll the queue for its result.
    pub fn submit_trends(
        &self,
        records: Vec<CiderRecord>,
        query: TrendQuery,
        priority: i64,
    ) -> Result<TaskId> {
        let payload = serde_json::to_value(ComputeTrendsPayload { records, query })?;
        Ok(self.queue.enqueue(TASK_COMPUTE_TRENDS, priority, payload))
    }

    pub fn summarize(&self, values: &[f64]) -> StatisticsSummary {
        StatisticsSummary::from_values(values)
    }

    /// Queue a statistics summary.
    pub fn submit_summary(&self, values: Vec<f64>, priority: i64) -> Result<TaskId> {
        let payload = serde_json::to_value(SummarizePayload { values })?;
        Ok(self.queue.enqueue(TASK_SUMMARIZE, priority, payload))
    }

    /// Drop every cached result derived from the record set.
    pub async fn records_changed(&self) -> usize {
        let removed = self.cache.invalidate(DEP_RECORDS).await;
        info!(removed, "record set changed, derived results invalidated");
        removed
    }

    /// Start the background consumer on the current runtime.
    pub fn start_worker(&self) -> JoinHandle<()> {
        self.queue.spawn_worker()
    }

    pub fn shutdown(&self) {
        self.queue.shutdown();
    }
}
