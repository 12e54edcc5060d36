//! Built-in task handlers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use cider_common::{Error, Result};

use super::TaskHandler;
use crate::record::CiderRecord;
use crate::summary::StatisticsSummary;
use crate::trend::{TrendQuery, TrendService};

/// Task type computing a full [`TrendSet`](crate::trend::TrendSet).
pub const TASK_COMPUTE_TRENDS: &str = "compute_trends";
/// Task type summarizing a numeric series.
pub const TASK_SUMMARIZE: &str = "summarize_values";

fn parse_payload<T: serde::de::DeserializeOwned>(task_type: &str, payload: Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| Error::InvalidInput(format!("{task_type} payload: {e}")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeTrendsPayload {
    pub records: Vec<CiderRecord>,
    #[serde(default)]
    pub query: TrendQuery,
}

/// Runs [`TrendService::compute_trends`] off the caller's path.
#[derive(Debug, Clone)]
pub struct ComputeTrendsHandler {
    service: TrendService,
}

impl ComputeTrendsHandler {
    pub fn new(service: TrendService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TaskHandler for ComputeTrendsHandler {
    async fn run(&self, payload: Value) -> Result<Value> {
        let payload: ComputeTrendsPayload = parse_payload(TASK_COMPUTE_TRENDS, payload)?;
        let set = self
            .service
            .compute_trends(&payload.records, &payload.query)
            .await;
        Ok(serde_json::to_value(set)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizePayload {
    pub values: Vec<f64>,
}

/// Produces a [`StatisticsSummary`] of `values`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummarizeHandler;

#[async_trait]
impl TaskHandler for SummarizeHandler {
    async fn run(&self, payload: Value) -> Result<Value> {
        let payload: SummarizePayload = parse_payload(TASK_SUMMARIZE, payload)?;
        Ok(serde_json::to_value(StatisticsSummary::from_values(&payload.values))?)
    }
}
