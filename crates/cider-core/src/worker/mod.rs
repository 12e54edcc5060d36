//! Background analytics scheduling.
//!
//! A single-consumer priority queue:
//!
//! - **Ordering**: priority descending, then enqueue order
//! - **Execution**: one task at a time, each raced against a timeout, with a
//!   yield between tasks
//! - **Results**: a bounded cache polled by task id, oldest evicted first
//!
//! Work is dispatched by task type to registered [`TaskHandler`]s.

pub mod handlers;
mod queue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cider_common::error::ErrorReport;
use cider_common::{Result, TaskId};

pub use handlers::{
    ComputeTrendsHandler, ComputeTrendsPayload, SummarizeHandler, SummarizePayload,
    TASK_COMPUTE_TRENDS, TASK_SUMMARIZE,
};
pub use queue::{QueueStatus, TaskQueue};

/// Lowest accepted priority.
pub const MIN_PRIORITY: u8 = 1;
/// Highest accepted priority.
pub const MAX_PRIORITY: u8 = 10;

/// Clamp a caller-supplied priority into `MIN_PRIORITY..=MAX_PRIORITY`.
pub fn clamp_priority(priority: i64) -> u8 {
    priority.clamp(i64::from(MIN_PRIORITY), i64::from(MAX_PRIORITY)) as u8
}

/// A queued unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerTask {
    pub task_id: TaskId,
    pub task_type: String,
    pub priority: u8,
    pub enqueued_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Outcome of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub task_id: TaskId,
    pub task_type: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl WorkerResult {
    fn finished(task: &WorkerTask, outcome: Result<serde_json::Value>, duration_ms: u64) -> Self {
        let (success, data, error) = match outcome {
            Ok(data) => (true, Some(data), None),
            Err(e) => (false, None, Some(e.to_report())),
        };
        Self {
            task_id: task.task_id.clone(),
            task_type: task.task_type.clone(),
            success,
            data,
            error,
            completed_at: Utc::now(),
            duration_ms,
        }
    }
}

/// Executes tasks of one type.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn run(&self, payload: serde_json::Value) -> Result<serde_json::Value>;
}
