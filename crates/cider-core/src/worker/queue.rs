//! Single-consumer priority task queue.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cider_common::{Error, TaskId};
use cider_config::WorkerSettings;

use super::{clamp_priority, TaskHandler, WorkerResult, WorkerTask};

/// Snapshot of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<TaskId>,
    /// Results currently retained.
    pub completed: usize,
    /// Tasks finished since construction, including evicted results.
    pub processed_total: u64,
}

/// Heap entry: higher priority first, then lower sequence (earlier enqueue).
#[derive(Debug)]
struct Pending {
    seq: u64,
    task: WorkerTask,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.task
            .priority
            .cmp(&other.task.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: BinaryHeap<Pending>,
    running: Option<TaskId>,
    results: VecDeque<WorkerResult>,
    next_seq: u64,
    processed_total: u64,
}

impl QueueState {
    fn store_result(&mut self, result: WorkerResult, capacity: usize) {
        self.processed_total += 1;
        self.results.push_back(result);
        while self.results.len() > capacity.max(1) {
            self.results.pop_front();
        }
    }
}

struct QueueInner {
    state: Mutex<QueueState>,
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
    settings: WorkerSettings,
    /// Held for the whole execution of a task.
    run_slot: tokio::sync::Mutex<()>,
    wake: Notify,
    shutdown: AtomicBool,
}

/// Priority queue of analytics tasks with a bounded result cache.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("status", &self.queue_status())
            .finish_non_exhaustive()
    }
}

impl TaskQueue {
    pub fn new(settings: WorkerSettings) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                handlers: RwLock::new(HashMap::new()),
                settings,
                run_slot: tokio::sync::Mutex::new(()),
                wake: Notify::new(),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handler_for(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task_type)
            .cloned()
    }

    /// Register (or replace) the handler for `task_type`.
    pub fn register_handler(&self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_type.into(), handler);
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.inner.settings.task_timeout_secs)
    }

    /// Queue a task; `priority` is clamped to 1..=10.
    ///
    /// A task type with no registered handler is not queued: its failed
    /// result is available from [`get_result`](Self::get_result) at once.
    pub fn enqueue(
        &self,
        task_type: impl Into<String>,
        priority: i64,
        payload: serde_json::Value,
    ) -> TaskId {
        let task = WorkerTask {
            task_id: TaskId::new(),
            task_type: task_type.into(),
            priority: clamp_priority(priority),
            enqueued_at: Utc::now(),
            payload,
        };
        let task_id = task.task_id.clone();

        if self.handler_for(&task.task_type).is_none() {
            warn!(task_id = %task_id, task_type = %task.task_type, "no handler for task type");
            let error = Error::UnknownTaskType(task.task_type.clone());
            let result = WorkerResult::finished(&task, Err(error), 0);
            self.lock_state()
                .store_result(result, self.inner.settings.result_cache_size);
            return task_id;
        }

        {
            let mut state = self.lock_state();
            let seq = state.next_seq;
            state.next_seq += 1;
            debug!(task_id = %task_id, priority = task.priority, "task enqueued");
            state.pending.push(Pending { seq, task });
        }
        self.inner.wake.notify_one();
        task_id
    }

    /// Non-blocking poll for a task's result.
    pub fn get_result(&self, task_id: &TaskId) -> Option<WorkerResult> {
        self.lock_state()
            .results
            .iter()
            .rev()
            .find(|r| &r.task_id == task_id)
            .cloned()
    }

    /// Drop a task that has not started yet. Returns false once it has been
    /// dequeued.
    pub fn cancel(&self, task_id: &TaskId) -> bool {
        let mut state = self.lock_state();
        let before = state.pending.len();
        state.pending.retain(|p| &p.task.task_id != task_id);
        let removed = state.pending.len() < before;
        if removed {
            info!(task_id = %task_id, "task cancelled");
        }
        removed
    }

    pub fn queue_status(&self) -> QueueStatus {
        let state = self.lock_state();
        QueueStatus {
            pending: state.pending.len(),
            running: state.running.clone(),
            completed: state.results.len(),
            processed_total: state.processed_total,
        }
    }

    /// Run the highest-priority pending task to completion or timeout.
    ///
    /// Returns `None` when nothing was pending. Concurrent callers are
    /// serialized, so at most one task executes at any time.
    pub async fn process_next(&self) -> Option<WorkerResult> {
        let _slot = self.inner.run_slot.lock().await;

        let task = {
            let mut state = self.lock_state();
            let next = state.pending.pop()?.task;
            state.running = Some(next.task_id.clone());
            next
        };
        info!(task_id = %task.task_id, task_type = %task.task_type, priority = task.priority, "task started");

        let started = tokio::time::Instant::now();
        let outcome = self.execute(&task).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &outcome {
            Ok(_) => info!(task_id = %task.task_id, duration_ms, "task completed"),
            Err(e) => warn!(task_id = %task.task_id, duration_ms, error = %e, "task failed"),
        }

        let result = WorkerResult::finished(&task, outcome, duration_ms);
        {
            let mut state = self.lock_state();
            state.running = None;
            state.store_result(result.clone(), self.inner.settings.result_cache_size);
        }
        Some(result)
    }

    /// Run the handler on its own tokio task so a panic fails only this task,
    /// and abort it if the timeout wins.
    ///
    /// An aborted handler is awaited before returning. Abort only lands at the
    /// handler's next `.await`, so a handler doing synchronous work keeps the
    /// run slot until that work ends and the next task cannot overlap it.
    async fn execute(&self, task: &WorkerTask) -> cider_common::Result<serde_json::Value> {
        let handler = self
            .handler_for(&task.task_type)
            .ok_or_else(|| Error::UnknownTaskType(task.task_type.clone()))?;
        let payload = task.payload.clone();
        let mut join = tokio::spawn(async move { handler.run(payload).await });

        let budget = self.timeout();
        match tokio::time::timeout(budget, &mut join).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => Err(Error::TaskFailed(format!("handler aborted: {join_err}"))),
            Err(_) => {
                join.abort();
                let _ = join.await;
                Err(Error::Timeout {
                    millis: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Start the consumer loop on the current tokio runtime.
    pub fn spawn_worker(&self) -> JoinHandle<()> {
        self.inner.shutdown.store(false, AtomicOrdering::SeqCst);
        let queue = self.clone();
        tokio::spawn(async move {
            info!("task worker started");
            loop {
                if queue.inner.shutdown.load(AtomicOrdering::SeqCst) {
                    break;
                }
                if queue.process_next().await.is_some() {
                    tokio::task::yield_now().await;
                    continue;
                }
                queue.inner.wake.notified().await;
            }
            info!("task worker stopped");
        })
    }

    /// Stop the consumer loop once the current task (if any) finishes.
    /// Pending tasks stay queued.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, AtomicOrdering::SeqCst);
        self.inner.wake.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Echo;

    #[async_trait]
    impl TaskHandler for Echo {
        async fn run(&self, payload: Value) -> cider_common::Result<Value> {
            Ok(payload)
        }
    }

    struct Panics;

    #[async_trait]
    impl TaskHandler for Panics {
        async fn run(&self, _payload: Value) -> cider_common::Result<Value> {
            panic!("handler bug");
        }
    }

    fn queue(result_cache_size: usize) -> TaskQueue {
        let q = TaskQueue::new(WorkerSettings {
            task_timeout_secs: 30,
            result_cache_size,
        });
        q.register_handler("echo", Arc::new(Echo));
        q
    }

    #[tokio::test]
    async fn test_priority_then_fifo() {
        let q = queue(10);
        let low = q.enqueue("echo", 2, json!("low"));
        let first_mid = q.enqueue("echo", 5, json!("mid-1"));
        let second_mid = q.enqueue("echo", 5, json!("mid-2"));
        let high = q.enqueue("echo", 10, json!("high"));

        let order: Vec<TaskId> = {
            let mut out = Vec::new();
            while let Some(r) = q.process_next().await {
                out.push(r.task_id);
            }
            out
        };
        assert_eq!(order, vec![high, first_mid, second_mid, low]);
    }

    #[tokio::test]
    async fn test_cancel_only_pending() {
        let q = queue(10);
        let a = q.enqueue("echo", 5, json!(1));
        let b = q.enqueue("echo", 5, json!(2));
        assert!(q.cancel(&b));
        assert!(!q.cancel(&b));

        let done = q.process_next().await.unwrap();
        assert_eq!(done.task_id, a);
        assert!(!q.cancel(&a));
        assert!(q.process_next().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_type_fails_immediately() {
        let q = queue(10);
        let id = q.enqueue("nope", 5, Value::Null);
        let result = q.get_result(&id).unwrap();
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, 41);
        assert_eq!(q.queue_status().pending, 0);
    }

    #[tokio::test]
    async fn test_result_cache_is_bounded() {
        let q = queue(2);
        let ids: Vec<TaskId> = (0..3).map(|i| q.enqueue("echo", 5, json!(i))).collect();
        while q.process_next().await.is_some() {}
        assert!(q.get_result(&ids[0]).is_none());
        assert_eq!(q.get_result(&ids[2]).unwrap().data, Some(json!(2)));
        let status = q.queue_status();
        assert_eq!((status.completed, status.processed_total), (2, 3));
    }

    #[tokio::test]
    async fn test_panicking_handler_is_isolated() {
        let q = queue(10);
        q.register_handler("boom", Arc::new(Panics));
        let bad = q.enqueue("boom", 9, Value::Null);
        let good = q.enqueue("echo", 1, json!("ok"));
        while q.process_next().await.is_some() {}
        assert_eq!(q.get_result(&bad).unwrap().error.unwrap().code, 42);
        assert!(q.get_result(&good).unwrap().success);
    }
}
