//! Background task queue: ordering, cancellation, timeouts and the worker loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use serde_json::{json, Value};

use cider_common::TaskId;
use cider_config::WorkerSettings;
use cider_core::worker::{TaskHandler, TaskQueue};

struct Echo;

#[async_trait]
impl TaskHandler for Echo {
    async fn run(&self, payload: Value) -> cider_common::Result<Value> {
        Ok(payload)
    }
}

/// Sleeps for `payload` seconds.
struct Sleeper;

#[async_trait]
impl TaskHandler for Sleeper {
    async fn run(&self, payload: Value) -> cider_common::Result<Value> {
        let secs = payload.as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_secs(secs)).await;
        Ok(json!(secs))
    }
}

/// Records how many handlers run at once.
#[derive(Default)]
struct Overlap {
    active: AtomicUsize,
    peak: AtomicUsize,
    order: Mutex<Vec<Value>>,
}

#[async_trait]
impl TaskHandler for Overlap {
    async fn run(&self, payload: Value) -> cider_common::Result<Value> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.order.lock().unwrap().push(payload.clone());
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(payload)
    }
}

/// Blocks its thread for `payload` milliseconds without yielding.
#[derive(Default)]
struct Grinder {
    active: AtomicUsize,
    overlapped: AtomicUsize,
}

#[async_trait]
impl TaskHandler for Grinder {
    async fn run(&self, payload: Value) -> cider_common::Result<Value> {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::sleep(Duration::from_millis(payload.as_u64().unwrap_or(0)));
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(payload)
    }
}

fn queue() -> TaskQueue {
    let q = TaskQueue::new(WorkerSettings {
        task_timeout_secs: 30,
        result_cache_size: 10,
    });
    q.register_handler("echo", Arc::new(Echo));
    q.register_handler("sleep", Arc::new(Sleeper));
    q
}

#[tokio::test(start_paused = true)]
async fn slow_task_times_out() {
    let q = queue();
    let slow = q.enqueue("sleep", 5, json!(120));
    let fast = q.enqueue("sleep", 1, json!(1));

    let result = q.process_next().await.unwrap();
    assert_eq!(result.task_id, slow);
    assert!(!result.success);
    assert_eq!(result.error.as_ref().map(|e| e.code), Some(40));
    assert_eq!(result.duration_ms, 30_000);

    // The queue keeps going after a timeout.
    let next = q.process_next().await.unwrap();
    assert_eq!(next.task_id, fast);
    assert!(next.success);
    assert_eq!(next.duration_ms, 1_000);
}

#[tokio::test]
async fn dequeued_task_cannot_be_cancelled() {
    let q = queue();
    let id = q.enqueue("echo", 5, json!("x"));
    let _ = q.process_next().await;
    assert!(!q.cancel(&id));
    assert!(!q.cancel(&TaskId::new()));
}

#[tokio::test]
async fn priority_is_clamped() {
    let q = queue();
    let low = q.enqueue("echo", -50, json!("low"));
    let high = q.enqueue("echo", 500, json!("high"));
    let first = q.process_next().await.unwrap();
    assert_eq!(first.task_id, high);
    let second = q.process_next().await.unwrap();
    assert_eq!(second.task_id, low);
}

#[tokio::test]
async fn worker_loop_runs_one_task_at_a_time() {
    let q = queue();
    let probe = Arc::new(Overlap::default());
    q.register_handler("probe", probe.clone());

    let ids: Vec<TaskId> = (0..5i64)
        .map(|i| q.enqueue("probe", i + 1, json!(i)))
        .collect();
    let worker = q.spawn_worker();

    for _ in 0..200 {
        if ids.iter().all(|id| q.get_result(id).is_some()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    q.shutdown();
    worker.await.unwrap();

    assert!(ids.iter().all(|id| q.get_result(id).unwrap().success));
    assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
    // Highest priority first.
    assert_eq!(
        *probe.order.lock().unwrap(),
        vec![json!(4), json!(3), json!(2), json!(1), json!(0)]
    );
    assert_eq!(q.queue_status().running, None);
}

#[tokio::test]
async fn worker_picks_up_tasks_enqueued_later() {
    let q = queue();
    let worker = q.spawn_worker();
    tokio::task::yield_now().await;

    let id = q.enqueue("echo", 5, json!("late"));
    for _ in 0..200 {
        if q.get_result(&id).is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    q.shutdown();
    worker.await.unwrap();
    assert_eq!(q.get_result(&id).unwrap().data, Some(json!("late")));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A priority-10 task dequeues before every lower-priority pending task.
    #[test]
    fn top_priority_dequeues_first(priorities in prop::collection::vec(1i64..=9, 0..15), at in 0usize..15) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let q = queue();
            let at = at.min(priorities.len());
            let mut top = None;
            for (i, p) in priorities.iter().enumerate() {
                if i == at {
                    top = Some(q.enqueue("echo", 10, json!("top")));
                }
                q.enqueue("echo", *p, json!(i));
            }
            let top = top.unwrap_or_else(|| q.enqueue("echo", 10, json!("top")));
            let first = q.process_next().await.unwrap();
            assert_eq!(first.task_id, top);
        });
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timed_out_blocking_handler_never_overlaps_next_task() {
    let q = TaskQueue::new(WorkerSettings {
        task_timeout_secs: 1,
        result_cache_size: 10,
    });
    let grinder = Arc::new(Grinder::default());
    q.register_handler("grind", grinder.clone());

    let slow = q.enqueue("grind", 9, json!(1_500));
    let quick = q.enqueue("grind", 1, json!(0));

    let first = q.process_next().await.unwrap();
    assert_eq!(first.task_id, slow);
    assert_eq!(first.error.as_ref().map(|e| e.code), Some(40));
    assert!(first.duration_ms >= 1_500);

    let second = q.process_next().await.unwrap();
    assert_eq!(second.task_id, quick);
    assert!(second.success);
    assert_eq!(grinder.overlapped.load(Ordering::SeqCst), 0);
}
