//! Supervisor: the scheduling loop that drives tasks to completion.
//!
//! The supervisor owns the task queue, the active and completed maps, and
//! the worker registry. `orchestrate` repeatedly pairs the head-most queued
//! task with an idle, healthy, capable worker and launches its execution as
//! an independent tokio task, bounded by the concurrency ceiling. Failures
//! and timeouts requeue the task until its retry budget is spent.
//!
//! Dispatch is strictly head-of-line: if the highest-priority task has no
//! eligible worker, nothing behind it is dispatched on that pass. That
//! preserves priority ordering at the cost of possible idle-worker
//! underutilization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;

use crate::error::{DispatchrError, Result};
use crate::queue::TaskQueue;
use crate::registry::WorkerRegistry;
use crate::task::{Task, TaskSpec};
use crate::worker::Worker;

/// How long the loop sleeps while waiting for active work to free a slot.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Supervisor configuration.
///
/// All knobs are required; defaults belong to the caller's config layer,
/// not the core.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Maximum simultaneously running tasks.
    pub max_concurrent_tasks: usize,
    /// Per-attempt execution timeout.
    pub task_timeout: Duration,
    /// Retries allowed after the first failed attempt.
    pub max_retries: u32,
}

impl SupervisorConfig {
    /// Create a config from the three required knobs.
    ///
    /// Panics if the concurrency ceiling or the timeout is zero: a zero
    /// ceiling can never dispatch and a zero timeout fails every attempt.
    pub fn new(max_concurrent_tasks: usize, task_timeout: Duration, max_retries: u32) -> Self {
        assert!(max_concurrent_tasks > 0, "max_concurrent_tasks must be positive");
        assert!(!task_timeout.is_zero(), "task_timeout must be positive");
        Self {
            max_concurrent_tasks,
            task_timeout,
            max_retries,
        }
    }
}

/// All mutable orchestration state, guarded by one mutex.
///
/// A task lives in exactly one of queue, active, or completed at a time.
/// The lock is scoped and never held across an await.
struct SupervisorState {
    queue: TaskQueue,
    active: HashMap<String, Task>,
    completed: HashMap<String, Task>,
    workers: WorkerRegistry,
    is_running: bool,
}

/// Everything one execution unit needs, extracted under the dispatch lock.
struct Dispatch {
    task_id: String,
    worker_id: String,
    worker: Arc<dyn Worker>,
    payload: String,
}

/// Capability-matching task supervisor.
pub struct Supervisor {
    config: SupervisorConfig,
    state: Arc<Mutex<SupervisorState>>,
}

impl Supervisor {
    /// Create a supervisor with no workers and an empty queue.
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(SupervisorState {
                queue: TaskQueue::new(),
                active: HashMap::new(),
                completed: HashMap::new(),
                workers: WorkerRegistry::new(),
                is_running: false,
            })),
        }
    }

    /// Register a worker, replacing any existing entry with the same id.
    pub fn register_worker(
        &self,
        id: impl Into<String>,
        worker: Arc<dyn Worker>,
        capabilities: Vec<String>,
    ) -> Result<()> {
        let id = id.into();
        let mut state = self.state.lock().unwrap();
        state.workers.register(id.clone(), worker, capabilities)?;
        tracing::info!(worker_id = %id, "Worker registered");
        Ok(())
    }

    /// Submit a task for scheduling; returns the accepted id.
    pub fn submit(&self, spec: TaskSpec) -> String {
        let task = Task::from_spec(spec);
        let id = task.id.clone();

        let mut state = self.state.lock().unwrap();
        state.queue.submit(task);
        tracing::debug!(task_id = %id, queued = state.queue.len(), "Task submitted");

        id
    }

    /// Look up a task across completed, active, and queued sets.
    pub fn task_status(&self, id: &str) -> Option<Task> {
        let state = self.state.lock().unwrap();
        state
            .completed
            .get(id)
            .or_else(|| state.active.get(id))
            .cloned()
            .or_else(|| state.queue.find(id).cloned())
    }

    /// Cancel a queued task.
    ///
    /// Returns true if the task was found in the queue and moved to the
    /// completed set as Cancelled. Running tasks are not aborted; cancel of
    /// an active or unknown id returns false.
    pub fn cancel(&self, id: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.queue.remove(id) {
            Some(mut task) => {
                task.mark_cancelled();
                tracing::info!(task_id = %task.id, "Task cancelled");
                state.completed.insert(task.id.clone(), task);
                true
            }
            None => false,
        }
    }

    /// Update a worker's health flag.
    pub fn set_worker_health(&self, worker_id: &str, healthy: bool) {
        let mut state = self.state.lock().unwrap();
        state.workers.set_healthy(worker_id, healthy);
        tracing::debug!(worker_id = %worker_id, healthy, "Worker health updated");
    }

    /// Number of queued tasks.
    pub fn queued_len(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    /// Number of currently active tasks.
    pub fn active_len(&self) -> usize {
        self.state.lock().unwrap().active.len()
    }

    /// Number of tasks in the completed set (terminal statuses).
    ///
    /// The completed set is never evicted; long-lived deployments should
    /// watch this.
    pub fn completed_len(&self) -> usize {
        self.state.lock().unwrap().completed.len()
    }

    /// Registered worker ids, in registration order.
    pub fn worker_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().workers.ids()
    }

    /// Whether an orchestrate loop is currently running.
    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().is_running
    }

    /// Drive the queue until no task is queued or active.
    ///
    /// Re-entrant calls return immediately while a loop is already running.
    /// The loop exits early when nothing is active and the head task has no
    /// eligible worker, so an unmatchable task stalls the queue rather than
    /// spinning forever.
    pub async fn orchestrate(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if state.is_running {
                return Ok(());
            }
            state.is_running = true;
        }

        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        loop {
            // Greedy dispatch pass, strictly in priority order.
            loop {
                let dispatch = {
                    let mut state = self.state.lock().unwrap();
                    next_dispatch(&mut state, self.config.max_concurrent_tasks)
                };
                let Some(dispatch) = dispatch else { break };

                tracing::info!(
                    task_id = %dispatch.task_id,
                    worker_id = %dispatch.worker_id,
                    "Dispatching task"
                );

                let state = Arc::clone(&self.state);
                let config = self.config.clone();
                handles.push(tokio::spawn(run_task(state, config, dispatch)));
            }

            handles.retain(|h| !h.is_finished());

            let (queued, active) = {
                let state = self.state.lock().unwrap();
                (state.queue.len(), state.active.len())
            };

            if queued == 0 && active == 0 {
                break;
            }

            if active > 0 {
                // Yield until running work frees a worker or a slot.
                tokio::time::sleep(POLL_INTERVAL).await;
            } else {
                // Nothing is running, but the snapshot can be newer than the
                // dispatch verdict: the last execution may have finished and
                // released its worker in the gap between the two locks.
                // Re-check the head under one lock before concluding no
                // progress is possible.
                let state = self.state.lock().unwrap();
                let head_dispatchable = state
                    .queue
                    .peek()
                    .is_some_and(|t| state.workers.select_for(&t.task_type).is_some());
                if head_dispatchable {
                    continue;
                }
                if let Some(head) = state.queue.peek() {
                    tracing::warn!(
                        task_id = %head.id,
                        task_type = %head.task_type,
                        queued,
                        "No eligible worker for head task, stopping dispatch"
                    );
                }
                break;
            }
        }

        let _ = join_all(handles).await;

        self.state.lock().unwrap().is_running = false;
        Ok(())
    }
}

/// Pop and bind the head task if a slot and an eligible worker exist.
///
/// Worker assignment and the active-map insertion happen atomically under
/// the state lock, which is what upholds the one-task-per-worker contract.
fn next_dispatch(state: &mut SupervisorState, max_concurrent: usize) -> Option<Dispatch> {
    if state.active.len() >= max_concurrent {
        return None;
    }

    let task_type = state.queue.peek()?.task_type.clone();
    let worker_id = state.workers.select_for(&task_type)?.to_string();

    let mut task = state.queue.pop_front()?;
    task.mark_running();

    let task_id = task.id.clone();
    let payload = task.payload();

    state.workers.assign(&worker_id, &task_id);
    let worker = state.workers.get(&worker_id)?.worker.clone();
    state.active.insert(task_id.clone(), task);

    Some(Dispatch {
        task_id,
        worker_id,
        worker,
        payload,
    })
}

/// One task execution: call the worker under the timeout, then translate
/// the outcome into task state. Errors never propagate to the loop.
async fn run_task(state: Arc<Mutex<SupervisorState>>, config: SupervisorConfig, dispatch: Dispatch) {
    let Dispatch {
        task_id,
        worker_id,
        worker,
        payload,
    } = dispatch;

    let outcome = match tokio::time::timeout(config.task_timeout, worker.execute(&payload)).await {
        Ok(result) => result,
        Err(_) => Err(DispatchrError::Timeout(timeout_millis(config.task_timeout))),
    };

    let mut state = state.lock().unwrap();
    state.workers.release(&worker_id);

    let Some(mut task) = state.active.remove(&task_id) else {
        tracing::error!(task_id = %task_id, "Task missing from active set");
        return;
    };

    match outcome {
        Ok(result) => {
            task.complete(result);
            tracing::info!(task_id = %task.id, worker_id = %worker_id, "Task completed");
            state.completed.insert(task_id, task);
        }
        Err(e) => {
            if task.retry_count < config.max_retries {
                task.prepare_retry();
                tracing::warn!(
                    task_id = %task.id,
                    retry_count = task.retry_count,
                    error = %e,
                    "Task failed, requeueing"
                );
                state.queue.requeue(task);
            } else {
                task.fail(e.to_string());
                tracing::error!(task_id = %task.id, error = %e, "Task failed permanently");
                state.completed.insert(task_id, task);
            }
        }
    }
}

/// Timeout duration in whole milliseconds, saturating at `u64::MAX`.
fn timeout_millis(timeout: Duration) -> u64 {
    timeout.as_millis().try_into().unwrap_or(u64::MAX)
}
