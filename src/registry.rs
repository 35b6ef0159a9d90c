//! Worker registry and capability matching.
//!
//! Workers declare a set of capability names at registration. Selection
//! scans in registration order and returns the first worker that is
//! healthy, unassigned, and capable of the task's type. "No eligible
//! worker" is a scheduling condition, not an error; the supervisor waits
//! for a worker to free up.

use std::sync::Arc;

use crate::error::{DispatchrError, Result};
use crate::task::now_ms;
use crate::worker::Worker;

/// Registry record for one worker.
pub struct WorkerEntry {
    /// Worker identifier
    pub id: String,

    /// The work-performing handle
    pub worker: Arc<dyn Worker>,

    /// Capability names this worker can execute
    pub capabilities: Vec<String>,

    /// Id of the task this worker is bound to, if any.
    ///
    /// This is a back-reference into the supervisor's active map, never
    /// ownership. A non-None value excludes the worker from selection.
    pub current_task: Option<String>,

    /// Health flag; unhealthy workers are skipped by selection
    pub healthy: bool,

    /// Unix millis of the last health update
    pub last_health_check: i64,
}

impl std::fmt::Debug for WorkerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerEntry")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .field("current_task", &self.current_task)
            .field("healthy", &self.healthy)
            .finish()
    }
}

/// In-memory worker registry.
///
/// Entries keep registration order; re-registering an id replaces the entry
/// in place, preserving its scan position.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: Vec<WorkerEntry>,
}

impl WorkerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { workers: Vec::new() }
    }

    /// Register a worker, replacing any existing entry with the same id.
    ///
    /// Replacement clears the previous assignment and health state.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        worker: Arc<dyn Worker>,
        capabilities: Vec<String>,
    ) -> Result<()> {
        if capabilities.is_empty() {
            return Err(DispatchrError::InvalidState(
                "worker declares no capabilities".to_string(),
            ));
        }

        let entry = WorkerEntry {
            id: id.into(),
            worker,
            capabilities,
            current_task: None,
            healthy: true,
            last_health_check: now_ms(),
        };

        if let Some(existing) = self.workers.iter_mut().find(|w| w.id == entry.id) {
            *existing = entry;
        } else {
            self.workers.push(entry);
        }

        Ok(())
    }

    /// Select a worker for a task type.
    ///
    /// Scans in registration order and returns the id of the first worker
    /// that is healthy, unassigned, and declares the capability. Returns
    /// None when no worker qualifies.
    pub fn select_for(&self, task_type: &str) -> Option<&str> {
        self.workers
            .iter()
            .find(|w| {
                w.healthy
                    && w.current_task.is_none()
                    && w.capabilities.iter().any(|c| c == task_type)
            })
            .map(|w| w.id.as_str())
    }

    /// Bind a worker to a task.
    pub fn assign(&mut self, worker_id: &str, task_id: &str) {
        if let Some(entry) = self.workers.iter_mut().find(|w| w.id == worker_id) {
            entry.current_task = Some(task_id.to_string());
        }
    }

    /// Clear a worker's assignment, making it eligible for selection again.
    pub fn release(&mut self, worker_id: &str) {
        if let Some(entry) = self.workers.iter_mut().find(|w| w.id == worker_id) {
            entry.current_task = None;
        }
    }

    /// Update a worker's health flag.
    pub fn set_healthy(&mut self, worker_id: &str, healthy: bool) {
        if let Some(entry) = self.workers.iter_mut().find(|w| w.id == worker_id) {
            entry.healthy = healthy;
            entry.last_health_check = now_ms();
        }
    }

    /// Look up a worker entry by id.
    pub fn get(&self, worker_id: &str) -> Option<&WorkerEntry> {
        self.workers.iter().find(|w| w.id == worker_id)
    }

    /// Registered worker ids, in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.workers.iter().map(|w| w.id.clone()).collect()
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoopWorker;

    #[async_trait]
    impl Worker for NoopWorker {
        async fn execute(&self, _payload: &str) -> Result<String> {
            Ok("ok".to_string())
        }
    }

    fn noop() -> Arc<dyn Worker> {
        Arc::new(NoopWorker)
    }

    fn caps(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_register_and_select() {
        let mut registry = WorkerRegistry::new();
        registry
            .register("analyzer", noop(), caps(&["analyze-structure"]))
            .unwrap();

        assert_eq!(registry.select_for("analyze-structure"), Some("analyzer"));
        assert_eq!(registry.select_for("generate-diff"), None);
    }

    #[test]
    fn test_register_rejects_empty_capabilities() {
        let mut registry = WorkerRegistry::new();
        let result = registry.register("w1", noop(), vec![]);
        assert!(matches!(result, Err(DispatchrError::InvalidState(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_selection_is_registration_order() {
        let mut registry = WorkerRegistry::new();
        registry.register("first", noop(), caps(&["analyze-structure"])).unwrap();
        registry.register("second", noop(), caps(&["analyze-structure"])).unwrap();

        assert_eq!(registry.select_for("analyze-structure"), Some("first"));
    }

    #[test]
    fn test_assigned_worker_is_skipped() {
        let mut registry = WorkerRegistry::new();
        registry.register("first", noop(), caps(&["analyze-structure"])).unwrap();
        registry.register("second", noop(), caps(&["analyze-structure"])).unwrap();

        registry.assign("first", "t1");
        assert_eq!(registry.select_for("analyze-structure"), Some("second"));

        registry.release("first");
        assert_eq!(registry.select_for("analyze-structure"), Some("first"));
    }

    #[test]
    fn test_unhealthy_worker_is_skipped() {
        let mut registry = WorkerRegistry::new();
        registry.register("only", noop(), caps(&["analyze-structure"])).unwrap();

        registry.set_healthy("only", false);
        assert_eq!(registry.select_for("analyze-structure"), None);

        registry.set_healthy("only", true);
        assert_eq!(registry.select_for("analyze-structure"), Some("only"));
    }

    #[test]
    fn test_reregister_replaces_in_place() {
        let mut registry = WorkerRegistry::new();
        registry.register("a", noop(), caps(&["analyze-structure"])).unwrap();
        registry.register("b", noop(), caps(&["analyze-structure"])).unwrap();

        registry.assign("a", "t1");
        registry.register("a", noop(), caps(&["generate-diff"])).unwrap();

        // Replacement keeps scan position and clears the assignment
        assert_eq!(registry.ids(), vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.select_for("generate-diff"), Some("a"));
        assert!(registry.get("a").unwrap().current_task.is_none());
    }

    #[test]
    fn test_multi_capability_worker() {
        let mut registry = WorkerRegistry::new();
        registry
            .register("multi", noop(), caps(&["analyze-structure", "detect-patterns"]))
            .unwrap();

        assert_eq!(registry.select_for("analyze-structure"), Some("multi"));
        assert_eq!(registry.select_for("detect-patterns"), Some("multi"));
    }

    #[test]
    fn test_get_missing_worker() {
        let registry = WorkerRegistry::new();
        assert!(registry.get("nope").is_none());
    }
}
