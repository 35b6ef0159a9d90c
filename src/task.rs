//! Task record types for the supervisor.
//!
//! A `Task` is one unit of work tagged with the capability it requires.
//! `TaskSpec` is the caller-facing submission form; the supervisor turns it
//! into a full `Task` record with status and timing fields.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Submission form for a task.
///
/// Deserializable so job files (YAML/JSON) can carry task batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Caller-supplied unique identifier
    pub id: String,

    /// Capability name this task requires
    #[serde(rename = "type")]
    pub task_type: String,

    /// Opaque payload handed to the worker
    pub input: serde_json::Value,

    /// Higher = more urgent
    #[serde(default)]
    pub priority: i64,
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Whether this status is terminal (the task will never run again).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// A unit of work tracked by the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Caller-supplied unique identifier
    pub id: String,

    /// Capability name this task requires
    pub task_type: String,

    /// Opaque payload handed to the worker
    pub input: serde_json::Value,

    /// Current status
    pub status: TaskStatus,

    /// Higher = more urgent
    pub priority: i64,

    /// Present iff status is Completed
    pub result: Option<String>,

    /// Present iff status is Failed
    pub error: Option<String>,

    /// Retries consumed so far (never exceeds max_retries)
    pub retry_count: u32,

    /// Unix timestamp in milliseconds
    pub created_at: i64,

    /// Set when the task (or its latest attempt) starts running
    pub started_at: Option<i64>,

    /// Set when the task reaches a terminal status
    pub completed_at: Option<i64>,
}

impl Task {
    /// Build a queued task from a submission spec.
    pub fn from_spec(spec: TaskSpec) -> Self {
        Self {
            id: spec.id,
            task_type: spec.task_type,
            input: spec.input,
            status: TaskStatus::Queued,
            priority: spec.priority,
            result: None,
            error: None,
            retry_count: 0,
            created_at: now_ms(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Transition to Running and stamp the attempt start time.
    ///
    /// Re-run after a retry overwrites `started_at` with the latest attempt.
    pub fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(now_ms());
    }

    /// Transition to Completed with the worker's result.
    pub fn complete(&mut self, result: String) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(now_ms());
    }

    /// Transition to terminal Failed with the final error message.
    pub fn fail(&mut self, error: String) {
        self.status = TaskStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(now_ms());
    }

    /// Transition back to Queued for another attempt.
    pub fn prepare_retry(&mut self) {
        self.retry_count += 1;
        self.status = TaskStatus::Queued;
    }

    /// Transition to Cancelled (only valid from Queued).
    pub fn mark_cancelled(&mut self) {
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(now_ms());
    }

    /// Serialized payload handed to the worker.
    ///
    /// Structured inputs (objects, arrays) are JSON-encoded; plain strings
    /// pass through unquoted; other scalars use their JSON text form.
    pub fn payload(&self) -> String {
        match &self.input {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(id: &str, priority: i64) -> TaskSpec {
        TaskSpec {
            id: id.to_string(),
            task_type: "analyze-structure".to_string(),
            input: json!({"path": "src/main.rs"}),
            priority,
        }
    }

    #[test]
    fn test_from_spec_initial_state() {
        let task = Task::from_spec(spec("t1", 5));
        assert_eq!(task.id, "t1");
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.priority, 5);
        assert_eq!(task.retry_count, 0);
        assert!(task.result.is_none());
        assert!(task.error.is_none());
        assert!(task.started_at.is_none());
        assert!(task.completed_at.is_none());
        assert!(task.created_at > 0);
    }

    #[test]
    fn test_spec_priority_defaults_to_zero() {
        let spec: TaskSpec =
            serde_yaml::from_str("id: t1\ntype: analyze-structure\ninput: hello\n").unwrap();
        assert_eq!(spec.priority, 0);
    }

    #[test]
    fn test_mark_running_stamps_start() {
        let mut task = Task::from_spec(spec("t1", 0));
        task.mark_running();
        assert_eq!(task.status, TaskStatus::Running);
        assert!(task.started_at.is_some());
    }

    #[test]
    fn test_complete_sets_result_only() {
        let mut task = Task::from_spec(spec("t1", 0));
        task.mark_running();
        task.complete("done".to_string());
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_deref(), Some("done"));
        assert!(task.error.is_none());
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_fail_sets_error_only() {
        let mut task = Task::from_spec(spec("t1", 0));
        task.mark_running();
        task.fail("boom".to_string());
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("boom"));
        assert!(task.result.is_none());
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_prepare_retry_requeues() {
        let mut task = Task::from_spec(spec("t1", 0));
        task.mark_running();
        task.prepare_retry();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.retry_count, 1);
    }

    #[test]
    fn test_status_terminal() {
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(TaskStatus::Queued.as_str(), "queued");
        assert_eq!(TaskStatus::Running.as_str(), "running");
        assert_eq!(TaskStatus::Completed.as_str(), "completed");
        assert_eq!(TaskStatus::Failed.as_str(), "failed");
        assert_eq!(TaskStatus::Cancelled.as_str(), "cancelled");
    }

    #[test]
    fn test_payload_object_is_json() {
        let task = Task::from_spec(spec("t1", 0));
        let payload = task.payload();
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["path"], "src/main.rs");
    }

    #[test]
    fn test_payload_string_is_unquoted() {
        let mut spec = spec("t1", 0);
        spec.input = json!("refactor the parser");
        let task = Task::from_spec(spec);
        assert_eq!(task.payload(), "refactor the parser");
    }

    #[test]
    fn test_payload_scalar_uses_json_form() {
        let mut spec = spec("t1", 0);
        spec.input = json!(42);
        let task = Task::from_spec(spec);
        assert_eq!(task.payload(), "42");
    }

    #[test]
    fn test_serialization_roundtrip() {
        let task = Task::from_spec(spec("t1", 3));
        let json = serde_json::to_string(&task).unwrap();
        let restored: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(task, restored);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&TaskStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}
