//! Error types for dispatchr
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in dispatchr
#[derive(Debug, Error)]
pub enum DispatchrError {
    /// Task not found in any container
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Worker execution failure
    #[error("Worker error: {0}")]
    Worker(String),

    /// Task execution exceeded its timeout
    #[error("Task timed out after {0}ms")]
    Timeout(u64),

    /// Call rejected because the circuit breaker is open
    #[error("Circuit breaker is open")]
    CircuitOpen,

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// LLM API error
    #[error("LLM error: {0}")]
    Llm(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for dispatchr operations
pub type Result<T> = std::result::Result<T, DispatchrError>;
