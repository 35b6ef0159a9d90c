//! Worker trait and concrete worker implementations.
//!
//! A worker is anything that can execute a serialized task payload and
//! return a textual result or fail. The supervisor only sees this trait;
//! concrete workers (LLM-backed, subprocess-backed, test doubles) live
//! behind it.

mod llm;

pub use llm::{LlmWorker, LlmWorkerConfig};

use async_trait::async_trait;

use crate::error::Result;

/// A capability-polymorphic unit of execution.
///
/// `execute` receives the serialized task payload (JSON text for structured
/// inputs, the raw string otherwise) and returns the worker's textual
/// response. Failure is signaled through the error, including timeouts
/// applied by the caller.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Execute one task payload.
    async fn execute(&self, payload: &str) -> Result<String>;
}
