//! Dispatchr - capability-matched task orchestration
//!
//! Dispatchr fans units of work out to a heterogeneous pool of long-running,
//! potentially-unreliable workers. Tasks carry a required capability and a
//! priority; the supervisor matches them to idle capable workers, bounds
//! concurrency, and recovers from failure via retry and circuit-breaking.

pub mod breaker;
pub mod error;
pub mod queue;
pub mod registry;
pub mod supervisor;
pub mod task;
pub mod worker;

pub use error::{DispatchrError, Result};
