//! Circuit breaker for guarding fallible async calls.
//!
//! When a dependency fails repeatedly, continuing to call it wastes time and
//! budget. The breaker tracks consecutive failures and, past a threshold,
//! rejects calls immediately until a cooldown elapses. The first call after
//! the cooldown is let through as a half-open probe; enough probe successes
//! close the breaker again.
//!
//! The breaker has no dependency on the supervisor. It wraps any
//! `Future<Output = Result<T>>`, typically a worker's API call.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{DispatchrError, Result};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls are rejected until the reset timeout elapses.
    Open,
    /// Cooldown elapsed; probe calls are allowed through.
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker open.
    pub failure_threshold: u32,
    /// Cooldown after the last failure before probing resumes.
    pub reset_timeout: Duration,
    /// Consecutive half-open successes required to close.
    pub half_open_requests: u32,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failures: u32,
    last_failure: Option<Instant>,
    half_open_successes: u32,
}

/// Consecutive-failure circuit breaker.
///
/// State lives behind an internal mutex so one breaker can be shared by
/// reference across concurrent callers; the lock is never held across an
/// await.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    ///
    /// Panics if any config knob is zero: a zero threshold would open the
    /// breaker before the first failure, and the other knobs make the
    /// open/half-open cycle degenerate.
    pub fn new(config: BreakerConfig) -> Self {
        assert!(config.failure_threshold > 0, "failure_threshold must be positive");
        assert!(!config.reset_timeout.is_zero(), "reset_timeout must be positive");
        assert!(config.half_open_requests > 0, "half_open_requests must be positive");
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failures: 0,
                last_failure: None,
                half_open_successes: 0,
            }),
        }
    }

    /// Current state, as of this observation.
    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    /// Consecutive failure count.
    pub fn failures(&self) -> u32 {
        self.inner.lock().unwrap().failures
    }

    /// Run a call through the breaker.
    ///
    /// Open and still cooling down: the future is dropped unpolled and
    /// `CircuitOpen` is returned. Otherwise the call runs and its outcome
    /// feeds the breaker state.
    pub async fn call<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.try_acquire()?;

        match fut.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    /// Gate a call attempt.
    ///
    /// Returns `CircuitOpen` while open and cooling down; transitions to
    /// half-open when the cooldown has elapsed.
    pub fn try_acquire(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        if inner.state == BreakerState::Open {
            let elapsed = inner
                .last_failure
                .map(|t| t.elapsed() >= self.config.reset_timeout)
                .unwrap_or(true);

            if elapsed {
                inner.state = BreakerState::HalfOpen;
                inner.half_open_successes = 0;
                tracing::info!("Circuit breaker half-open, probing");
            } else {
                return Err(DispatchrError::CircuitOpen);
            }
        }

        Ok(())
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();

        if inner.state == BreakerState::HalfOpen {
            inner.half_open_successes += 1;
            if inner.half_open_successes >= self.config.half_open_requests {
                inner.state = BreakerState::Closed;
                inner.failures = 0;
                tracing::info!("Circuit breaker closed after successful probes");
            }
        } else {
            inner.failures = 0;
        }
    }

    /// Record a failed call.
    ///
    /// Any half-open failure reopens immediately; closed failures trip the
    /// breaker once the threshold is reached.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();

        inner.failures += 1;
        inner.last_failure = Some(Instant::now());

        if inner.state == BreakerState::HalfOpen || inner.failures >= self.config.failure_threshold
        {
            if inner.state != BreakerState::Open {
                tracing::warn!(failures = inner.failures, "Circuit breaker opened");
            }
            inner.state = BreakerState::Open;
        }
    }
}
