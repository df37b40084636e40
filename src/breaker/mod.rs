//! # breaker
//!
//! Three-state circuit breaker guarding a named downstream dependency.
//!
//! Closed admits every call and keeps rolling request/failure counts; the
//! circuit trips to Open once `requests >= min_requests` and the failure
//! ratio reaches `failure_ratio` (below `min_requests` it can never trip).
//! Open rejects locally for `open_timeout`, then the next admission moves it
//! to HalfOpen, where a bounded number of trial calls decide: any failure
//! reopens, a streak of successes closes and resets the counters.
//!
//! `execute` only decides *whether to attempt* the call; the operation's
//! error is re-raised unchanged. Every transition is logged and reported to
//! an optional hook. One breaker's counters are the only state shared across
//! concurrent callers, updated under a single mutex.

mod registry;

pub use registry::CircuitRegistry;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bon::Builder;
use tracing::{debug, warn};

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        f.write_str(name)
    }
}

/// Trip policy and recovery timing for one circuit.
#[derive(Debug, Clone, Builder)]
pub struct BreakerConfig {
    /// Minimum requests before the failure ratio is evaluated at all.
    #[builder(default = 3)]
    pub min_requests: u64,

    /// Failure ratio at or above which a closed circuit trips.
    #[builder(default = 0.6)]
    pub failure_ratio: f64,

    /// How long an open circuit rejects before allowing a trial.
    #[builder(default = Duration::from_secs(10))]
    pub open_timeout: Duration,

    /// Concurrent trial calls admitted while half-open.
    #[builder(default = 3)]
    pub half_open_max_calls: u64,

    /// Trial successes required to close a half-open circuit.
    #[builder(default = 2)]
    pub half_open_successes: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Observer for state transitions: (circuit name, previous, new).
pub type StateChangeHook = Arc<dyn Fn(&str, CircuitState, CircuitState) + Send + Sync>;

struct Inner {
    state: CircuitState,
    requests: u64,
    failures: u64,
    opened_at: Option<Instant>,
    trial_in_flight: u64,
    trial_successes: u64,
}

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
    on_state_change: Option<StateChangeHook>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                requests: 0,
                failures: 0,
                opened_at: None,
                trial_in_flight: 0,
                trial_successes: 0,
            }),
            on_state_change: None,
        }
    }

    /// Attach an observer for state transitions.
    pub fn with_state_change_hook(mut self, hook: StateChangeHook) -> Self {
        self.on_state_change = Some(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run `operation` only if the circuit admits it.
    ///
    /// Success and failure are both recorded; the operation's error is
    /// returned unchanged. An open circuit fails with
    /// [`ClientError::CircuitOpen`] without invoking the operation.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        self.try_acquire()?;

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                debug!(circuit = %self.name, code = %error.code(), "recorded failure");
                self.record_failure();
                Err(error)
            }
        }
    }

    /// Admission decision, with the open -> half-open transition on timeout.
    fn try_acquire(&self) -> Result<(), ClientError> {
        let mut inner = self.lock();
        let change = match inner.state {
            CircuitState::Closed => None,
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|at| at.elapsed()).unwrap_or_default();
                if elapsed >= self.config.open_timeout {
                    let change = Self::transition(&mut inner, CircuitState::HalfOpen);
                    inner.trial_in_flight = 1;
                    change
                } else {
                    return Err(self.rejected());
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight >= self.config.half_open_max_calls {
                    return Err(self.rejected());
                }
                inner.trial_in_flight += 1;
                None
            }
        };
        drop(inner);
        self.notify(change);
        Ok(())
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        let change = match inner.state {
            CircuitState::Closed => {
                inner.requests += 1;
                self.trip_if_due(&mut inner)
            }
            CircuitState::HalfOpen => {
                inner.trial_in_flight = inner.trial_in_flight.saturating_sub(1);
                inner.trial_successes += 1;
                if inner.trial_successes >= self.config.half_open_successes {
                    Self::transition(&mut inner, CircuitState::Closed)
                } else {
                    None
                }
            }
            // A straggler finishing after the circuit reopened.
            CircuitState::Open => None,
        };
        drop(inner);
        self.notify(change);
    }

    fn record_failure(&self) {
        let mut inner = self.lock();
        let change = match inner.state {
            CircuitState::Closed => {
                inner.requests += 1;
                inner.failures += 1;
                self.trip_if_due(&mut inner)
            }
            CircuitState::HalfOpen => {
                inner.trial_in_flight = inner.trial_in_flight.saturating_sub(1);
                Self::transition(&mut inner, CircuitState::Open)
            }
            CircuitState::Open => None,
        };
        drop(inner);
        self.notify(change);
    }

    /// The trip rule runs on every recorded outcome, success included: a
    /// success can be the request that lifts the count over `min_requests`
    /// while the ratio already qualifies.
    fn trip_if_due(&self, inner: &mut Inner) -> Option<(CircuitState, CircuitState)> {
        if inner.requests < self.config.min_requests {
            return None;
        }
        let ratio = inner.failures as f64 / inner.requests as f64;
        if ratio >= self.config.failure_ratio {
            Self::transition(inner, CircuitState::Open)
        } else {
            None
        }
    }

    fn transition(inner: &mut Inner, to: CircuitState) -> Option<(CircuitState, CircuitState)> {
        let from = inner.state;
        if from == to {
            return None;
        }
        inner.state = to;
        inner.requests = 0;
        inner.failures = 0;
        inner.trial_in_flight = 0;
        inner.trial_successes = 0;
        inner.opened_at = (to == CircuitState::Open).then(Instant::now);
        Some((from, to))
    }

    // Hooks run after the lock is released so an observer may query the
    // breaker without deadlocking.
    fn notify(&self, change: Option<(CircuitState, CircuitState)>) {
        if let Some((from, to)) = change {
            warn!(circuit = %self.name, from = %from, to = %to, "circuit state changed");
            if let Some(hook) = &self.on_state_change {
                hook(&self.name, from, to);
            }
        }
    }

    fn rejected(&self) -> ClientError {
        ClientError::CircuitOpen {
            circuit: self.name.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
