//! Circuit breaker keyed by delegated-task-type label.
//!
//! Consecutive failures of one task type open its circuit for a cooldown
//! window; while open, new invocations of that type are refused before
//! any resources are spent. The cooldown elapsing closes the circuit
//! again on the next check.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::BreakerConfig;

#[derive(Debug, Default)]
struct KeyState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Per-task-type circuit breaker.
///
/// Uses [`tokio::time::Instant`] so cooldown behavior is testable under
/// paused time.
pub struct TaskBreaker {
    config: BreakerConfig,
    states: Mutex<HashMap<String, KeyState>>,
}

impl TaskBreaker {
    /// Breaker with the given thresholds.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a new invocation of `task_type` may proceed.
    ///
    /// An open circuit whose cooldown has elapsed resets to closed and
    /// allows the invocation.
    pub async fn should_allow(&self, task_type: &str) -> bool {
        let mut states = self.states.lock().await;
        let Some(state) = states.get_mut(task_type) else {
            return true;
        };
        match state.open_until {
            None => true,
            Some(until) if Instant::now() >= until => {
                debug!(task_type, "circuit cooldown elapsed; closing");
                *state = KeyState::default();
                true
            }
            Some(_) => false,
        }
    }

    /// Record a successful invocation: clears the failure count.
    pub async fn record_success(&self, task_type: &str) {
        let mut states = self.states.lock().await;
        states.insert(task_type.to_owned(), KeyState::default());
    }

    /// Record a failed invocation; opens the circuit at the threshold.
    pub async fn record_failure(&self, task_type: &str) {
        let mut states = self.states.lock().await;
        let state = states.entry(task_type.to_owned()).or_default();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.config.failure_threshold {
            state.open_until = Some(Instant::now() + self.config.cooldown());
            warn!(
                task_type,
                failures = state.consecutive_failures,
                cooldown_seconds = self.config.cooldown_seconds,
                "circuit opened for task type"
            );
        }
    }

    /// Whether the circuit for `task_type` is currently open.
    pub async fn is_open(&self, task_type: &str) -> bool {
        !self.should_allow(task_type).await
    }
}
