//! Delegated-task invocation metric.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tracks one delegated-task ("sub-agent") tool invocation while it runs.
///
/// Created when the invocation is observed on the stream, mutated on every
/// progress event, and removed exactly once — on result, circuit-breaker
/// rejection, or session end, whichever comes first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TaskMetric {
    /// Tool-invocation identifier from the backend stream.
    pub invocation_id: String,
    /// Session the invocation belongs to.
    pub session_id: String,
    /// Task-type label, the circuit-breaker key.
    pub task_type: String,
    /// When the invocation was first observed.
    pub started_at: DateTime<Utc>,
    /// When the last progress event arrived.
    pub last_progress_at: DateTime<Utc>,
    /// Progress events observed so far.
    pub progress_events: u64,
}

impl TaskMetric {
    /// Record a newly observed invocation.
    #[must_use]
    pub fn new(invocation_id: String, session_id: String, task_type: String) -> Self {
        let now = Utc::now();
        Self {
            invocation_id,
            session_id,
            task_type,
            started_at: now,
            last_progress_at: now,
            progress_events: 0,
        }
    }

    /// Register one progress event.
    pub fn record_progress(&mut self) {
        self.progress_events += 1;
        self.last_progress_at = Utc::now();
    }
}
