//! Delegated-task supervisor: metrics, idle watchdogs, breaker gating,
//! and exactly-once multi-path cleanup.
//!
//! The supervisor owns the bounded invocation-metric map and one idle
//! watchdog per tracked invocation. Every invocation's resources are
//! released exactly once regardless of which path concludes it first —
//! normal result, circuit-breaker rejection, or session end — because
//! [`conclude`](TaskSupervisor::conclude) is idempotent.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::breaker::TaskBreaker;
use super::idle::{IdleAlert, IdleTimeout, IdleTimeoutHandle};
use crate::config::BreakerConfig;
use crate::models::TaskMetric;

/// Outcome of consulting the supervisor before a delegated task starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskDecision {
    /// The invocation may proceed; it is now tracked.
    Allowed,
    /// The circuit for this task type is open; nothing was left allocated.
    Blocked {
        /// Human-readable refusal reason for the emitted status event.
        reason: String,
    },
}

struct TaskEntry {
    metric: TaskMetric,
    idle: IdleTimeoutHandle,
}

#[derive(Default)]
struct SupervisorInner {
    entries: HashMap<String, TaskEntry>,
    /// Insertion order for oldest-first eviction at capacity.
    order: VecDeque<String>,
}

/// Long-lived supervisor instance; constructed once and shared by
/// reference (arena-style, no globals).
pub struct TaskSupervisor {
    capacity: usize,
    idle_window: Duration,
    breaker: TaskBreaker,
    alert_tx: mpsc::Sender<IdleAlert>,
    inner: Mutex<SupervisorInner>,
}

impl TaskSupervisor {
    /// Build a supervisor; the returned receiver surfaces idle alerts so a
    /// consumer can show "still working" states.
    #[must_use]
    pub fn new(
        capacity: usize,
        idle_window: Duration,
        breaker_config: BreakerConfig,
    ) -> (Self, mpsc::Receiver<IdleAlert>) {
        let (alert_tx, alert_rx) = mpsc::channel(32);
        (
            Self {
                capacity,
                idle_window,
                breaker: TaskBreaker::new(breaker_config),
                alert_tx,
                inner: Mutex::new(SupervisorInner::default()),
            },
            alert_rx,
        )
    }

    /// The breaker gating delegated-task invocations.
    #[must_use]
    pub fn breaker(&self) -> &TaskBreaker {
        &self.breaker
    }

    /// Register a delegated-task invocation and consult the breaker.
    ///
    /// On rejection a failure is recorded against the task type and the
    /// invocation is concluded immediately, so refusal leaves nothing
    /// behind. At capacity the oldest tracked invocation is evicted first.
    pub async fn begin(
        &self,
        session_id: &str,
        invocation_id: &str,
        task_type: &str,
    ) -> TaskDecision {
        {
            let mut inner = self.inner.lock().await;
            while inner.entries.len() >= self.capacity {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                if inner.entries.remove(&oldest).is_some() {
                    warn!(
                        invocation_id = oldest.as_str(),
                        "metric map at capacity; evicted oldest invocation"
                    );
                }
            }

            let idle = IdleTimeout::new(
                invocation_id.to_owned(),
                task_type.to_owned(),
                self.idle_window,
                self.alert_tx.clone(),
                CancellationToken::new(),
            )
            .spawn();

            let metric = TaskMetric::new(
                invocation_id.to_owned(),
                session_id.to_owned(),
                task_type.to_owned(),
            );
            inner
                .entries
                .insert(invocation_id.to_owned(), TaskEntry { metric, idle });
            inner.order.push_back(invocation_id.to_owned());
        }

        if self.breaker.should_allow(task_type).await {
            debug!(session_id, invocation_id, task_type, "delegated task allowed");
            TaskDecision::Allowed
        } else {
            // Refusal counts as a failure so repeated blocked attempts
            // keep the circuit open.
            self.breaker.record_failure(task_type).await;
            self.conclude(invocation_id).await;
            info!(session_id, invocation_id, task_type, "delegated task blocked");
            TaskDecision::Blocked {
                reason: format!("circuit open for task type \"{task_type}\""),
            }
        }
    }

    /// Record a progress event: bumps the metric and rearms the watchdog.
    pub async fn progress(&self, invocation_id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.entries.get_mut(invocation_id) {
            entry.metric.record_progress();
            entry.idle.touch();
        }
    }

    /// Record an allowed invocation's completion and conclude it.
    pub async fn complete(&self, invocation_id: &str, is_error: bool) {
        let task_type = {
            let inner = self.inner.lock().await;
            inner
                .entries
                .get(invocation_id)
                .map(|entry| entry.metric.task_type.clone())
        };
        if let Some(task_type) = task_type {
            if is_error {
                self.breaker.record_failure(&task_type).await;
            } else {
                self.breaker.record_success(&task_type).await;
            }
        }
        self.conclude(invocation_id).await;
    }

    /// Release an invocation's resources (metric + watchdog).
    ///
    /// Idempotent: calling twice for the same id is observably identical
    /// to calling once. Returns whether an entry existed.
    pub async fn conclude(&self, invocation_id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        inner.order.retain(|id| id != invocation_id);
        // Dropping the entry drops the watchdog handle, cancelling it.
        inner.entries.remove(invocation_id).is_some()
    }

    /// Conclude every invocation belonging to `session_id`.
    pub async fn end_session(&self, session_id: &str) {
        let mut inner = self.inner.lock().await;
        let doomed: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.metric.session_id == session_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &doomed {
            inner.order.retain(|entry_id| entry_id != id);
            inner.entries.remove(id);
        }
        if !doomed.is_empty() {
            debug!(
                session_id,
                count = doomed.len(),
                "concluded delegated tasks on session end"
            );
        }
    }

    /// Snapshot of a tracked invocation's metric.
    pub async fn metric(&self, invocation_id: &str) -> Option<TaskMetric> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(invocation_id)
            .map(|entry| entry.metric.clone())
    }

    /// Number of tracked invocations.
    pub async fn tracked(&self) -> usize {
        self.inner.lock().await.entries.len()
    }
}
