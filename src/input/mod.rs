//! Human-input correlator: blocking request/response matching.
//!
//! At most one request may be outstanding per session. The per-session
//! state is an explicit tagged slot ([`InputSlot`]) rather than map-key
//! absence, so "no request" is a value, not a missing entry. A suspended
//! request resolves on `provide_input`, or fails on `cancel_request` or
//! on its optional timeout — exactly one of the three fires.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info};

use crate::{AppError, Result};

/// Default cancellation reason when the caller supplies none.
const DEFAULT_CANCEL_REASON: &str = "Cancelled by user";

/// One human-input request as presented to the operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct InputRequest {
    /// Question to put to the human.
    pub question: String,
    /// Optional surrounding context.
    pub context: Option<String>,
    /// Optional fixed answer options.
    pub options: Vec<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl InputRequest {
    /// Build a request for `question` with no context or options.
    #[must_use]
    pub fn new(question: String) -> Self {
        Self {
            question,
            context: None,
            options: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// The human's answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct InputResponse {
    /// Answer text.
    pub text: String,
}

/// Notification sent to the external listener when a request registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputNotification {
    /// Session the request belongs to.
    pub session_id: String,
    /// The registered request.
    pub request: InputRequest,
}

enum InputOutcome {
    Answered(InputResponse),
    Cancelled(String),
}

enum InputSlot {
    /// No request outstanding.
    Empty,
    /// A request is suspended awaiting resolution.
    Pending {
        request: InputRequest,
        resolver: oneshot::Sender<InputOutcome>,
        /// Registration id; lets a late expiry recognize a slot that a
        /// newer request now owns.
        generation: u64,
    },
}

/// Session-keyed request/response correlator.
pub struct InputCorrelator {
    slots: Mutex<HashMap<String, InputSlot>>,
    generations: AtomicU64,
    listener: Option<mpsc::Sender<InputNotification>>,
}

impl InputCorrelator {
    /// Correlator with an optional external listener channel; each
    /// registered request is mirrored onto the listener.
    #[must_use]
    pub fn new(listener: Option<mpsc::Sender<InputNotification>>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
            listener,
        }
    }

    /// Register a request for `session_id` and suspend until resolution.
    ///
    /// # Errors
    ///
    /// - [`AppError::InputPending`] — a request is already outstanding for
    ///   the session; the outstanding one is unaffected.
    /// - [`AppError::Timeout`] — `timeout` elapsed with no response; the
    ///   slot is cleared so the session can ask again.
    /// - [`AppError::InputCancelled`] — `cancel_request` fired first.
    pub async fn request_input(
        &self,
        session_id: &str,
        request: InputRequest,
        timeout: Option<Duration>,
    ) -> Result<InputResponse> {
        let (generation, rx) = {
            let mut slots = self.slots.lock().await;
            let slot = slots
                .entry(session_id.to_owned())
                .or_insert(InputSlot::Empty);
            if matches!(slot, InputSlot::Pending { .. }) {
                return Err(AppError::InputPending(format!(
                    "session {session_id} already has a pending input request"
                )));
            }
            let generation = self.generations.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = oneshot::channel();
            *slot = InputSlot::Pending {
                request: request.clone(),
                resolver: tx,
                generation,
            };
            (generation, rx)
        };

        if let Some(ref listener) = self.listener {
            let _ = listener
                .send(InputNotification {
                    session_id: session_id.to_owned(),
                    request,
                })
                .await;
        }
        info!(session_id, "human-input request registered");

        match timeout {
            Some(window) => match tokio::time::timeout(window, rx).await {
                Ok(outcome) => Self::resolve(outcome),
                Err(_elapsed) => self.expire(session_id, generation, window).await,
            },
            None => Self::resolve(rx.await),
        }
    }

    /// Resolve the pending request for `session_id` with `response`.
    ///
    /// Returns whether a pending request existed.
    pub async fn provide_input(&self, session_id: &str, response: InputResponse) -> bool {
        let mut slots = self.slots.lock().await;
        match slots.insert(session_id.to_owned(), InputSlot::Empty) {
            Some(InputSlot::Pending { resolver, .. }) => {
                let _ = resolver.send(InputOutcome::Answered(response));
                true
            }
            _ => false,
        }
    }

    /// Cancel the pending request for `session_id`.
    ///
    /// Returns whether a pending request existed. The suspended caller
    /// fails with [`AppError::InputCancelled`] carrying `reason` (default
    /// `"Cancelled by user"`).
    pub async fn cancel_request(&self, session_id: &str, reason: Option<String>) -> bool {
        let mut slots = self.slots.lock().await;
        match slots.insert(session_id.to_owned(), InputSlot::Empty) {
            Some(InputSlot::Pending { resolver, .. }) => {
                let reason = reason.unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_owned());
                debug!(session_id, reason = reason.as_str(), "input request cancelled");
                let _ = resolver.send(InputOutcome::Cancelled(reason));
                true
            }
            _ => false,
        }
    }

    /// Whether a request is outstanding for `session_id`.
    pub async fn pending(&self, session_id: &str) -> bool {
        let slots = self.slots.lock().await;
        matches!(slots.get(session_id), Some(InputSlot::Pending { .. }))
    }

    // ── Private helpers ──────────────────────────────────────────────────────

    fn resolve(
        outcome: std::result::Result<InputOutcome, oneshot::error::RecvError>,
    ) -> Result<InputResponse> {
        match outcome {
            Ok(InputOutcome::Answered(response)) => Ok(response),
            Ok(InputOutcome::Cancelled(reason)) => Err(AppError::InputCancelled(reason)),
            Err(_dropped) => Err(AppError::InputCancelled(
                "request dropped before resolution".to_owned(),
            )),
        }
    }

    /// Clear the slot after a timeout, handling a concurrent resolution
    /// that raced the deadline.
    ///
    /// Clears only the registration identified by `generation`: a
    /// resolution may have raced the deadline and the slot may already
    /// belong to a newer request, which must stay pending.
    async fn expire(
        &self,
        session_id: &str,
        generation: u64,
        window: Duration,
    ) -> Result<InputResponse> {
        let mut slots = self.slots.lock().await;
        match slots.get(session_id) {
            Some(InputSlot::Pending {
                generation: current,
                ..
            }) if *current == generation => {
                slots.insert(session_id.to_owned(), InputSlot::Empty);
            }
            _ => {
                // provide_input/cancel_request won the race but our
                // receiver was consumed by the timeout wrapper; report
                // the timeout and leave the slot alone.
                debug!(session_id, "input resolution raced the timeout; reporting timeout");
            }
        }
        drop(slots);
        Err(AppError::Timeout {
            label: format!("human input for session {session_id}"),
            elapsed_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
            lines_read: 0,
            bytes_read: 0,
        })
    }
}
