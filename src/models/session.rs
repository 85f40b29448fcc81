//! Session record and lifecycle helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status for an agent session.
///
/// Exit states (`Stopped`, `Crashed`) are terminal for the in-memory
/// record; a later resume creates a fresh record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Process spawn in progress.
    Starting,
    /// Process live and accepting messages.
    Running,
    /// Process terminated by an explicit stop.
    Stopped,
    /// Process exited unexpectedly.
    Crashed,
}

/// In-memory session record owned by the session manager.
///
/// The session identifier is opaque and externally assigned; the provider
/// conversation identifier is captured once from the backend's init
/// envelope and never overwritten.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Session {
    /// Externally assigned session identifier.
    pub id: String,
    /// Backend-kind label the session was started with.
    pub backend: String,
    /// Upstream conversation identifier reported by the agent process.
    pub provider_session_id: Option<String>,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Spawn timestamp.
    pub started_at: DateTime<Utc>,
    /// Last send/receive timestamp.
    pub last_activity_at: DateTime<Utc>,
    /// Messages written to the process stdin.
    pub messages_sent: u64,
    /// Assistant output units parsed from the process stdout.
    pub responses_received: u64,
    /// Whether the backend reported its init envelope (or the session was
    /// resumed and is pre-initialized).
    pub initialized: bool,
    /// Last message written to stdin, kept for process-exit diagnostics.
    pub last_input: Option<String>,
}

impl Session {
    /// Construct a fresh record for a newly spawned session.
    #[must_use]
    pub fn new(id: String, backend: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            backend,
            provider_session_id: None,
            status: SessionStatus::Starting,
            started_at: now,
            last_activity_at: now,
            messages_sent: 0,
            responses_received: 0,
            initialized: false,
            last_input: None,
        }
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self.status, next),
            (SessionStatus::Starting, SessionStatus::Running)
                | (
                    SessionStatus::Starting | SessionStatus::Running,
                    SessionStatus::Stopped | SessionStatus::Crashed
                )
        )
    }

    /// Stamp the last-activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }
}

/// Snapshot handle returned from start/resume calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionHandle {
    /// Externally assigned session identifier.
    pub session_id: String,
    /// Upstream conversation identifier, when already known.
    pub provider_session_id: Option<String>,
    /// Lifecycle status at snapshot time.
    pub status: SessionStatus,
    /// OS process id of the spawned child, when available.
    pub pid: Option<u32>,
    /// Spawn timestamp.
    pub started_at: DateTime<Utc>,
}
