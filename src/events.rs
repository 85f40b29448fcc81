//! Typed event channel — the consuming-service boundary.
//!
//! The core emits this small closed set of structured events per session
//! over an `mpsc` channel, strictly in the order lines were read from the
//! process. The consuming service persists and fans out; this core never
//! does either.

use serde::{Deserialize, Serialize};

use crate::backend::{ToolInvocation, TurnStats};
use crate::models::MessageSegment;

/// One structured event emitted while streaming a session's turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Backend announced itself; the provider conversation id (once
    /// captured) survives a crash/restart cycle so resumption is possible.
    SessionInit {
        /// Session the event belongs to.
        session_id: String,
        /// Upstream conversation identifier, when reported.
        provider_session_id: Option<String>,
        /// Model identifier, when reported.
        model: Option<String>,
    },
    /// Streaming content delta for the current segment.
    SegmentDelta {
        /// Session the event belongs to.
        session_id: String,
        /// Segment the delta extends.
        segment_id: String,
        /// Appended text.
        text: String,
    },
    /// A segment's content boundary is fixed; persist it.
    SegmentFinal {
        /// Session the event belongs to.
        session_id: String,
        /// Finalized segment record.
        segment: MessageSegment,
        /// Complete segment content.
        text: String,
    },
    /// Extended-thinking delta, attached to the current segment.
    Thinking {
        /// Session the event belongs to.
        session_id: String,
        /// Segment the thinking belongs to.
        segment_id: String,
        /// Thinking text.
        text: String,
    },
    /// A tool invocation started.
    ToolStarted {
        /// Session the event belongs to.
        session_id: String,
        /// Segment the invocation logically belongs to.
        segment_id: String,
        /// Invocation details, with the effective parent filled in.
        invocation: ToolInvocation,
    },
    /// Progress report from a running tool invocation.
    ToolProgress {
        /// Session the event belongs to.
        session_id: String,
        /// Segment the invocation logically belongs to.
        segment_id: String,
        /// Invocation the progress belongs to.
        invocation_id: String,
        /// Effective parent invocation, when nested.
        parent_invocation_id: Option<String>,
        /// Human-readable progress message.
        message: String,
    },
    /// A tool invocation finished.
    ToolCompleted {
        /// Session the event belongs to.
        session_id: String,
        /// Segment the invocation logically belongs to.
        segment_id: String,
        /// Invocation the outcome belongs to.
        invocation_id: String,
        /// Whether the tool reported an error.
        is_error: bool,
        /// Result content, when present.
        content: Option<String>,
    },
    /// A delegated-task invocation was refused by the circuit breaker;
    /// emitted instead of `ToolStarted`.
    TaskBlocked {
        /// Session the event belongs to.
        session_id: String,
        /// Segment the refusal is attached to.
        segment_id: String,
        /// Task-type label whose circuit is open.
        task_type: String,
        /// Refused invocation identifier.
        invocation_id: String,
        /// Human-readable refusal reason.
        reason: String,
    },
    /// The turn completed cleanly.
    TurnCompleted {
        /// Session the event belongs to.
        session_id: String,
        /// Provider-reported statistics, when the backend sends them.
        stats: Option<TurnStats>,
    },
}

impl SessionEvent {
    /// Session identifier the event belongs to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::SessionInit { session_id, .. }
            | Self::SegmentDelta { session_id, .. }
            | Self::SegmentFinal { session_id, .. }
            | Self::Thinking { session_id, .. }
            | Self::ToolStarted { session_id, .. }
            | Self::ToolProgress { session_id, .. }
            | Self::ToolCompleted { session_id, .. }
            | Self::TaskBlocked { session_id, .. }
            | Self::TurnCompleted { session_id, .. } => session_id,
        }
    }
}
