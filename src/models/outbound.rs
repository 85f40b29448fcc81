//! Queued outbound message model for the retry queue.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One message waiting for delivery to a session's process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct QueuedOutboundMessage {
    /// Destination session identifier.
    pub session_id: String,
    /// Message identifier, generated at enqueue time.
    pub message_id: String,
    /// Message body.
    pub content: String,
    /// Enqueue timestamp; the TTL clock starts here.
    pub queued_at: DateTime<Utc>,
    /// Failed delivery attempts so far.
    pub retry_count: u32,
}

impl QueuedOutboundMessage {
    /// Build a fresh message for `session_id` with a generated identifier.
    #[must_use]
    pub fn new(session_id: String, content: String) -> Self {
        Self {
            session_id,
            message_id: Uuid::new_v4().to_string(),
            content,
            queued_at: Utc::now(),
            retry_count: 0,
        }
    }

    /// Whether the message has outlived `ttl`.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        Utc::now()
            .signed_duration_since(self.queued_at)
            .to_std()
            .is_ok_and(|age| age >= ttl)
    }
}
