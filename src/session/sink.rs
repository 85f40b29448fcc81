//! Outbound sink backed by the session manager.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::models::QueuedOutboundMessage;
use crate::outbox::OutboundSink;
use crate::Result;

use super::SessionManager;

/// Delivers queued messages by writing them to the target session's
/// process through [`SessionManager::send`].
pub struct ManagerSink {
    manager: Arc<SessionManager>,
}

impl ManagerSink {
    /// Sink over `manager`.
    #[must_use]
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}

impl OutboundSink for ManagerSink {
    fn deliver<'a>(
        &'a self,
        message: &'a QueuedOutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.manager
                .send(&message.session_id, &message.content)
                .await
        })
    }
}
