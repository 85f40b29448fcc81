//! Outbound retry queue: bounded, TTL-evicting, FIFO.
//!
//! Messages that cannot currently reach their destination process land
//! here instead of being dropped, and are flushed oldest-first when
//! connectivity resumes. Terminal failures (capacity rejection, retry
//! exhaustion, TTL expiry) are reported to the owner — capacity rejection
//! synchronously at enqueue, the rest over the failure channel.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::QueueConfig;
use crate::models::QueuedOutboundMessage;
use crate::{AppError, Result};

// ── Sink contract ────────────────────────────────────────────────────────────

/// Delivery destination for queued messages.
pub trait OutboundSink: Send + Sync {
    /// Attempt to deliver one message.
    ///
    /// # Errors
    ///
    /// Any error counts as one failed delivery attempt.
    fn deliver<'a>(
        &'a self,
        message: &'a QueuedOutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

// ── Failure reporting ────────────────────────────────────────────────────────

/// Terminal failure of one queued message, reported to the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueFailure {
    /// The message outlived its TTL before delivery.
    Expired(QueuedOutboundMessage),
    /// Delivery attempts exceeded the configured maximum.
    RetriesExhausted(QueuedOutboundMessage),
}

/// Result summary of one flush pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Messages delivered and removed.
    pub delivered: usize,
    /// Messages terminally failed and removed.
    pub failed: usize,
    /// Messages left in place for the next flush.
    pub remaining: usize,
}

// ── Queue ────────────────────────────────────────────────────────────────────

/// Bounded FIFO retry queue for outbound messages.
pub struct RetryQueue {
    config: QueueConfig,
    entries: Mutex<VecDeque<QueuedOutboundMessage>>,
    failure_tx: Option<mpsc::Sender<QueueFailure>>,
}

impl RetryQueue {
    /// Queue with the given sizing/expiry settings; terminal failures
    /// other than enqueue-time rejection are reported on `failure_tx`
    /// when one is supplied.
    #[must_use]
    pub fn new(config: QueueConfig, failure_tx: Option<mpsc::Sender<QueueFailure>>) -> Self {
        Self {
            config,
            entries: Mutex::new(VecDeque::new()),
            failure_tx,
        }
    }

    /// Insert a message for later delivery.
    ///
    /// At capacity, TTL-expired entries are evicted first (and reported
    /// as expired); if the queue is still full the message is rejected as
    /// a terminal failure rather than growing unboundedly.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::QueueFull`] when no space can be reclaimed.
    pub async fn enqueue(&self, message: QueuedOutboundMessage) -> Result<()> {
        let expired = {
            let mut entries = self.entries.lock().await;
            let mut expired = Vec::new();
            if entries.len() >= self.config.capacity {
                expired = Self::take_expired(&mut entries, self.config.ttl());
            }
            if entries.len() >= self.config.capacity {
                // Report evictions even when the enqueue itself fails.
                for victim in expired {
                    self.report(QueueFailure::Expired(victim)).await;
                }
                return Err(AppError::QueueFull(format!(
                    "outbound queue at capacity ({})",
                    self.config.capacity
                )));
            }
            debug!(
                session_id = message.session_id.as_str(),
                message_id = message.message_id.as_str(),
                "outbound message queued"
            );
            entries.push_back(message);
            expired
        };
        for victim in expired {
            self.report(QueueFailure::Expired(victim)).await;
        }
        Ok(())
    }

    /// Deliver queued messages oldest-first through `sink`.
    ///
    /// A message whose retry count already exceeds the maximum is
    /// terminally failed and removed without an attempt. A failed attempt
    /// increments the retry count and leaves the message in place, order
    /// preserved, for the next flush.
    pub async fn flush(&self, sink: &dyn OutboundSink) -> FlushOutcome {
        let batch: Vec<QueuedOutboundMessage> = {
            let mut entries = self.entries.lock().await;
            entries.drain(..).collect()
        };

        let mut outcome = FlushOutcome::default();
        let mut kept = Vec::new();
        for mut message in batch {
            if message.retry_count >= self.config.max_retries {
                warn!(
                    message_id = message.message_id.as_str(),
                    retries = message.retry_count,
                    "outbound message exhausted retries"
                );
                outcome.failed += 1;
                self.report(QueueFailure::RetriesExhausted(message)).await;
                continue;
            }
            match sink.deliver(&message).await {
                Ok(()) => {
                    debug!(
                        message_id = message.message_id.as_str(),
                        "outbound message delivered"
                    );
                    outcome.delivered += 1;
                }
                Err(err) => {
                    debug!(
                        message_id = message.message_id.as_str(),
                        %err,
                        "outbound delivery failed; will retry"
                    );
                    message.retry_count += 1;
                    kept.push(message);
                }
            }
        }

        outcome.remaining = kept.len();
        if !kept.is_empty() {
            let mut entries = self.entries.lock().await;
            // Undelivered messages go back ahead of anything enqueued
            // during the flush, preserving FIFO order.
            for message in kept.into_iter().rev() {
                entries.push_front(message);
            }
        }
        outcome
    }

    /// Try direct delivery first; queue on failure.
    ///
    /// Returns `true` when the message was delivered immediately.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::QueueFull`] when delivery failed and the queue
    /// rejected the message.
    pub async fn send_or_enqueue(
        &self,
        sink: &dyn OutboundSink,
        message: QueuedOutboundMessage,
    ) -> Result<bool> {
        match sink.deliver(&message).await {
            Ok(()) => Ok(true),
            Err(err) => {
                debug!(
                    session_id = message.session_id.as_str(),
                    %err,
                    "direct delivery failed; queueing"
                );
                self.enqueue(message).await?;
                Ok(false)
            }
        }
    }

    /// Remove one queued message by id.
    ///
    /// Returns whether a matching entry existed.
    pub async fn cancel(&self, message_id: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|message| message.message_id != message_id);
        before != entries.len()
    }

    /// Purge TTL-expired entries, reporting each as failed.
    ///
    /// Returns how many entries were purged.
    pub async fn sweep(&self) -> usize {
        let expired = {
            let mut entries = self.entries.lock().await;
            Self::take_expired(&mut entries, self.config.ttl())
        };
        let count = expired.len();
        for victim in expired {
            warn!(
                message_id = victim.message_id.as_str(),
                "outbound message expired before delivery"
            );
            self.report(QueueFailure::Expired(victim)).await;
        }
        count
    }

    /// Number of queued messages.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the queue is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────────────

    fn take_expired(
        entries: &mut VecDeque<QueuedOutboundMessage>,
        ttl: Duration,
    ) -> Vec<QueuedOutboundMessage> {
        let mut expired = Vec::new();
        entries.retain(|message| {
            if message.is_expired(ttl) {
                expired.push(message.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    async fn report(&self, failure: QueueFailure) {
        if let Some(ref tx) = self.failure_tx {
            let _ = tx.send(failure).await;
        }
    }
}

// ── Sweep task ───────────────────────────────────────────────────────────────

/// Spawn the periodic TTL sweep task.
///
/// Runs until `cancel` fires, purging expired entries every
/// `queue.sweep_interval` and reporting them as failed.
#[must_use]
pub fn spawn_sweep_task(queue: Arc<RetryQueue>, cancel: CancellationToken) -> JoinHandle<()> {
    let period = queue.config.sweep_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // First tick is immediate; skip it.
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("outbound sweep task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let purged = queue.sweep().await;
                    if purged > 0 {
                        info!(purged, "outbound sweep purged expired messages");
                    }
                }
            }
        }
    })
}
