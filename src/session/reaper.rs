//! Periodic reaper for sessions whose process exited on its own.
//!
//! A turn in flight observes the exit through its reader; this task
//! covers the quiet case where a process dies between turns.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::SessionManager;

/// Default interval between reap passes.
pub const DEFAULT_REAP_PERIOD: Duration = Duration::from_secs(2);

/// Spawn the reaper task, polling every `period` until `cancel` fires.
#[must_use]
pub fn spawn_reaper(
    manager: Arc<SessionManager>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // First tick is immediate; skip it.
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("session reaper shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let reaped = manager.reap_exited().await;
                    if !reaped.is_empty() {
                        debug!(count = reaped.len(), "reaper collected exited sessions");
                    }
                }
            }
        }
    })
}
