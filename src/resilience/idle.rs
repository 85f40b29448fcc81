//! Per-invocation idle watchdog.
//!
//! An [`IdleTimeout`] fires only after a full window with no activity
//! signal — used while a delegated task runs, since total runtime may
//! exceed any single-response deadline without the stream being stalled.
//! Firing warns and continues; it never cancels the watched task. The
//! absolute bound on a fully silent stream is the manager's response
//! timeout on the line reader.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Alert emitted when a delegated task goes quiet past the idle window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleAlert {
    /// Invocation that went quiet.
    pub invocation_id: String,
    /// Task-type label of the invocation.
    pub task_type: String,
    /// Idle window that elapsed, in seconds.
    pub idle_seconds: u64,
}

/// Builder for a per-invocation idle watchdog.
///
/// Call [`spawn`](Self::spawn) to start the background timer task.
pub struct IdleTimeout {
    invocation_id: String,
    task_type: String,
    window: Duration,
    alert_tx: mpsc::Sender<IdleAlert>,
    cancel: CancellationToken,
}

impl IdleTimeout {
    /// Construct a watchdog (does not start the timer yet).
    #[must_use]
    pub fn new(
        invocation_id: String,
        task_type: String,
        window: Duration,
        alert_tx: mpsc::Sender<IdleAlert>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            invocation_id,
            task_type,
            window,
            alert_tx,
            cancel,
        }
    }

    /// Spawn the background timer task and return its control handle.
    #[must_use]
    pub fn spawn(self) -> IdleTimeoutHandle {
        let touch_notify = Arc::new(Notify::new());
        let cancel_for_handle = self.cancel.clone();

        let notify = Arc::clone(&touch_notify);
        let task = tokio::spawn(Self::run(
            self.invocation_id,
            self.task_type,
            self.window,
            self.alert_tx,
            self.cancel,
            notify,
        ));

        IdleTimeoutHandle {
            touch_notify,
            cancel: cancel_for_handle,
            join_handle: Some(task),
        }
    }

    /// Core timer loop: sleep the window, rearm on touch, alert on elapse.
    async fn run(
        invocation_id: String,
        task_type: String,
        window: Duration,
        alert_tx: mpsc::Sender<IdleAlert>,
        cancel: CancellationToken,
        touch_notify: Arc<Notify>,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(invocation_id, "idle watchdog cancelled");
                    return;
                }
                () = touch_notify.notified() => {
                    // Activity observed — rearm the window.
                }
                () = tokio::time::sleep(window) => {
                    let idle_seconds = window.as_secs();
                    warn!(
                        invocation_id,
                        task_type = task_type.as_str(),
                        idle_seconds,
                        "delegated task idle past window; continuing to watch"
                    );
                    let _ = alert_tx
                        .send(IdleAlert {
                            invocation_id: invocation_id.clone(),
                            task_type: task_type.clone(),
                            idle_seconds,
                        })
                        .await;
                    // Warn-and-continue: keep watching for the next window.
                }
            }
        }
    }
}

/// Handle controlling a spawned idle watchdog.
///
/// Dropping the handle cancels the background task, so cleanup paths can
/// simply drop it; doing so twice is harmless.
pub struct IdleTimeoutHandle {
    touch_notify: Arc<Notify>,
    cancel: CancellationToken,
    join_handle: Option<JoinHandle<()>>,
}

impl IdleTimeoutHandle {
    /// Signal activity: rearms the idle window.
    pub fn touch(&self) {
        self.touch_notify.notify_one();
    }

    /// Stop the watchdog and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for IdleTimeoutHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
