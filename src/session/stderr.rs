//! Per-session stderr capture.
//!
//! Reads the child's stderr line-by-line into a bounded ring buffer so
//! process-exit failures can carry a recent stderr tail. Lines that look
//! like errors are logged at WARN with the session id; everything else
//! at DEBUG.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::StreamExt;
use regex::Regex;
use tokio::process::ChildStderr;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::stream::LineCodec;

/// Case-insensitive pattern marking a stderr line as error-looking.
const ERROR_PATTERN: &str = r"(?i)\b(error|panic|fatal|fail|failed|exception|traceback)\b";

/// Spawn the stderr capture task for one session.
///
/// The task exits on stream end or when `cancel` fires. The ring buffer
/// keeps the most recent `capacity` lines.
#[must_use]
pub fn spawn_stderr_capture(
    session_id: String,
    stderr: ChildStderr,
    ring: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let pattern = Regex::new(ERROR_PATTERN).ok();
        let mut framed = FramedRead::new(stderr, LineCodec::new());

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!(session_id, "stderr capture cancelled");
                    break;
                }

                item = framed.next() => {
                    match item {
                        None => {
                            debug!(session_id, "stderr stream ended");
                            break;
                        }
                        Some(Err(err)) => {
                            debug!(session_id, %err, "stderr framing error, skipping");
                        }
                        Some(Ok(line)) => {
                            if pattern.as_ref().is_some_and(|p| p.is_match(&line)) {
                                warn!(session_id, line = line.as_str(), "agent stderr");
                            } else {
                                debug!(session_id, line = line.as_str(), "agent stderr");
                            }
                            let mut ring = ring.lock().await;
                            if ring.len() >= capacity {
                                ring.pop_front();
                            }
                            ring.push_back(line);
                        }
                    }
                }
            }
        }
    })
}
