//! Fixed-deadline timeout wrapper.

use std::future::Future;
use std::time::Duration;

use crate::{AppError, Result};

/// Race one fallible operation against a single fixed deadline.
///
/// Unlike the idle flavor in [`super::idle`], the deadline is never
/// rearmed: if `fut` does not resolve within `duration`, the awaited
/// operation fails.
///
/// # Errors
///
/// Returns [`AppError::Timeout`] when the deadline elapses, or the
/// operation's own error when it fails first.
pub async fn with_timeout<F, T>(duration: Duration, label: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_elapsed) => Err(AppError::Timeout {
            label: label.to_owned(),
            elapsed_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            lines_read: 0,
            bytes_read: 0,
        }),
    }
}
