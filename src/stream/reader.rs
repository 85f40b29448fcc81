//! Pull-based line reader with bounded, cancellable waits.
//!
//! [`StreamLineReader`] wraps a raw readable stream, buffers incoming
//! chunks, and splits them on line terminators. Callers pull complete
//! lines one at a time via [`next_line`](StreamLineReader::next_line)
//! with a per-call timeout; `&mut self` receivers make "at most one
//! pending waiter" structural.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::Decoder;
use tracing::debug;

use super::codec::LineCodec;
use crate::{AppError, Result};

/// Diagnostics snapshot for a [`StreamLineReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderStats {
    /// Complete lines decoded so far.
    pub lines_read: u64,
    /// Raw bytes consumed from the stream.
    pub bytes_read: u64,
    /// Decoded lines waiting to be claimed.
    pub buffered_lines: usize,
    /// Bytes of a partial (unterminated) line in the fill buffer.
    pub partial_bytes: usize,
    /// Whether the stream has ended or been closed.
    pub closed: bool,
    /// Why the stream closed, when it has.
    pub close_reason: Option<String>,
}

/// Line-buffered reader over a raw byte stream.
///
/// Stream errors and explicit close both resolve to the end sentinel
/// (`Ok(None)`) rather than an error, with the cause recorded in
/// [`stats`](Self::stats); a consumer loop distinguishes clean exhaustion
/// from breakage via the diagnostics. A timeout cancels only the current
/// wait — the stream stays open and the next call rearms cleanly.
#[derive(Debug)]
pub struct StreamLineReader<R> {
    inner: R,
    codec: LineCodec,
    fill: BytesMut,
    ready: VecDeque<String>,
    lines_read: u64,
    bytes_read: u64,
    closed: bool,
    close_reason: Option<String>,
}

impl<R> StreamLineReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Wrap a raw stream.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            codec: LineCodec::new(),
            fill: BytesMut::with_capacity(8 * 1024),
            ready: VecDeque::new(),
            lines_read: 0,
            bytes_read: 0,
            closed: false,
            close_reason: None,
        }
    }

    /// Pull the next complete line, waiting up to `timeout` for data.
    ///
    /// Returns a buffered line immediately without scheduling a wait.
    /// `Ok(None)` is the end sentinel; on EOF any non-terminated trailing
    /// fragment is flushed as a final line exactly once before the
    /// sentinel.
    ///
    /// # Errors
    ///
    /// - [`AppError::Timeout`] — no complete line within `timeout`,
    ///   carrying elapsed and stream counters. The stream stays open.
    /// - [`AppError::Parse`] — a line exceeded the codec limit; the line
    ///   is discarded and the reader continues on the next call.
    pub async fn next_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        if let Some(line) = self.ready.pop_front() {
            return Ok(Some(line));
        }
        if self.closed {
            return Ok(None);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.inner.read_buf(&mut self.fill)).await {
                Err(_elapsed) => {
                    return Err(AppError::Timeout {
                        label: "stream line".to_owned(),
                        elapsed_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        lines_read: self.lines_read,
                        bytes_read: self.bytes_read,
                    });
                }
                Ok(Err(err)) => {
                    self.mark_closed(format!("stream error: {err}"));
                    self.flush_eof();
                    return Ok(self.ready.pop_front());
                }
                Ok(Ok(0)) => {
                    self.mark_closed("end of stream".to_owned());
                    self.flush_eof();
                    return Ok(self.ready.pop_front());
                }
                Ok(Ok(n)) => {
                    self.bytes_read += u64::try_from(n).unwrap_or(u64::MAX);
                    self.drain_complete_lines()?;
                    if let Some(line) = self.ready.pop_front() {
                        return Ok(Some(line));
                    }
                }
            }
        }
    }

    /// Mark the reader closed with an explicit reason.
    ///
    /// Buffered lines (including a flushed trailing fragment) remain
    /// claimable; subsequent calls then return the end sentinel.
    pub fn close(&mut self, reason: &str) {
        if !self.closed {
            self.mark_closed(reason.to_owned());
            self.flush_eof();
        }
    }

    /// Diagnostics snapshot.
    #[must_use]
    pub fn stats(&self) -> ReaderStats {
        ReaderStats {
            lines_read: self.lines_read,
            bytes_read: self.bytes_read,
            buffered_lines: self.ready.len(),
            partial_bytes: self.fill.len(),
            closed: self.closed,
            close_reason: self.close_reason.clone(),
        }
    }

    // ── Private helpers ──────────────────────────────────────────────────────

    fn mark_closed(&mut self, reason: String) {
        debug!(reason = reason.as_str(), "line reader closed");
        self.closed = true;
        self.close_reason = Some(reason);
    }

    /// Decode every complete line currently in the fill buffer.
    fn drain_complete_lines(&mut self) -> Result<()> {
        loop {
            match self.codec.decode(&mut self.fill) {
                Ok(Some(line)) => {
                    self.lines_read += 1;
                    self.ready.push_back(line);
                }
                Ok(None) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }

    /// Flush any trailing fragment after the stream ended.
    fn flush_eof(&mut self) {
        loop {
            match self.codec.decode_eof(&mut self.fill) {
                Ok(Some(line)) => {
                    self.lines_read += 1;
                    self.ready.push_back(line);
                }
                Ok(None) => return,
                Err(err) => {
                    debug!(%err, "discarding undecodable trailing fragment");
                    self.fill.clear();
                    return;
                }
            }
        }
    }
}
