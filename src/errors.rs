//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure, including unknown
    /// backend kinds at session-start time.
    Config(String),
    /// A capability (resume, fork) was requested from a component that
    /// does not provide it.
    Unsupported(String),
    /// A bounded wait elapsed without the awaited response.
    ///
    /// The stream counters report how much had been read on the watched
    /// stream when the wait started; both are zero for waits that are not
    /// attached to a stream (human input, fixed deadlines).
    Timeout {
        /// What was being awaited.
        label: String,
        /// Wait duration before giving up, in milliseconds.
        elapsed_ms: u64,
        /// Complete lines read on the stream before the wait.
        lines_read: u64,
        /// Bytes read on the stream before the wait.
        bytes_read: u64,
    },
    /// The agent process terminated with a failure while a stream was
    /// being consumed.
    ProcessExit {
        /// Exit code, absent when the process died from a signal.
        exit_code: Option<i32>,
        /// OS process id, when it was still known.
        pid: Option<u32>,
        /// Elapsed time since the session started, in milliseconds.
        runtime_ms: u64,
        /// Most recent stderr lines from the session ring buffer.
        stderr_tail: Vec<String>,
        /// Last message written to the process stdin, if any.
        last_input: Option<String>,
    },
    /// One output line could not be interpreted; callers log and skip.
    Parse(String),
    /// Session lookup or lifecycle failure.
    Session(String),
    /// The process input channel is no longer writable.
    ChannelClosed(String),
    /// A human-input request is already outstanding for the session.
    InputPending(String),
    /// A human-input request was cancelled before a response arrived.
    InputCancelled(String),
    /// The outbound queue is at capacity with no evictable entries.
    QueueFull(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            Self::Timeout {
                label,
                elapsed_ms,
                lines_read,
                bytes_read,
            } => write!(
                f,
                "timeout: {label} after {elapsed_ms}ms \
                 (lines_read={lines_read}, bytes_read={bytes_read})"
            ),
            Self::ProcessExit {
                exit_code,
                pid,
                runtime_ms,
                stderr_tail,
                ..
            } => {
                let code = exit_code.map_or_else(|| "signal".to_owned(), |c| c.to_string());
                let pid = pid.map_or_else(|| "unknown".to_owned(), |p| p.to_string());
                write!(
                    f,
                    "process exit: code={code} pid={pid} runtime_ms={runtime_ms} \
                     stderr_lines={}",
                    stderr_tail.len()
                )
            }
            Self::Parse(msg) => write!(f, "parse: {msg}"),
            Self::Session(msg) => write!(f, "session: {msg}"),
            Self::ChannelClosed(msg) => write!(f, "channel closed: {msg}"),
            Self::InputPending(msg) => write!(f, "input pending: {msg}"),
            Self::InputCancelled(msg) => write!(f, "input cancelled: {msg}"),
            Self::QueueFull(msg) => write!(f, "queue full: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
