//! Unit tests for `AppError` display formats.

use agent_relay::AppError;

#[test]
fn config_error_display_starts_with_config_prefix() {
    let err = AppError::Config("backend must not be empty".into());
    assert_eq!(err.to_string(), "config: backend must not be empty");
}

#[test]
fn timeout_error_carries_stream_counters() {
    let err = AppError::Timeout {
        label: "stream line".into(),
        elapsed_ms: 30_000,
        lines_read: 12,
        bytes_read: 4_096,
    };
    let s = err.to_string();
    assert!(s.starts_with("timeout: stream line after 30000ms"));
    assert!(s.contains("lines_read=12"));
    assert!(s.contains("bytes_read=4096"));
}

#[test]
fn process_exit_display_reports_code_and_stderr_count() {
    let err = AppError::ProcessExit {
        exit_code: Some(3),
        pid: Some(4242),
        runtime_ms: 1500,
        stderr_tail: vec!["oops".into(), "panic".into()],
        last_input: Some("do the thing".into()),
    };
    let s = err.to_string();
    assert!(s.contains("code=3"));
    assert!(s.contains("pid=4242"));
    assert!(s.contains("stderr_lines=2"));
}

#[test]
fn process_exit_by_signal_reports_signal() {
    let err = AppError::ProcessExit {
        exit_code: None,
        pid: None,
        runtime_ms: 10,
        stderr_tail: Vec::new(),
        last_input: None,
    };
    let s = err.to_string();
    assert!(s.contains("code=signal"));
    assert!(s.contains("pid=unknown"));
}

#[test]
fn error_messages_have_no_trailing_period() {
    let errors = [
        AppError::Unsupported("fork is not supported".into()),
        AppError::Session("unknown session: s1".into()),
        AppError::ChannelClosed("stdin write failed".into()),
        AppError::InputPending("already pending".into()),
        AppError::InputCancelled("Cancelled by user".into()),
        AppError::QueueFull("at capacity".into()),
    ];
    for err in errors {
        let s = err.to_string();
        assert!(!s.ends_with('.'), "no trailing period: {s}");
    }
}

#[test]
fn variants_are_distinct_in_display() {
    let a = AppError::Session("x".into());
    let b = AppError::Parse("x".into());
    assert_ne!(a.to_string(), b.to_string());
}

#[test]
fn io_error_converts_via_from() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe gone");
    let err: AppError = io.into();
    assert!(matches!(err, AppError::Io(_)));
    assert!(err.to_string().contains("pipe gone"));
}

#[test]
fn implements_std_error_trait() {
    fn assert_error<E: std::error::Error>(_e: &E) {}
    assert_error(&AppError::Parse("bad".into()));
}
