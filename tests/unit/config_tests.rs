//! Unit tests for configuration parsing, defaults, and validation.

use std::time::Duration;

use agent_relay::config::GlobalConfig;
use agent_relay::AppError;

fn minimal_toml(workspace: &std::path::Path) -> String {
    format!("workspace_root = {:?}\n", workspace.display().to_string())
}

#[test]
fn minimal_config_gets_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = GlobalConfig::from_toml_str(&minimal_toml(dir.path())).expect("parse");

    assert_eq!(config.backend, "claude");
    assert_eq!(config.max_concurrent_sessions, 3);
    assert_eq!(config.stderr_ring_lines, 50);
    assert_eq!(config.metrics_capacity, 64);
    assert_eq!(config.timeouts.init(), Duration::from_secs(30));
    assert_eq!(config.timeouts.response(), Duration::from_secs(120));
    assert_eq!(config.timeouts.idle(), Duration::from_secs(60));
    assert_eq!(config.timeouts.stop_grace(), Duration::from_secs(5));
    assert_eq!(config.timeouts.input(), None);
    assert_eq!(config.breaker.failure_threshold, 3);
    assert_eq!(config.breaker.cooldown(), Duration::from_secs(30));
    assert_eq!(config.queue.capacity, 256);
    assert_eq!(config.queue.ttl(), Duration::from_secs(900));
    assert_eq!(config.queue.max_retries, 3);
    assert_eq!(config.queue.sweep_interval(), Duration::from_secs(60));
}

#[test]
fn workspace_root_is_canonicalized() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = GlobalConfig::from_toml_str(&minimal_toml(dir.path())).expect("parse");
    assert!(config.workspace_root.is_absolute());
}

#[test]
fn missing_workspace_root_is_rejected() {
    let err = GlobalConfig::from_toml_str("backend = \"claude\"\n").unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn nonexistent_workspace_root_is_rejected() {
    let err =
        GlobalConfig::from_toml_str("workspace_root = \"/does/not/exist/anywhere\"\n").unwrap_err();
    assert!(err.to_string().contains("workspace_root invalid"));
}

#[test]
fn empty_backend_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raw = format!("backend = \"  \"\n{}", minimal_toml(dir.path()));
    let err = GlobalConfig::from_toml_str(&raw).unwrap_err();
    assert!(err.to_string().contains("backend must not be empty"));
}

#[test]
fn zero_max_concurrent_sessions_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raw = format!("max_concurrent_sessions = 0\n{}", minimal_toml(dir.path()));
    let err = GlobalConfig::from_toml_str(&raw).unwrap_err();
    assert!(err.to_string().contains("max_concurrent_sessions"));
}

#[test]
fn response_shorter_than_init_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raw = format!(
        "{}\n[timeouts]\ninit_seconds = 60\nresponse_seconds = 30\n",
        minimal_toml(dir.path())
    );
    let err = GlobalConfig::from_toml_str(&raw).unwrap_err();
    assert!(err.to_string().contains("response_seconds"));
}

#[test]
fn zero_queue_capacity_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raw = format!("{}\n[queue]\ncapacity = 0\n", minimal_toml(dir.path()));
    let err = GlobalConfig::from_toml_str(&raw).unwrap_err();
    assert!(err.to_string().contains("queue.capacity"));
}

#[test]
fn zero_failure_threshold_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raw = format!(
        "{}\n[breaker]\nfailure_threshold = 0\n",
        minimal_toml(dir.path())
    );
    let err = GlobalConfig::from_toml_str(&raw).unwrap_err();
    assert!(err.to_string().contains("failure_threshold"));
}

#[test]
fn explicit_sections_override_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raw = format!(
        r#"{root}
backend = "plain"
max_concurrent_sessions = 8

[timeouts]
init_seconds = 10
response_seconds = 45
input_seconds = 300

[breaker]
failure_threshold = 5
cooldown_seconds = 120

[queue]
capacity = 16
ttl_seconds = 60
"#,
        root = minimal_toml(dir.path())
    );
    let config = GlobalConfig::from_toml_str(&raw).expect("parse");
    assert_eq!(config.backend, "plain");
    assert_eq!(config.max_concurrent_sessions, 8);
    assert_eq!(config.timeouts.init(), Duration::from_secs(10));
    assert_eq!(config.timeouts.input(), Some(Duration::from_secs(300)));
    assert_eq!(config.breaker.failure_threshold, 5);
    assert_eq!(config.breaker.cooldown(), Duration::from_secs(120));
    assert_eq!(config.queue.capacity, 16);
    assert_eq!(config.queue.ttl(), Duration::from_secs(60));
}

#[test]
fn invalid_toml_maps_to_config_error() {
    let err = GlobalConfig::from_toml_str("not = = toml").unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert!(err.to_string().starts_with("config: invalid config"));
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, minimal_toml(dir.path())).expect("write");
    let config = GlobalConfig::load_from_path(&path).expect("load");
    assert_eq!(config.backend, "claude");
}

#[test]
fn load_from_missing_path_fails() {
    let err = GlobalConfig::load_from_path("/no/such/config.toml").unwrap_err();
    assert!(err.to_string().contains("failed to read config"));
}
