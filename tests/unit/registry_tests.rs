//! Unit tests for the backend adapter registry.

use std::sync::Arc;

use agent_relay::backend::plain::PlainAdapter;
use agent_relay::backend::BackendRegistry;
use agent_relay::AppError;

#[test]
fn builtins_cover_claude_and_plain() {
    let registry = BackendRegistry::with_builtins();
    assert_eq!(registry.kinds(), vec!["claude", "plain"]);
    assert!(registry.lookup("claude").is_ok());
    assert!(registry.lookup("plain").is_ok());
}

#[test]
fn unknown_kind_is_a_config_error() {
    let registry = BackendRegistry::with_builtins();
    let err = registry.lookup("gemini").unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert!(err.to_string().contains("gemini"));
}

#[test]
fn empty_registry_knows_nothing() {
    let registry = BackendRegistry::new();
    assert!(registry.kinds().is_empty());
    assert!(registry.lookup("claude").is_err());
}

#[test]
fn register_adds_under_the_adapters_kind() {
    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(PlainAdapter));
    let adapter = registry.lookup("plain").expect("registered");
    assert_eq!(adapter.kind(), "plain");
}

#[test]
fn default_is_the_builtin_set() {
    let registry = BackendRegistry::default();
    assert_eq!(registry.kinds(), vec!["claude", "plain"]);
}
