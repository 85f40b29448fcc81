//! Integration tests for the outbound retry queue delivering through
//! the session manager.

use std::sync::Arc;

use agent_relay::backend::{BackendRegistry, SessionConfig};
use agent_relay::config::GlobalConfig;
use agent_relay::input::InputCorrelator;
use agent_relay::models::QueuedOutboundMessage;
use agent_relay::outbox::RetryQueue;
use agent_relay::resilience::TaskSupervisor;
use agent_relay::session::{ManagerSink, SessionManager};

fn test_config(workspace: &std::path::Path) -> Arc<GlobalConfig> {
    let raw = format!(
        "workspace_root = {:?}\nbackend = \"plain\"\n",
        workspace.display().to_string()
    );
    Arc::new(GlobalConfig::from_toml_str(&raw).expect("config"))
}

fn manager(config: Arc<GlobalConfig>) -> Arc<SessionManager> {
    let (supervisor, _alerts) = TaskSupervisor::new(
        config.metrics_capacity,
        config.timeouts.idle(),
        config.breaker.clone(),
    );
    Arc::new(SessionManager::new(
        config,
        Arc::new(BackendRegistry::with_builtins()),
        Arc::new(supervisor),
        Arc::new(InputCorrelator::new(None)),
    ))
}

fn cat_session(id: &str, workspace: &std::path::Path) -> SessionConfig {
    SessionConfig {
        session_id: id.into(),
        backend: "plain".into(),
        workspace_root: workspace.to_path_buf(),
        program: Some("cat".into()),
        extra_args: Vec::new(),
        extra_env: Vec::new(),
        model: None,
    }
}

#[tokio::test]
async fn flush_delivers_to_live_sessions_and_retries_the_rest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let manager = manager(Arc::clone(&config));
    manager
        .start(cat_session("live", dir.path()))
        .await
        .expect("start");

    let queue = RetryQueue::new(config.queue.clone(), None);
    queue
        .enqueue(QueuedOutboundMessage::new("live".into(), "hello".into()))
        .await
        .expect("enqueue");
    queue
        .enqueue(QueuedOutboundMessage::new("ghost".into(), "lost".into()))
        .await
        .expect("enqueue");

    let sink = ManagerSink::new(Arc::clone(&manager));
    let outcome = queue.flush(&sink).await;
    assert_eq!(outcome.delivered, 1);
    assert_eq!(outcome.remaining, 1);

    let record = manager.session("live").await.expect("record");
    assert_eq!(record.messages_sent, 1);
    assert_eq!(record.last_input.as_deref(), Some("hello"));

    manager.stop("live").await.expect("stop");
}

#[tokio::test]
async fn send_or_enqueue_falls_back_to_the_queue_after_stop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(dir.path());
    let manager = manager(Arc::clone(&config));
    manager
        .start(cat_session("s1", dir.path()))
        .await
        .expect("start");

    let queue = RetryQueue::new(config.queue.clone(), None);
    let sink = ManagerSink::new(Arc::clone(&manager));

    let direct = queue
        .send_or_enqueue(&sink, QueuedOutboundMessage::new("s1".into(), "now".into()))
        .await
        .expect("send");
    assert!(direct);
    assert!(queue.is_empty().await);

    manager.stop("s1").await.expect("stop");

    let direct = queue
        .send_or_enqueue(&sink, QueuedOutboundMessage::new("s1".into(), "later".into()))
        .await
        .expect("queued");
    assert!(!direct);
    assert_eq!(queue.len().await, 1);

    // A restarted session lets the queued message drain.
    manager
        .start(cat_session("s1", dir.path()))
        .await
        .expect("restart");
    let outcome = queue.flush(&sink).await;
    assert_eq!(outcome.delivered, 1);
    assert!(queue.is_empty().await);

    manager.stop("s1").await.expect("stop");
}
