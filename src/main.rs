#![forbid(unsafe_code)]

//! `agent-relay` — run a coding-agent CLI session and stream its turns.
//!
//! Bootstraps configuration, starts the session manager with its reaper
//! and the outbound sweep task, runs one streamed turn for the given
//! prompt, and prints the derived session events as JSON lines.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use agent_relay::backend::{BackendRegistry, SessionConfig};
use agent_relay::config::GlobalConfig;
use agent_relay::events::SessionEvent;
use agent_relay::input::InputCorrelator;
use agent_relay::outbox::{spawn_sweep_task, RetryQueue};
use agent_relay::resilience::TaskSupervisor;
use agent_relay::session::{reaper, SessionManager};
use agent_relay::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-relay", about = "Agent process session relay", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured backend kind.
    #[arg(long)]
    backend: Option<String>,

    /// Override the configured workspace root.
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Override the backend's default program path.
    #[arg(long)]
    program: Option<String>,

    /// Provider conversation id to resume instead of starting fresh.
    #[arg(long)]
    resume: Option<String>,

    /// Prompt to send as the turn's message.
    prompt: String,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("agent-relay bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(ws) = args.workspace {
        let canonical = ws
            .canonicalize()
            .map_err(|err| AppError::Config(format!("invalid workspace override: {err}")))?;
        config.workspace_root = canonical;
    }
    if let Some(program) = args.program {
        config.program = Some(program);
    }
    let config = Arc::new(config);
    info!(backend = config.backend.as_str(), "configuration loaded");

    // ── Build collaborators ─────────────────────────────
    let registry = Arc::new(BackendRegistry::with_builtins());
    let (supervisor, mut idle_alerts) = TaskSupervisor::new(
        config.metrics_capacity,
        config.timeouts.idle(),
        config.breaker.clone(),
    );
    let supervisor = Arc::new(supervisor);
    let input = Arc::new(InputCorrelator::new(None));
    let manager = Arc::new(SessionManager::new(
        Arc::clone(&config),
        registry,
        Arc::clone(&supervisor),
        input,
    ));
    let queue = Arc::new(RetryQueue::new(config.queue.clone(), None));

    // ── Start background tasks ──────────────────────────
    let ct = CancellationToken::new();
    let reaper_handle =
        reaper::spawn_reaper(Arc::clone(&manager), reaper::DEFAULT_REAP_PERIOD, ct.clone());
    let sweep_handle = spawn_sweep_task(Arc::clone(&queue), ct.clone());
    let alert_handle = tokio::spawn(async move {
        while let Some(alert) = idle_alerts.recv().await {
            warn!(
                invocation_id = alert.invocation_id.as_str(),
                task_type = alert.task_type.as_str(),
                idle_seconds = alert.idle_seconds,
                "delegated task idle"
            );
        }
    });

    // ── Start the session and stream one turn ───────────
    let session_config = SessionConfig {
        session_id: uuid::Uuid::new_v4().to_string(),
        backend: config.backend.clone(),
        workspace_root: config.workspace_root.clone(),
        program: config.program.clone(),
        extra_args: config.program_args.clone(),
        extra_env: Vec::new(),
        model: None,
    };
    let session_id = session_config.session_id.clone();

    let handle = match args.resume {
        Some(ref provider_session_id) => {
            manager.resume(session_config, provider_session_id).await?
        }
        None => manager.start(session_config).await?,
    };
    info!(
        session_id = handle.session_id.as_str(),
        pid = handle.pid,
        "session live"
    );

    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => error!(%err, "failed to serialize event"),
            }
        }
    });

    let turn = tokio::select! {
        outcome = manager.stream_turn(&session_id, Some(&args.prompt), &event_tx) => Some(outcome),
        () = shutdown_signal() => {
            info!("shutdown signal received mid-turn");
            None
        }
    };
    drop(event_tx);
    let _ = printer.await;

    // ── Shut down ───────────────────────────────────────
    manager.stop_all().await;
    ct.cancel();
    let _ = tokio::join!(reaper_handle, sweep_handle, alert_handle);

    match turn {
        Some(Ok(outcome)) => {
            info!(stats = ?outcome.stats, "turn completed");
            Ok(())
        }
        Some(Err(err)) => {
            error!(%err, "turn failed");
            Err(err)
        }
        None => Ok(()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
