//! Process session manager.
//!
//! Owns the mapping from session identifier to one live subprocess, its
//! line reader, and its in-memory record. Exposes start/resume/send/
//! stream-turn/stop; everything backend-specific is delegated to the
//! adapter resolved at start time.

pub mod reaper;
pub mod sink;
pub mod stderr;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{
    BackendAdapter, BackendRegistry, CanonicalEnvelope, Invocation, OutputBlock, SessionConfig,
    TurnStats,
};
use crate::config::GlobalConfig;
use crate::events::SessionEvent;
use crate::input::InputCorrelator;
use crate::models::{Session, SessionHandle, SessionStatus};
use crate::pipeline::{SegmentAssembler, SegmentOp};
use crate::resilience::{TaskDecision, TaskSupervisor};
use crate::stream::StreamLineReader;
use crate::{AppError, Result};

pub use sink::ManagerSink;

// ── Environment allowlist ────────────────────────────────────────────────────

/// Environment variables inherited by spawned agent processes.
///
/// Everything else is stripped via `env_clear()` before launch, so
/// credentials held by the relay never leak into an agent's environment.
/// Backend-specific variables are injected explicitly by the adapter.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "LANG",
    "TERM",
    "RUST_LOG",
    // Windows-specific variables.
    "USERPROFILE",
    "SystemRoot",
    "TEMP",
    "TMP",
    "USERNAME",
    "APPDATA",
    "LOCALAPPDATA",
    "COMSPEC",
];

// ── Types ────────────────────────────────────────────────────────────────────

/// Result of one completed streaming turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    /// Provider-reported statistics, when the backend sends them.
    pub stats: Option<TurnStats>,
}

/// One live session: record, process handle, channels, buffers.
struct LiveSession {
    record: Mutex<Session>,
    adapter: Arc<dyn BackendAdapter>,
    child: Mutex<Child>,
    stdin: Mutex<Option<ChildStdin>>,
    reader: Mutex<StreamLineReader<ChildStdout>>,
    stderr_ring: Arc<Mutex<VecDeque<String>>>,
    pid: Option<u32>,
    spawned_at: std::time::Instant,
    cancel: CancellationToken,
    cleaned: AtomicBool,
}

impl LiveSession {
    async fn handle(&self) -> SessionHandle {
        let record = self.record.lock().await;
        SessionHandle {
            session_id: record.id.clone(),
            provider_session_id: record.provider_session_id.clone(),
            status: record.status,
            pid: self.pid,
            started_at: record.started_at,
        }
    }

    /// Write one formatted message to the process stdin.
    async fn send(&self, text: &str) -> Result<()> {
        let framed = self.adapter.format_outbound(text);
        let mut stdin = self.stdin.lock().await;
        let Some(ref mut pipe) = *stdin else {
            return Err(AppError::ChannelClosed(
                "process stdin is no longer writable".to_owned(),
            ));
        };
        pipe.write_all(framed.as_bytes())
            .await
            .map_err(|err| AppError::ChannelClosed(format!("stdin write failed: {err}")))?;
        pipe.write_all(b"\n")
            .await
            .map_err(|err| AppError::ChannelClosed(format!("stdin write failed: {err}")))?;
        pipe.flush()
            .await
            .map_err(|err| AppError::ChannelClosed(format!("stdin flush failed: {err}")))?;
        drop(stdin);

        let mut record = self.record.lock().await;
        record.messages_sent += 1;
        record.last_input = Some(text.to_owned());
        record.touch();
        Ok(())
    }

    /// Most recent stderr lines.
    async fn stderr_tail(&self) -> Vec<String> {
        self.stderr_ring.lock().await.iter().cloned().collect()
    }

    /// Graceful terminate, then force-kill after the grace window.
    async fn terminate(&self, grace: Duration) {
        // Closing stdin first lets line-driven CLIs exit on their own.
        self.stdin.lock().await.take();

        let mut child = self.child.lock().await;
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }

        #[cfg(unix)]
        if let Some(raw) = self.pid.and_then(|pid| i32::try_from(pid).ok()) {
            let target = nix::unistd::Pid::from_raw(raw);
            if let Err(err) = nix::sys::signal::kill(target, nix::sys::signal::Signal::SIGTERM) {
                debug!(pid = raw, %err, "SIGTERM failed; falling back to kill");
            }
        }
        #[cfg(not(unix))]
        {
            let _ = child.start_kill();
        }

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(?status, "agent process exited within grace window");
            }
            Ok(Err(err)) => {
                warn!(%err, "error waiting for agent process");
            }
            Err(_elapsed) => {
                warn!("agent process ignored terminate signal; force-killing");
                if let Err(err) = child.kill().await {
                    warn!(%err, "failed to force-kill agent process");
                }
            }
        }
    }
}

// ── Manager ──────────────────────────────────────────────────────────────────

/// Arena-owned manager for live agent sessions.
///
/// One instance owns the live-session map; collaborators receive it by
/// reference. No session mutates another session's state.
pub struct SessionManager {
    config: Arc<GlobalConfig>,
    registry: Arc<BackendRegistry>,
    supervisor: Arc<TaskSupervisor>,
    input: Arc<InputCorrelator>,
    live: Mutex<HashMap<String, Arc<LiveSession>>>,
}

impl SessionManager {
    /// Build a manager over the given collaborators.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        registry: Arc<BackendRegistry>,
        supervisor: Arc<TaskSupervisor>,
        input: Arc<InputCorrelator>,
    ) -> Self {
        Self {
            config,
            registry,
            supervisor,
            input,
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Start a session for `config.session_id`.
    ///
    /// Idempotent: when a live session already exists for the id, its
    /// current handle is returned instead of an error.
    ///
    /// # Errors
    ///
    /// - [`AppError::Config`] — unknown backend kind.
    /// - [`AppError::Session`] — concurrent-session cap reached or the
    ///   process failed to spawn.
    pub async fn start(&self, config: SessionConfig) -> Result<SessionHandle> {
        let mut live = self.live.lock().await;
        if let Some(existing) = live.get(&config.session_id) {
            debug!(
                session_id = config.session_id.as_str(),
                "start on live session; returning existing handle"
            );
            return Ok(existing.handle().await);
        }
        self.enforce_cap(live.len())?;

        let adapter = self.registry.lookup(&config.backend)?;
        let invocation = adapter.build_invocation(&config);
        let session = self.spawn(&config, adapter, &invocation, None).await?;
        let handle = session.handle().await;
        live.insert(config.session_id.clone(), session);
        info!(
            session_id = config.session_id.as_str(),
            backend = config.backend.as_str(),
            pid = handle.pid,
            "session started"
        );
        Ok(handle)
    }

    /// Resume a prior conversation in a fresh process.
    ///
    /// # Errors
    ///
    /// - [`AppError::Unsupported`] — the backend cannot resume.
    /// - Everything [`start`](Self::start) can return.
    pub async fn resume(
        &self,
        config: SessionConfig,
        provider_session_id: &str,
    ) -> Result<SessionHandle> {
        let mut live = self.live.lock().await;
        if let Some(existing) = live.get(&config.session_id) {
            return Ok(existing.handle().await);
        }
        self.enforce_cap(live.len())?;

        let adapter = self.registry.lookup(&config.backend)?;
        let invocation = adapter
            .resume_invocation(&config, provider_session_id)
            .ok_or_else(|| {
                AppError::Unsupported(format!(
                    "backend {} does not support resume",
                    config.backend
                ))
            })?;
        let session = self
            .spawn(&config, adapter, &invocation, Some(provider_session_id))
            .await?;
        let handle = session.handle().await;
        live.insert(config.session_id.clone(), session);
        info!(
            session_id = config.session_id.as_str(),
            provider_session_id,
            pid = handle.pid,
            "session resumed"
        );
        Ok(handle)
    }

    /// Send one message to a live session's process.
    ///
    /// # Errors
    ///
    /// - [`AppError::Session`] — unknown session id.
    /// - [`AppError::ChannelClosed`] — stdin is no longer writable.
    pub async fn send(&self, session_id: &str, text: &str) -> Result<()> {
        let session = self.get(session_id).await?;
        session.send(text).await
    }

    /// Send `message` (when given) and stream the resulting turn.
    ///
    /// Derived events flow into `events` strictly in the order lines were
    /// read. The first wait uses the init timeout; subsequent waits the
    /// response timeout. Unparseable and oversized output lines are logged
    /// and skipped, never fatal. The sequence is non-restartable: a second
    /// call while one is in flight on the same session fails immediately.
    ///
    /// # Errors
    ///
    /// - [`AppError::Timeout`] — no line within the active window.
    /// - [`AppError::ProcessExit`] — the process died non-zero mid-turn;
    ///   carries exit code, pid, runtime, stderr tail, and last input.
    /// - [`AppError::Session`] — unknown id or a turn already in flight.
    pub async fn stream_turn(
        &self,
        session_id: &str,
        message: Option<&str>,
        events: &mpsc::Sender<SessionEvent>,
    ) -> Result<TurnOutcome> {
        let session = self.get(session_id).await?;
        if let Some(text) = message {
            if !text.is_empty() {
                session.send(text).await?;
            }
        }

        let mut reader = session.reader.try_lock().map_err(|_| {
            AppError::Session(format!("turn already in flight for session {session_id}"))
        })?;

        let mut assembler = SegmentAssembler::new();
        let mut saw_envelope = false;

        loop {
            let window = if saw_envelope {
                self.config.timeouts.response()
            } else {
                self.config.timeouts.init()
            };

            let next = match reader.next_line(window).await {
                Ok(next) => next,
                Err(AppError::Parse(msg)) => {
                    // The codec already dropped the oversized line and
                    // discards to the next terminator; the stream is fine.
                    warn!(session_id, msg = msg.as_str(), "oversized output line, skipping");
                    continue;
                }
                Err(err) => return Err(err),
            };

            match next {
                None => {
                    drop(reader);
                    return self
                        .handle_stream_end(&session, &mut assembler, events)
                        .await;
                }
                Some(line) => {
                    let Some(envelope) = session.adapter.parse_line(&line) else {
                        warn!(
                            session_id,
                            raw_line = line.as_str(),
                            "unparseable output line, skipping"
                        );
                        continue;
                    };
                    saw_envelope = true;
                    let complete = session.adapter.is_turn_complete(&envelope);
                    let stats = self
                        .handle_envelope(&session, &mut assembler, envelope, events)
                        .await;
                    if complete {
                        drop(reader);
                        return Ok(self
                            .finish_turn(&session, &mut assembler, stats, events)
                            .await);
                    }
                }
            }
        }
    }

    /// Stop a session: graceful terminate, force-kill after the grace
    /// window, then exactly-once cleanup.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Session`] for unknown ids.
    pub async fn stop(&self, session_id: &str) -> Result<()> {
        let session = {
            let mut live = self.live.lock().await;
            live.remove(session_id)
                .ok_or_else(|| AppError::Session(format!("unknown session: {session_id}")))?
        };
        session.terminate(self.config.timeouts.stop_grace()).await;
        self.cleanup(&session, SessionStatus::Stopped).await;
        info!(session_id, "session stopped");
        Ok(())
    }

    /// Forking a session is not supported; always a hard failure.
    ///
    /// # Errors
    ///
    /// Always returns [`AppError::Unsupported`].
    pub fn fork(&self, _session_id: &str) -> Result<SessionHandle> {
        Err(AppError::Unsupported("fork is not supported".to_owned()))
    }

    /// Stop every live session (shutdown path).
    pub async fn stop_all(&self) {
        let ids: Vec<String> = {
            let live = self.live.lock().await;
            live.keys().cloned().collect()
        };
        for id in ids {
            if let Err(err) = self.stop(&id).await {
                debug!(session_id = id.as_str(), %err, "stop during shutdown failed");
            }
        }
    }

    /// Current handle for a live session.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Session`] for unknown ids.
    pub async fn handle(&self, session_id: &str) -> Result<SessionHandle> {
        Ok(self.get(session_id).await?.handle().await)
    }

    /// Snapshot of a live session's record.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Session`] for unknown ids.
    pub async fn session(&self, session_id: &str) -> Result<Session> {
        let session = self.get(session_id).await?;
        let record = session.record.lock().await;
        Ok(record.clone())
    }

    /// Number of live sessions.
    pub async fn live_count(&self) -> usize {
        self.live.lock().await.len()
    }

    /// Reap sessions whose process exited outside an in-flight turn.
    ///
    /// Returns the ids of reaped sessions. Each reaped record runs the
    /// same exactly-once cleanup path as explicit stop.
    pub async fn reap_exited(&self) -> Vec<String> {
        let snapshot: Vec<(String, Arc<LiveSession>)> = {
            let live = self.live.lock().await;
            live.iter()
                .map(|(id, session)| (id.clone(), Arc::clone(session)))
                .collect()
        };

        let mut reaped = Vec::new();
        for (id, session) in snapshot {
            let exited = {
                let mut child = session.child.lock().await;
                match child.try_wait() {
                    Ok(Some(status)) => Some(status.success()),
                    Ok(None) => None,
                    Err(err) => {
                        warn!(session_id = id.as_str(), %err, "try_wait failed");
                        None
                    }
                }
            };
            if let Some(success) = exited {
                {
                    let mut live = self.live.lock().await;
                    live.remove(&id);
                }
                let status = if success {
                    SessionStatus::Stopped
                } else {
                    SessionStatus::Crashed
                };
                self.cleanup(&session, status).await;
                info!(session_id = id.as_str(), success, "reaped exited session");
                reaped.push(id);
            }
        }
        reaped
    }

    // ── Private helpers ──────────────────────────────────────────────────────

    fn enforce_cap(&self, live_count: usize) -> Result<()> {
        let cap = usize::try_from(self.config.max_concurrent_sessions).unwrap_or(usize::MAX);
        if live_count >= cap {
            return Err(AppError::Session(format!(
                "concurrent session cap reached ({})",
                self.config.max_concurrent_sessions
            )));
        }
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Arc<LiveSession>> {
        let live = self.live.lock().await;
        live.get(session_id)
            .cloned()
            .ok_or_else(|| AppError::Session(format!("unknown session: {session_id}")))
    }

    /// Spawn the child process and assemble the live-session record.
    async fn spawn(
        &self,
        config: &SessionConfig,
        adapter: Arc<dyn BackendAdapter>,
        invocation: &Invocation,
        provider_session_id: Option<&str>,
    ) -> Result<Arc<LiveSession>> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);

        // Strip inherited environment, then inject only the allowlist and
        // the adapter's own variables.
        cmd.env_clear();
        for &key in ALLOWED_ENV_VARS {
            if let Ok(val) = std::env::var(key) {
                cmd.env(key, val);
            }
        }
        for (key, val) in &invocation.env {
            cmd.env(key, val);
        }

        cmd.current_dir(&config.workspace_root)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|err| {
            AppError::Session(format!(
                "failed to spawn {}: {err}",
                invocation.program
            ))
        })?;
        let pid = child.id();

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Session("failed to capture agent stdin".to_owned()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Session("failed to capture agent stdout".to_owned()))?;
        let child_stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Session("failed to capture agent stderr".to_owned()))?;

        let cancel = CancellationToken::new();
        let ring = Arc::new(Mutex::new(VecDeque::new()));
        let _stderr_task = stderr::spawn_stderr_capture(
            config.session_id.clone(),
            child_stderr,
            Arc::clone(&ring),
            self.config.stderr_ring_lines,
            cancel.clone(),
        );

        let mut record = Session::new(config.session_id.clone(), config.backend.clone());
        record.status = SessionStatus::Running;
        if let Some(id) = provider_session_id {
            record.provider_session_id = Some(id.to_owned());
            record.initialized = true;
        }

        Ok(Arc::new(LiveSession {
            record: Mutex::new(record),
            adapter,
            child: Mutex::new(child),
            stdin: Mutex::new(Some(stdin)),
            reader: Mutex::new(StreamLineReader::new(stdout)),
            stderr_ring: ring,
            pid,
            spawned_at: std::time::Instant::now(),
            cancel,
            cleaned: AtomicBool::new(false),
        }))
    }

    /// Process one parsed envelope; returns turn stats when it carried them.
    async fn handle_envelope(
        &self,
        session: &Arc<LiveSession>,
        assembler: &mut SegmentAssembler,
        envelope: CanonicalEnvelope,
        events: &mpsc::Sender<SessionEvent>,
    ) -> Option<TurnStats> {
        let session_id = {
            let record = session.record.lock().await;
            record.id.clone()
        };

        match envelope {
            CanonicalEnvelope::Init {
                provider_session_id,
                model,
            } => {
                {
                    let mut record = session.record.lock().await;
                    if record.provider_session_id.is_none() {
                        record.provider_session_id = provider_session_id.clone();
                    }
                    record.initialized = true;
                    record.touch();
                }
                emit(
                    events,
                    SessionEvent::SessionInit {
                        session_id,
                        provider_session_id,
                        model,
                    },
                )
                .await;
                None
            }
            CanonicalEnvelope::Assistant { blocks } => {
                {
                    let mut record = session.record.lock().await;
                    record.responses_received += 1;
                    record.touch();
                }
                for block in blocks {
                    self.handle_block(session, &session_id, assembler, block, events)
                        .await;
                }
                None
            }
            CanonicalEnvelope::ToolProgress {
                invocation_id,
                parent_invocation_id,
                message,
            } => {
                self.supervisor.progress(&invocation_id).await;
                let parent = assembler.effective_parent(parent_invocation_id.as_deref());
                emit(
                    events,
                    SessionEvent::ToolProgress {
                        session_id,
                        segment_id: assembler.current_segment_id().to_owned(),
                        invocation_id,
                        parent_invocation_id: parent,
                        message,
                    },
                )
                .await;
                None
            }
            CanonicalEnvelope::ToolResults { results } => {
                for outcome in results {
                    assembler.pop_task(&outcome.invocation_id);
                    self.supervisor
                        .complete(&outcome.invocation_id, outcome.is_error)
                        .await;
                    emit(
                        events,
                        SessionEvent::ToolCompleted {
                            session_id: session_id.clone(),
                            segment_id: assembler.current_segment_id().to_owned(),
                            invocation_id: outcome.invocation_id,
                            is_error: outcome.is_error,
                            content: outcome.content,
                        },
                    )
                    .await;
                }
                None
            }
            CanonicalEnvelope::TurnResult(stats) => Some(stats),
            CanonicalEnvelope::System { subtype, .. } => {
                debug!(session_id, subtype, "system envelope");
                None
            }
        }
    }

    /// Process one assistant output block.
    async fn handle_block(
        &self,
        session: &Arc<LiveSession>,
        session_id: &str,
        assembler: &mut SegmentAssembler,
        block: OutputBlock,
        events: &mpsc::Sender<SessionEvent>,
    ) {
        match block {
            OutputBlock::Text(text) => {
                for op in assembler.push_content(&text) {
                    emit(events, op_to_event(session_id, op)).await;
                }
            }
            OutputBlock::Thinking(text) => {
                emit(
                    events,
                    SessionEvent::Thinking {
                        session_id: session_id.to_owned(),
                        segment_id: assembler.current_segment_id().to_owned(),
                        text,
                    },
                )
                .await;
            }
            OutputBlock::ToolUse(mut invocation) => {
                assembler.mark_tool_boundary();
                invocation.parent_invocation_id =
                    assembler.effective_parent(invocation.parent_invocation_id.as_deref());

                if let Some(task_type) = session.adapter.delegated_task_type(&invocation) {
                    let decision = self
                        .supervisor
                        .begin(session_id, &invocation.invocation_id, &task_type)
                        .await;
                    match decision {
                        TaskDecision::Blocked { reason } => {
                            emit(
                                events,
                                SessionEvent::TaskBlocked {
                                    session_id: session_id.to_owned(),
                                    segment_id: assembler.current_segment_id().to_owned(),
                                    task_type,
                                    invocation_id: invocation.invocation_id,
                                    reason,
                                },
                            )
                            .await;
                            return;
                        }
                        TaskDecision::Allowed => {
                            assembler.push_task(&invocation.invocation_id);
                        }
                    }
                }

                emit(
                    events,
                    SessionEvent::ToolStarted {
                        session_id: session_id.to_owned(),
                        segment_id: assembler.current_segment_id().to_owned(),
                        invocation,
                    },
                )
                .await;
            }
        }
    }

    /// Handle the reader returning the end sentinel mid-turn.
    async fn handle_stream_end(
        &self,
        session: &Arc<LiveSession>,
        assembler: &mut SegmentAssembler,
        events: &mpsc::Sender<SessionEvent>,
    ) -> Result<TurnOutcome> {
        let (session_id, last_input) = {
            let record = session.record.lock().await;
            (record.id.clone(), record.last_input.clone())
        };

        let status = {
            let mut child = session.child.lock().await;
            match tokio::time::timeout(self.config.timeouts.stop_grace(), child.wait()).await {
                Ok(Ok(status)) => Some(status),
                Ok(Err(err)) => {
                    warn!(session_id = session_id.as_str(), %err, "wait after EOF failed");
                    None
                }
                Err(_elapsed) => {
                    warn!(
                        session_id = session_id.as_str(),
                        "process kept stdout closed but did not exit; killing"
                    );
                    let _ = child.kill().await;
                    None
                }
            }
        };

        let success = status.as_ref().is_some_and(std::process::ExitStatus::success);
        // Snapshot before cleanup cancels the stderr capture task.
        let stderr_tail = session.stderr_tail().await;
        {
            let mut live = self.live.lock().await;
            live.remove(&session_id);
        }
        let final_status = if success {
            SessionStatus::Stopped
        } else {
            SessionStatus::Crashed
        };
        self.cleanup(session, final_status).await;

        if success {
            // One-shot backends end the turn by exiting; a long-lived
            // backend exiting zero mid-turn still ends it, just noisily.
            if !session.adapter.one_shot() {
                warn!(
                    session_id = session_id.as_str(),
                    "long-lived agent process exited cleanly mid-turn"
                );
            }
            return Ok(self.finish_turn(session, assembler, None, events).await);
        }

        let runtime_ms =
            u64::try_from(session.spawned_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        Err(AppError::ProcessExit {
            exit_code: status.and_then(|s| s.code()),
            pid: session.pid,
            runtime_ms,
            stderr_tail,
            last_input,
        })
    }

    /// Flush the assembler and emit the closing events.
    async fn finish_turn(
        &self,
        session: &Arc<LiveSession>,
        assembler: &mut SegmentAssembler,
        stats: Option<TurnStats>,
        events: &mpsc::Sender<SessionEvent>,
    ) -> TurnOutcome {
        let session_id = {
            let record = session.record.lock().await;
            record.id.clone()
        };
        for op in assembler.finish() {
            emit(events, op_to_event(&session_id, op)).await;
        }
        emit(
            events,
            SessionEvent::TurnCompleted {
                session_id,
                stats: stats.clone(),
            },
        )
        .await;
        TurnOutcome { stats }
    }

    /// Exactly-once per-record cleanup, shared by every exit path
    /// (explicit stop, stream-observed exit, reaper).
    async fn cleanup(&self, session: &Arc<LiveSession>, status: SessionStatus) {
        if session.cleaned.swap(true, Ordering::SeqCst) {
            return;
        }
        session.cancel.cancel();

        let session_id = {
            let mut record = session.record.lock().await;
            if record.can_transition_to(status) {
                record.status = status;
            }
            record.touch();
            record.id.clone()
        };

        self.supervisor.end_session(&session_id).await;
        if self
            .input
            .cancel_request(&session_id, Some("session ended".to_owned()))
            .await
        {
            debug!(
                session_id = session_id.as_str(),
                "cancelled pending input request on session end"
            );
        }
    }
}

// ── Free helpers ─────────────────────────────────────────────────────────────

/// Convert an assembler op to a session event.
fn op_to_event(session_id: &str, op: SegmentOp) -> SessionEvent {
    match op {
        SegmentOp::Delta { segment_id, text } => SessionEvent::SegmentDelta {
            session_id: session_id.to_owned(),
            segment_id,
            text,
        },
        SegmentOp::Final { segment, text } => SessionEvent::SegmentFinal {
            session_id: session_id.to_owned(),
            segment,
            text,
        },
    }
}

/// Forward one event, tolerating a dropped consumer.
async fn emit(events: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    if events.send(event).await.is_err() {
        debug!("event receiver dropped; discarding event");
    }
}
