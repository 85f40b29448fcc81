//! Backend adapter contract and registry.
//!
//! One [`BackendAdapter`] implementation exists per supported agent CLI.
//! Adapters own everything backend-specific — invocation arguments,
//! environment, stdin framing, output parsing, completion signaling — so
//! the session manager never special-cases a backend kind.

pub mod claude;
pub mod envelope;
pub mod plain;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::{AppError, Result};

pub use envelope::{CanonicalEnvelope, OutputBlock, ToolInvocation, ToolOutcome, TurnStats};

// ── Session configuration ────────────────────────────────────────────────────

/// Per-session configuration handed to `start`/`resume`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Opaque, externally assigned session identifier.
    pub session_id: String,
    /// Backend-kind label resolved through the registry.
    pub backend: String,
    /// Directory the agent process starts in.
    pub workspace_root: PathBuf,
    /// Override for the adapter's default program path.
    pub program: Option<String>,
    /// Extra arguments appended after the adapter's own.
    pub extra_args: Vec<String>,
    /// Extra environment pairs injected into the child.
    pub extra_env: Vec<(String, String)>,
    /// Model hint forwarded to backends that accept one.
    pub model: Option<String>,
}

/// Fully resolved child-process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program path or name.
    pub program: String,
    /// Argument list.
    pub args: Vec<String>,
    /// Backend-specific environment pairs.
    pub env: Vec<(String, String)>,
}

// ── Adapter contract ─────────────────────────────────────────────────────────

/// Strategy describing how to drive one kind of agent CLI.
///
/// Optional capabilities are expressed through `Option` return values
/// ([`resume_invocation`](Self::resume_invocation),
/// [`delegated_task_type`](Self::delegated_task_type)) so callers must
/// check presence instead of assuming a method exists.
pub trait BackendAdapter: Send + Sync {
    /// Registry label for this adapter.
    fn kind(&self) -> &'static str;

    /// Build the invocation for a fresh session.
    fn build_invocation(&self, config: &SessionConfig) -> Invocation;

    /// Build the invocation reattaching to a prior conversation.
    ///
    /// `None` means the backend cannot resume; the manager fails the call
    /// with [`AppError::Unsupported`].
    fn resume_invocation(
        &self,
        config: &SessionConfig,
        provider_session_id: &str,
    ) -> Option<Invocation>;

    /// Frame one user message for the child's stdin (without the trailing
    /// newline; the manager appends it).
    fn format_outbound(&self, text: &str) -> String;

    /// Parse one raw output line into a canonical envelope.
    ///
    /// `None` means the line is unparseable or irrelevant; the caller logs
    /// and skips it. Parsing is never fatal.
    fn parse_line(&self, raw: &str) -> Option<CanonicalEnvelope>;

    /// Whether `envelope` signals the end of the current turn.
    fn is_turn_complete(&self, envelope: &CanonicalEnvelope) -> bool;

    /// If `invocation` is a delegated-task ("sub-agent") tool, its
    /// task-type label; `None` for everything else and for backends
    /// without delegation.
    fn delegated_task_type(&self, invocation: &ToolInvocation) -> Option<String>;

    /// Whether the CLI answers one prompt and exits.
    ///
    /// For one-shot backends the manager treats clean EOF as turn
    /// completion rather than an unexpected exit.
    fn one_shot(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for dyn BackendAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendAdapter")
            .field("kind", &self.kind())
            .finish()
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Mapping from backend-kind label to adapter implementation.
///
/// Looked up once at session-start time; an unknown label is a
/// configuration failure, never a runtime surprise.
pub struct BackendRegistry {
    adapters: HashMap<&'static str, Arc<dyn BackendAdapter>>,
}

impl BackendRegistry {
    /// Empty registry with no adapters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in `claude` and `plain`
    /// adapters.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(claude::ClaudeAdapter));
        registry.register(Arc::new(plain::PlainAdapter));
        registry
    }

    /// Register an adapter under its own [`BackendAdapter::kind`] label.
    pub fn register(&mut self, adapter: Arc<dyn BackendAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    /// Resolve a backend-kind label.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] for unknown labels.
    pub fn lookup(&self, kind: &str) -> Result<Arc<dyn BackendAdapter>> {
        self.adapters
            .get(kind)
            .cloned()
            .ok_or_else(|| AppError::Config(format!("unknown backend kind: {kind}")))
    }

    /// Registered backend-kind labels.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.adapters.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
