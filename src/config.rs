//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Configurable timeout values (seconds) for stream and input waits.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Wait for the first parsed envelope of a turn.
    #[serde(default = "default_init_seconds")]
    pub init_seconds: u64,
    /// Wait between subsequent envelopes of a turn.
    #[serde(default = "default_response_seconds")]
    pub response_seconds: u64,
    /// Idle window for the delegated-task watchdog.
    #[serde(default = "default_idle_seconds")]
    pub idle_seconds: u64,
    /// Grace period between the terminate signal and a force-kill.
    #[serde(default = "default_stop_grace_seconds")]
    pub stop_grace_seconds: u64,
    /// Human-input request timeout; 0 means no timeout.
    #[serde(default)]
    pub input_seconds: u64,
}

fn default_init_seconds() -> u64 {
    30
}

fn default_response_seconds() -> u64 {
    120
}

fn default_idle_seconds() -> u64 {
    60
}

fn default_stop_grace_seconds() -> u64 {
    5
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            init_seconds: default_init_seconds(),
            response_seconds: default_response_seconds(),
            idle_seconds: default_idle_seconds(),
            stop_grace_seconds: default_stop_grace_seconds(),
            input_seconds: 0,
        }
    }
}

impl TimeoutConfig {
    /// First-envelope wait as a [`Duration`].
    #[must_use]
    pub fn init(&self) -> Duration {
        Duration::from_secs(self.init_seconds)
    }

    /// Between-envelope wait as a [`Duration`].
    #[must_use]
    pub fn response(&self) -> Duration {
        Duration::from_secs(self.response_seconds)
    }

    /// Idle-watchdog window as a [`Duration`].
    #[must_use]
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_seconds)
    }

    /// Stop grace period as a [`Duration`].
    #[must_use]
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_seconds)
    }

    /// Human-input timeout, `None` when disabled.
    #[must_use]
    pub fn input(&self) -> Option<Duration> {
        (self.input_seconds > 0).then(|| Duration::from_secs(self.input_seconds))
    }
}

/// Circuit-breaker thresholds for delegated-task invocations.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BreakerConfig {
    /// Consecutive failures of one task type before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds the circuit stays open before a retry is allowed.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown_seconds() -> u64 {
    30
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

impl BreakerConfig {
    /// Open-circuit cooldown as a [`Duration`].
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

/// Outbound retry-queue sizing and expiry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    /// Maximum queued messages before eviction/rejection kicks in.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
    /// Seconds a queued message stays deliverable.
    #[serde(default = "default_queue_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Delivery attempts before a message is terminally failed.
    #[serde(default = "default_queue_max_retries")]
    pub max_retries: u32,
    /// Interval between TTL sweep passes.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_queue_capacity() -> usize {
    256
}

fn default_queue_ttl_seconds() -> u64 {
    900
}

fn default_queue_max_retries() -> u32 {
    3
}

fn default_sweep_interval_seconds() -> u64 {
    60
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            ttl_seconds: default_queue_ttl_seconds(),
            max_retries: default_queue_max_retries(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

impl QueueConfig {
    /// Message time-to-live as a [`Duration`].
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Sweep-pass interval as a [`Duration`].
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

fn default_backend() -> String {
    "claude".into()
}

fn default_max_concurrent_sessions() -> u32 {
    3
}

fn default_stderr_ring_lines() -> usize {
    50
}

fn default_metrics_capacity() -> usize {
    64
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Backend-kind label resolved through the adapter registry.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Workspace root the agent processes start in.
    pub workspace_root: PathBuf,
    /// Optional override for the adapter's default program path.
    #[serde(default)]
    pub program: Option<String>,
    /// Extra arguments appended to the adapter's invocation.
    #[serde(default)]
    pub program_args: Vec<String>,
    /// Maximum concurrent agent sessions.
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: u32,
    /// Lines retained in the per-session stderr ring buffer.
    #[serde(default = "default_stderr_ring_lines")]
    pub stderr_ring_lines: usize,
    /// Capacity of the delegated-task metric map.
    #[serde(default = "default_metrics_capacity")]
    pub metrics_capacity: usize,
    /// Stream and input timeout settings.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Circuit-breaker settings for delegated tasks.
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// Outbound retry-queue settings.
    #[serde(default)]
    pub queue: QueueConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Absolute path to the configured workspace root.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    fn validate(&mut self) -> Result<()> {
        if self.backend.trim().is_empty() {
            return Err(AppError::Config("backend must not be empty".into()));
        }

        if self.max_concurrent_sessions == 0 {
            return Err(AppError::Config(
                "max_concurrent_sessions must be greater than zero".into(),
            ));
        }

        if self.timeouts.response_seconds < self.timeouts.init_seconds {
            return Err(AppError::Config(
                "timeouts.response_seconds must not be shorter than timeouts.init_seconds".into(),
            ));
        }

        if self.queue.capacity == 0 {
            return Err(AppError::Config(
                "queue.capacity must be greater than zero".into(),
            ));
        }

        if self.breaker.failure_threshold == 0 {
            return Err(AppError::Config(
                "breaker.failure_threshold must be greater than zero".into(),
            ));
        }

        let canonical_root = self
            .workspace_root
            .canonicalize()
            .map_err(|err| AppError::Config(format!("workspace_root invalid: {err}")))?;
        self.workspace_root = canonical_root;

        Ok(())
    }
}
