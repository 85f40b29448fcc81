#![forbid(unsafe_code)]

//! `agent-relay` — process-session orchestration for CLI coding agents.
//!
//! Mediates between a coordinating service and long-lived agent CLI
//! processes: spawns/resumes/stops them, turns their line-oriented output
//! into a typed event stream, reconstructs message segments across tool
//! invocations, supervises delegated sub-tasks, correlates blocking
//! human-input requests, and queues outbound messages while a destination
//! process is unreachable.

pub mod backend;
pub mod config;
pub mod errors;
pub mod events;
pub mod input;
pub mod models;
pub mod outbox;
pub mod pipeline;
pub mod resilience;
pub mod session;
pub mod stream;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
