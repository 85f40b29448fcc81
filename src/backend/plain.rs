//! Plain-text adapter — newline-delimited output, one prompt per launch.
//!
//! Wraps any CLI that reads a prompt from stdin and writes plain text to
//! stdout: every output line is a content delta, there is no completion
//! message, and the process exiting cleanly ends the turn (one-shot).
//! No resume, no thinking, no tool events.

use super::envelope::{CanonicalEnvelope, OutputBlock, ToolInvocation};
use super::{BackendAdapter, Invocation, SessionConfig};

/// Default program name when no override is configured.
const DEFAULT_PROGRAM: &str = "cat";

/// Adapter for newline-delimited plain-text CLIs.
pub struct PlainAdapter;

impl BackendAdapter for PlainAdapter {
    fn kind(&self) -> &'static str {
        "plain"
    }

    fn build_invocation(&self, config: &SessionConfig) -> Invocation {
        Invocation {
            program: config
                .program
                .clone()
                .unwrap_or_else(|| DEFAULT_PROGRAM.to_owned()),
            args: config.extra_args.clone(),
            env: config.extra_env.clone(),
        }
    }

    fn resume_invocation(
        &self,
        _config: &SessionConfig,
        _provider_session_id: &str,
    ) -> Option<Invocation> {
        None
    }

    fn format_outbound(&self, text: &str) -> String {
        text.to_owned()
    }

    fn parse_line(&self, raw: &str) -> Option<CanonicalEnvelope> {
        // Every line is a content delta; the newline is part of the
        // content so the cumulative buffer preserves line structure.
        Some(CanonicalEnvelope::Assistant {
            blocks: vec![OutputBlock::Text(format!("{raw}\n"))],
        })
    }

    fn is_turn_complete(&self, _envelope: &CanonicalEnvelope) -> bool {
        false
    }

    fn delegated_task_type(&self, _invocation: &ToolInvocation) -> Option<String> {
        None
    }

    fn one_shot(&self) -> bool {
        true
    }
}
