//! Canonical message envelope — the adapter's normalized output unit.
//!
//! Each raw output line an adapter recognizes becomes exactly one
//! [`CanonicalEnvelope`]. Envelopes are transient: produced per line,
//! consumed immediately by the segmentation pipeline, never persisted.

use serde::{Deserialize, Serialize};

/// One tool invocation observed on the stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ToolInvocation {
    /// Backend-assigned invocation identifier.
    pub invocation_id: String,
    /// Tool name as reported by the backend.
    pub name: String,
    /// Tool input parameters.
    pub input: serde_json::Value,
    /// Explicit parent invocation, when the backend reports nesting.
    pub parent_invocation_id: Option<String>,
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ToolOutcome {
    /// Invocation the outcome belongs to.
    pub invocation_id: String,
    /// Whether the tool reported an error.
    pub is_error: bool,
    /// Result content, flattened to text when present.
    pub content: Option<String>,
}

/// Provider-reported statistics for a completed turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct TurnStats {
    /// Total turn duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// Conversation turns consumed.
    pub num_turns: Option<u32>,
    /// Total cost in USD, when the provider reports one.
    pub total_cost_usd: Option<f64>,
    /// Whether the provider flagged the turn as failed.
    pub is_error: bool,
    /// Final result text.
    pub result: Option<String>,
}

/// One block of assistant output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum OutputBlock {
    /// Visible content delta.
    Text(String),
    /// Extended-thinking delta, surfaced but never segmented.
    Thinking(String),
    /// Tool invocation start.
    ToolUse(ToolInvocation),
}

/// Discriminated, backend-agnostic representation of one output line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalEnvelope {
    /// Backend announced itself; carries the upstream conversation id.
    Init {
        /// Upstream conversation identifier, when reported.
        provider_session_id: Option<String>,
        /// Model identifier, when reported.
        model: Option<String>,
    },
    /// Assistant output: content, thinking, and tool-use blocks in order.
    Assistant {
        /// Ordered output blocks.
        blocks: Vec<OutputBlock>,
    },
    /// Progress report from a running tool invocation.
    ToolProgress {
        /// Invocation the progress belongs to.
        invocation_id: String,
        /// Explicit parent invocation, when reported.
        parent_invocation_id: Option<String>,
        /// Human-readable progress message.
        message: String,
    },
    /// One or more tool invocations finished.
    ToolResults {
        /// Outcomes in stream order.
        results: Vec<ToolOutcome>,
    },
    /// The turn completed; carries provider statistics.
    TurnResult(TurnStats),
    /// Backend-specific system message, passed through for logging.
    System {
        /// Backend-defined subtype.
        subtype: String,
        /// Raw payload.
        payload: serde_json::Value,
    },
}
