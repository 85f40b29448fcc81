//! Claude Code CLI adapter — structured streaming-JSON framing.
//!
//! Drives `claude --print --output-format stream-json --input-format
//! stream-json --verbose`: one JSON object per line in both directions,
//! a long-lived process, and a `result` message signaling turn
//! completion. The `Task` tool is the delegated-task tool; its
//! `subagent_type` input field is the task-type label, and
//! `parent_tool_use_id` supplies explicit nesting.

use serde::Deserialize;
use serde_json::json;

use super::envelope::{
    CanonicalEnvelope, OutputBlock, ToolInvocation, ToolOutcome, TurnStats,
};
use super::{BackendAdapter, Invocation, SessionConfig};

/// Default program name when no override is configured.
const DEFAULT_PROGRAM: &str = "claude";

/// Tool name that spawns a sub-agent.
const TASK_TOOL: &str = "Task";

// ── Wire format ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireMessage {
    System {
        subtype: String,
        #[serde(flatten)]
        data: serde_json::Value,
    },
    Assistant {
        message: WireAssistant,
        #[serde(default)]
        parent_tool_use_id: Option<String>,
    },
    User {
        message: WireUser,
        #[serde(default)]
        parent_tool_use_id: Option<String>,
    },
    Result {
        #[serde(default)]
        duration_ms: Option<u64>,
        #[serde(default)]
        num_turns: Option<u32>,
        #[serde(default)]
        total_cost_usd: Option<f64>,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        result: Option<String>,
    },
    ToolProgress {
        tool_use_id: String,
        #[serde(default)]
        parent_tool_use_id: Option<String>,
        message: String,
    },
    StreamEvent {
        #[serde(flatten)]
        _data: serde_json::Value,
    },
}

#[derive(Debug, Deserialize)]
struct WireAssistant {
    content: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    #[serde(default)]
    content: Vec<serde_json::Value>,
}

// ── Adapter ──────────────────────────────────────────────────────────────────

/// Adapter for the Claude Code CLI.
pub struct ClaudeAdapter;

impl ClaudeAdapter {
    fn base_invocation(config: &SessionConfig) -> Invocation {
        let program = config
            .program
            .clone()
            .unwrap_or_else(|| DEFAULT_PROGRAM.to_owned());

        let mut args = vec![
            "--print".to_owned(),
            "--output-format".to_owned(),
            "stream-json".to_owned(),
            "--input-format".to_owned(),
            "stream-json".to_owned(),
            "--verbose".to_owned(),
        ];
        if let Some(ref model) = config.model {
            args.push("--model".to_owned());
            args.push(model.clone());
        }

        Invocation {
            program,
            args,
            env: Vec::new(),
        }
    }

    fn convert_assistant(
        blocks: Vec<serde_json::Value>,
        parent: Option<&str>,
    ) -> CanonicalEnvelope {
        let blocks = blocks
            .into_iter()
            .filter_map(|block| convert_block(&block, parent))
            .collect();
        CanonicalEnvelope::Assistant { blocks }
    }

    fn convert_user(blocks: &[serde_json::Value]) -> Option<CanonicalEnvelope> {
        let results: Vec<ToolOutcome> = blocks
            .iter()
            .filter_map(convert_tool_result)
            .collect();
        if results.is_empty() {
            // User echoes without tool results carry nothing for the stream.
            None
        } else {
            Some(CanonicalEnvelope::ToolResults { results })
        }
    }
}

impl BackendAdapter for ClaudeAdapter {
    fn kind(&self) -> &'static str {
        "claude"
    }

    fn build_invocation(&self, config: &SessionConfig) -> Invocation {
        let mut invocation = Self::base_invocation(config);
        invocation.args.extend(config.extra_args.iter().cloned());
        invocation.env.extend(config.extra_env.iter().cloned());
        invocation
    }

    fn resume_invocation(
        &self,
        config: &SessionConfig,
        provider_session_id: &str,
    ) -> Option<Invocation> {
        let mut invocation = self.build_invocation(config);
        invocation.args.push("--resume".to_owned());
        invocation.args.push(provider_session_id.to_owned());
        Some(invocation)
    }

    fn format_outbound(&self, text: &str) -> String {
        json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": [{ "type": "text", "text": text }],
            },
        })
        .to_string()
    }

    fn parse_line(&self, raw: &str) -> Option<CanonicalEnvelope> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let message: WireMessage = serde_json::from_str(trimmed).ok()?;
        match message {
            WireMessage::System { subtype, data } => {
                if subtype == "init" {
                    Some(CanonicalEnvelope::Init {
                        provider_session_id: string_field(&data, "session_id"),
                        model: string_field(&data, "model"),
                    })
                } else {
                    Some(CanonicalEnvelope::System {
                        subtype,
                        payload: data,
                    })
                }
            }
            WireMessage::Assistant {
                message,
                parent_tool_use_id,
            } => Some(Self::convert_assistant(
                message.content,
                parent_tool_use_id.as_deref(),
            )),
            WireMessage::User { message, .. } => Self::convert_user(&message.content),
            WireMessage::Result {
                duration_ms,
                num_turns,
                total_cost_usd,
                is_error,
                result,
            } => Some(CanonicalEnvelope::TurnResult(TurnStats {
                duration_ms,
                num_turns,
                total_cost_usd,
                is_error,
                result,
            })),
            WireMessage::ToolProgress {
                tool_use_id,
                parent_tool_use_id,
                message,
            } => Some(CanonicalEnvelope::ToolProgress {
                invocation_id: tool_use_id,
                parent_invocation_id: parent_tool_use_id,
                message,
            }),
            WireMessage::StreamEvent { .. } => None,
        }
    }

    fn is_turn_complete(&self, envelope: &CanonicalEnvelope) -> bool {
        matches!(envelope, CanonicalEnvelope::TurnResult(_))
    }

    fn delegated_task_type(&self, invocation: &ToolInvocation) -> Option<String> {
        if invocation.name != TASK_TOOL {
            return None;
        }
        Some(
            string_field(&invocation.input, "subagent_type")
                .unwrap_or_else(|| "general-purpose".to_owned()),
        )
    }
}

// ── Block conversion ─────────────────────────────────────────────────────────

/// Convert one assistant content block, skipping unrecognized types.
fn convert_block(block: &serde_json::Value, parent: Option<&str>) -> Option<OutputBlock> {
    match block.get("type").and_then(serde_json::Value::as_str)? {
        "text" => Some(OutputBlock::Text(
            string_field(block, "text").unwrap_or_default(),
        )),
        "thinking" => Some(OutputBlock::Thinking(
            string_field(block, "thinking").unwrap_or_default(),
        )),
        "tool_use" => Some(OutputBlock::ToolUse(ToolInvocation {
            invocation_id: string_field(block, "id")?,
            name: string_field(block, "name")?,
            input: block.get("input").cloned().unwrap_or(serde_json::Value::Null),
            parent_invocation_id: parent.map(ToOwned::to_owned),
        })),
        _ => None,
    }
}

/// Convert one `tool_result` block from a user message.
fn convert_tool_result(block: &serde_json::Value) -> Option<ToolOutcome> {
    if block.get("type").and_then(serde_json::Value::as_str) != Some("tool_result") {
        return None;
    }
    Some(ToolOutcome {
        invocation_id: string_field(block, "tool_use_id")?,
        is_error: block
            .get("is_error")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false),
        content: flatten_content(block.get("content")),
    })
}

/// Flatten a tool-result content value (string or text-block list) to text.
fn flatten_content(content: Option<&serde_json::Value>) -> Option<String> {
    match content? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(blocks) => {
            let joined: Vec<String> = blocks
                .iter()
                .filter_map(|b| string_field(b, "text"))
                .collect();
            (!joined.is_empty()).then(|| joined.join("\n"))
        }
        _ => None,
    }
}

fn string_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
}
