//! Unit tests for the Claude CLI adapter.

use agent_relay::backend::{
    BackendAdapter, CanonicalEnvelope, OutputBlock, SessionConfig, ToolInvocation,
};
use serde_json::json;

fn adapter() -> &'static dyn BackendAdapter {
    static ADAPTER: agent_relay::backend::claude::ClaudeAdapter =
        agent_relay::backend::claude::ClaudeAdapter;
    &ADAPTER
}

fn config() -> SessionConfig {
    SessionConfig {
        session_id: "s1".into(),
        backend: "claude".into(),
        workspace_root: "/tmp".into(),
        program: None,
        extra_args: Vec::new(),
        extra_env: Vec::new(),
        model: None,
    }
}

// ── Invocation building ──────────────────────────────────────

#[test]
fn build_invocation_uses_stream_json_flags() {
    let invocation = adapter().build_invocation(&config());
    assert_eq!(invocation.program, "claude");
    assert_eq!(
        invocation.args,
        vec![
            "--print",
            "--output-format",
            "stream-json",
            "--input-format",
            "stream-json",
            "--verbose",
        ]
    );
}

#[test]
fn program_override_and_extra_args_apply() {
    let mut cfg = config();
    cfg.program = Some("/opt/bin/claude-dev".into());
    cfg.extra_args = vec!["--dangerously-skip-permissions".into()];
    cfg.model = Some("opus".into());

    let invocation = adapter().build_invocation(&cfg);
    assert_eq!(invocation.program, "/opt/bin/claude-dev");
    assert!(invocation.args.contains(&"--model".to_owned()));
    assert!(invocation.args.contains(&"opus".to_owned()));
    assert_eq!(
        invocation.args.last().map(String::as_str),
        Some("--dangerously-skip-permissions")
    );
}

#[test]
fn resume_invocation_appends_resume_flag() {
    let invocation = adapter()
        .resume_invocation(&config(), "prov-123")
        .expect("claude can resume");
    let tail: Vec<_> = invocation.args.iter().rev().take(2).rev().collect();
    assert_eq!(tail, ["--resume", "prov-123"]);
}

// ── Outbound framing ─────────────────────────────────────────

#[test]
fn format_outbound_frames_user_message() {
    let framed = adapter().format_outbound("hello there");
    let value: serde_json::Value = serde_json::from_str(&framed).expect("valid json");
    assert_eq!(value["type"], "user");
    assert_eq!(value["message"]["role"], "user");
    assert_eq!(value["message"]["content"][0]["text"], "hello there");
}

// ── Line parsing ─────────────────────────────────────────────

#[test]
fn init_system_line_becomes_init_envelope() {
    let line = json!({
        "type": "system",
        "subtype": "init",
        "session_id": "prov-9",
        "model": "claude-sonnet",
    })
    .to_string();

    match adapter().parse_line(&line).expect("parsed") {
        CanonicalEnvelope::Init {
            provider_session_id,
            model,
        } => {
            assert_eq!(provider_session_id.as_deref(), Some("prov-9"));
            assert_eq!(model.as_deref(), Some("claude-sonnet"));
        }
        other => panic!("expected init, got {other:?}"),
    }
}

#[test]
fn other_system_subtypes_pass_through() {
    let line = json!({ "type": "system", "subtype": "compact", "detail": 1 }).to_string();
    match adapter().parse_line(&line).expect("parsed") {
        CanonicalEnvelope::System { subtype, .. } => assert_eq!(subtype, "compact"),
        other => panic!("expected system, got {other:?}"),
    }
}

#[test]
fn assistant_line_converts_blocks_in_order() {
    let line = json!({
        "type": "assistant",
        "message": { "content": [
            { "type": "thinking", "thinking": "hmm" },
            { "type": "text", "text": "Answer: " },
            { "type": "tool_use", "id": "tool-1", "name": "Read", "input": { "path": "a.rs" } },
        ]},
    })
    .to_string();

    match adapter().parse_line(&line).expect("parsed") {
        CanonicalEnvelope::Assistant { blocks } => {
            assert_eq!(blocks.len(), 3);
            assert!(matches!(&blocks[0], OutputBlock::Thinking(t) if t == "hmm"));
            assert!(matches!(&blocks[1], OutputBlock::Text(t) if t == "Answer: "));
            match &blocks[2] {
                OutputBlock::ToolUse(invocation) => {
                    assert_eq!(invocation.invocation_id, "tool-1");
                    assert_eq!(invocation.name, "Read");
                    assert_eq!(invocation.input["path"], "a.rs");
                    assert!(invocation.parent_invocation_id.is_none());
                }
                other => panic!("expected tool use, got {other:?}"),
            }
        }
        other => panic!("expected assistant, got {other:?}"),
    }
}

#[test]
fn assistant_parent_tool_use_id_propagates_to_blocks() {
    let line = json!({
        "type": "assistant",
        "parent_tool_use_id": "task-1",
        "message": { "content": [
            { "type": "tool_use", "id": "tool-2", "name": "Bash", "input": {} },
        ]},
    })
    .to_string();

    match adapter().parse_line(&line).expect("parsed") {
        CanonicalEnvelope::Assistant { blocks } => match &blocks[0] {
            OutputBlock::ToolUse(invocation) => {
                assert_eq!(invocation.parent_invocation_id.as_deref(), Some("task-1"));
            }
            other => panic!("expected tool use, got {other:?}"),
        },
        other => panic!("expected assistant, got {other:?}"),
    }
}

#[test]
fn unknown_block_types_are_skipped() {
    let line = json!({
        "type": "assistant",
        "message": { "content": [
            { "type": "image", "source": "..." },
            { "type": "text", "text": "kept" },
        ]},
    })
    .to_string();

    match adapter().parse_line(&line).expect("parsed") {
        CanonicalEnvelope::Assistant { blocks } => assert_eq!(blocks.len(), 1),
        other => panic!("expected assistant, got {other:?}"),
    }
}

#[test]
fn user_tool_results_become_tool_results_envelope() {
    let line = json!({
        "type": "user",
        "message": { "content": [
            { "type": "tool_result", "tool_use_id": "tool-1", "content": "file contents" },
            { "type": "tool_result", "tool_use_id": "tool-2", "is_error": true,
              "content": [ { "type": "text", "text": "boom" } ] },
        ]},
    })
    .to_string();

    match adapter().parse_line(&line).expect("parsed") {
        CanonicalEnvelope::ToolResults { results } => {
            assert_eq!(results.len(), 2);
            assert_eq!(results[0].invocation_id, "tool-1");
            assert!(!results[0].is_error);
            assert_eq!(results[0].content.as_deref(), Some("file contents"));
            assert!(results[1].is_error);
            assert_eq!(results[1].content.as_deref(), Some("boom"));
        }
        other => panic!("expected tool results, got {other:?}"),
    }
}

#[test]
fn user_echo_without_tool_results_is_skipped() {
    let line = json!({
        "type": "user",
        "message": { "content": [ { "type": "text", "text": "just an echo" } ] },
    })
    .to_string();
    assert!(adapter().parse_line(&line).is_none());
}

#[test]
fn result_line_ends_the_turn_with_stats() {
    let line = json!({
        "type": "result",
        "duration_ms": 5120,
        "num_turns": 4,
        "total_cost_usd": 0.042,
        "is_error": false,
        "result": "done",
    })
    .to_string();

    let envelope = adapter().parse_line(&line).expect("parsed");
    assert!(adapter().is_turn_complete(&envelope));
    match envelope {
        CanonicalEnvelope::TurnResult(stats) => {
            assert_eq!(stats.duration_ms, Some(5120));
            assert_eq!(stats.num_turns, Some(4));
            assert_eq!(stats.result.as_deref(), Some("done"));
            assert!(!stats.is_error);
        }
        other => panic!("expected turn result, got {other:?}"),
    }
}

#[test]
fn non_result_envelopes_do_not_end_the_turn() {
    let line = json!({
        "type": "assistant",
        "message": { "content": [ { "type": "text", "text": "hi" } ] },
    })
    .to_string();
    let envelope = adapter().parse_line(&line).expect("parsed");
    assert!(!adapter().is_turn_complete(&envelope));
}

#[test]
fn tool_progress_line_maps_ids() {
    let line = json!({
        "type": "tool_progress",
        "tool_use_id": "tool-1",
        "parent_tool_use_id": "task-1",
        "message": "reading files",
    })
    .to_string();

    match adapter().parse_line(&line).expect("parsed") {
        CanonicalEnvelope::ToolProgress {
            invocation_id,
            parent_invocation_id,
            message,
        } => {
            assert_eq!(invocation_id, "tool-1");
            assert_eq!(parent_invocation_id.as_deref(), Some("task-1"));
            assert_eq!(message, "reading files");
        }
        other => panic!("expected tool progress, got {other:?}"),
    }
}

#[test]
fn stream_events_and_garbage_lines_are_skipped() {
    let stream_event = json!({ "type": "stream_event", "event": {} }).to_string();
    assert!(adapter().parse_line(&stream_event).is_none());
    assert!(adapter().parse_line("not json at all").is_none());
    assert!(adapter().parse_line("").is_none());
    assert!(adapter().parse_line("   ").is_none());
}

// ── Delegated tasks ──────────────────────────────────────────

fn invocation(name: &str, input: serde_json::Value) -> ToolInvocation {
    ToolInvocation {
        invocation_id: "tool-1".into(),
        name: name.into(),
        input,
        parent_invocation_id: None,
    }
}

#[test]
fn task_tool_yields_subagent_type() {
    let task = invocation("Task", json!({ "subagent_type": "code-review" }));
    assert_eq!(
        adapter().delegated_task_type(&task).as_deref(),
        Some("code-review")
    );
}

#[test]
fn task_tool_without_subagent_type_defaults() {
    let task = invocation("Task", json!({}));
    assert_eq!(
        adapter().delegated_task_type(&task).as_deref(),
        Some("general-purpose")
    );
}

#[test]
fn ordinary_tools_are_not_delegated() {
    let tool = invocation("Bash", json!({ "command": "ls" }));
    assert!(adapter().delegated_task_type(&tool).is_none());
}

#[test]
fn claude_is_long_lived() {
    assert!(!adapter().one_shot());
    assert_eq!(adapter().kind(), "claude");
}
