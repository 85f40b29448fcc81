//! Unit tests for session event serialization.

use agent_relay::backend::{ToolInvocation, TurnStats};
use agent_relay::events::SessionEvent;
use agent_relay::models::MessageSegment;

#[test]
fn events_tag_with_snake_case_type() {
    let event = SessionEvent::SessionInit {
        session_id: "s1".into(),
        provider_session_id: Some("prov-1".into()),
        model: None,
    };
    let json = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["type"], "session_init");
    assert_eq!(json["session_id"], "s1");
    assert_eq!(json["provider_session_id"], "prov-1");
}

#[test]
fn segment_delta_round_trips() {
    let event = SessionEvent::SegmentDelta {
        session_id: "s1".into(),
        segment_id: "seg-1".into(),
        text: "chunk".into(),
    };
    let json = serde_json::to_string(&event).expect("serialize");
    let back: SessionEvent = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, event);
}

#[test]
fn segment_final_carries_the_segment_record() {
    let mut segment = MessageSegment::new(7);
    segment.finalized = true;
    let event = SessionEvent::SegmentFinal {
        session_id: "s1".into(),
        segment,
        text: "complete".into(),
    };
    let json = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["type"], "segment_final");
    assert_eq!(json["segment"]["start_offset"], 7);
    assert_eq!(json["segment"]["finalized"], true);
}

#[test]
fn tool_started_embeds_the_invocation() {
    let event = SessionEvent::ToolStarted {
        session_id: "s1".into(),
        segment_id: "seg-1".into(),
        invocation: ToolInvocation {
            invocation_id: "tool-1".into(),
            name: "Task".into(),
            input: serde_json::json!({ "subagent_type": "explore" }),
            parent_invocation_id: None,
        },
    };
    let json = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["type"], "tool_started");
    assert_eq!(json["invocation"]["name"], "Task");
}

#[test]
fn turn_completed_serializes_optional_stats() {
    let event = SessionEvent::TurnCompleted {
        session_id: "s1".into(),
        stats: Some(TurnStats {
            duration_ms: Some(100),
            num_turns: Some(1),
            total_cost_usd: None,
            is_error: false,
            result: Some("ok".into()),
        }),
    };
    let json = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["type"], "turn_completed");
    assert_eq!(json["stats"]["duration_ms"], 100);

    let bare = SessionEvent::TurnCompleted {
        session_id: "s1".into(),
        stats: None,
    };
    let json = serde_json::to_value(&bare).expect("serialize");
    assert!(json["stats"].is_null());
}

#[test]
fn session_id_accessor_covers_all_variants() {
    let events = [
        SessionEvent::Thinking {
            session_id: "s9".into(),
            segment_id: "seg".into(),
            text: "t".into(),
        },
        SessionEvent::TaskBlocked {
            session_id: "s9".into(),
            segment_id: "seg".into(),
            task_type: "explore".into(),
            invocation_id: "tool-1".into(),
            reason: "circuit open".into(),
        },
        SessionEvent::ToolCompleted {
            session_id: "s9".into(),
            segment_id: "seg".into(),
            invocation_id: "tool-1".into(),
            is_error: false,
            content: None,
        },
        SessionEvent::ToolProgress {
            session_id: "s9".into(),
            segment_id: "seg".into(),
            invocation_id: "tool-1".into(),
            parent_invocation_id: None,
            message: "working".into(),
        },
    ];
    for event in events {
        assert_eq!(event.session_id(), "s9");
    }
}
