//! Streaming segmentation pipeline.
//!
//! [`SegmentAssembler`] consumes the cumulative content of one turn and
//! the tool-invocation boundaries interleaved with it, and produces
//! ordered [`SegmentOp`]s: streaming deltas for the open segment and
//! finalizations when a tool boundary is followed by new content. It also
//! tracks the stack of active delegated-task invocations so nested tool
//! events resolve to an effective parent.
//!
//! One assembler is constructed per streaming call and owned by the turn;
//! the state machine is synchronous so it can be driven directly in tests.

use crate::models::MessageSegment;

/// Output unit of the assembler, converted to session events by the
/// streaming loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOp {
    /// New streaming text for the open segment.
    Delta {
        /// Segment the delta extends.
        segment_id: String,
        /// Appended text.
        text: String,
    },
    /// A segment's boundary is fixed; its full content is attached.
    Final {
        /// Finalized segment record.
        segment: MessageSegment,
        /// Complete segment content.
        text: String,
    },
}

/// Per-turn segmentation state machine.
#[derive(Debug)]
pub struct SegmentAssembler {
    buffer: String,
    current: MessageSegment,
    emitted_len: usize,
    /// Buffer length at the moment a tool boundary was observed; `Some`
    /// means the next non-empty content emission splits the segment.
    pending_split: Option<usize>,
    /// Active delegated-task invocation ids, innermost last.
    task_stack: Vec<String>,
}

impl SegmentAssembler {
    /// Fresh assembler with one open segment at offset zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            current: MessageSegment::new(0),
            emitted_len: 0,
            pending_split: None,
            task_stack: Vec::new(),
        }
    }

    /// Identifier of the open segment; every tool/progress/result event
    /// is tagged with this so consumers correlate tool execution to the
    /// message it belongs to, across splits.
    #[must_use]
    pub fn current_segment_id(&self) -> &str {
        &self.current.id
    }

    /// Append content and produce the resulting ops.
    ///
    /// If a split is pending and the previous segment has content, it is
    /// finalized first (sliced up to the recorded split length) and a new
    /// segment opens at the split point. An empty gap between two tool
    /// invocations never splits: the boundary simply carries over.
    pub fn push_content(&mut self, text: &str) -> Vec<SegmentOp> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut ops = Vec::new();
        self.buffer.push_str(text);

        if let Some(split_len) = self.pending_split.take() {
            if split_len > self.current.start_offset {
                ops.push(self.finalize_current(split_len));
                self.current = MessageSegment::new(split_len);
            }
            // split_len == start_offset: nothing precedes the boundary,
            // the still-open segment absorbs the new content.
        }

        let delta = self.buffer[self.emitted_len..].to_owned();
        self.emitted_len = self.buffer.len();
        ops.push(SegmentOp::Delta {
            segment_id: self.current.id.clone(),
            text: delta,
        });
        ops
    }

    /// Record a tool-invocation boundary at the current buffer length.
    ///
    /// Idempotent until content arrives: repeated boundaries without
    /// intervening content collapse into one split point.
    pub fn mark_tool_boundary(&mut self) {
        if self.pending_split.is_none() {
            self.pending_split = Some(self.buffer.len());
        }
    }

    /// Finalize the open segment if it has content; returns closing ops.
    pub fn finish(&mut self) -> Vec<SegmentOp> {
        if self.buffer.len() > self.current.start_offset {
            let end = self.buffer.len();
            vec![self.finalize_current(end)]
        } else {
            Vec::new()
        }
    }

    // ── Delegation stack ─────────────────────────────────────────────────────

    /// Push a delegated-task invocation onto the nesting stack.
    pub fn push_task(&mut self, invocation_id: &str) {
        self.task_stack.push(invocation_id.to_owned());
    }

    /// Pop a delegated-task invocation when its result arrives.
    ///
    /// Removes the innermost occurrence so out-of-order results cannot
    /// strand deeper entries.
    pub fn pop_task(&mut self, invocation_id: &str) {
        if let Some(pos) = self.task_stack.iter().rposition(|id| id == invocation_id) {
            self.task_stack.remove(pos);
        }
    }

    /// Effective parent for a child tool invocation: the explicit parent
    /// when the adapter supplied one, else the top of the delegation stack.
    #[must_use]
    pub fn effective_parent(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(ToOwned::to_owned)
            .or_else(|| self.task_stack.last().cloned())
    }

    /// Number of active delegated-task invocations.
    #[must_use]
    pub fn active_tasks(&self) -> usize {
        self.task_stack.len()
    }

    // ── Private helpers ──────────────────────────────────────────────────────

    /// Close the current segment at `end`, returning its final op.
    fn finalize_current(&mut self, end: usize) -> SegmentOp {
        self.current.finalized = true;
        SegmentOp::Final {
            segment: self.current.clone(),
            text: self.buffer[self.current.start_offset..end].to_owned(),
        }
    }
}

impl Default for SegmentAssembler {
    fn default() -> Self {
        Self::new()
    }
}
