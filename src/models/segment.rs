//! Message-segment model for the segmentation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One logical unit of assistant output, bounded by tool invocations.
///
/// A segment's displayed content is the cumulative turn buffer sliced from
/// `start_offset` to the next segment's start offset (or end of stream).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct MessageSegment {
    /// Segment identifier, unique within the turn.
    pub id: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Byte offset into the cumulative turn buffer where this segment starts.
    pub start_offset: usize,
    /// Set once the segment's content boundary is fixed.
    pub finalized: bool,
}

impl MessageSegment {
    /// Open a new segment starting at `start_offset`.
    #[must_use]
    pub fn new(start_offset: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            start_offset,
            finalized: false,
        }
    }
}
