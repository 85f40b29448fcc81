//! Domain models owned by the orchestration core.

pub mod metric;
pub mod outbound;
pub mod segment;
pub mod session;

pub use metric::TaskMetric;
pub use outbound::QueuedOutboundMessage;
pub use segment::MessageSegment;
pub use session::{Session, SessionHandle, SessionStatus};
