//! Line-oriented stream handling for agent process output.

pub mod codec;
pub mod reader;

pub use codec::{LineCodec, MAX_LINE_BYTES};
pub use reader::{ReaderStats, StreamLineReader};
