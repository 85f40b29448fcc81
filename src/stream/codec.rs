//! Bounded line codec for agent output streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a fixed maximum line
//! length to prevent memory exhaustion from an unterminated or runaway
//! line on a misbehaving agent's stdout.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum line length accepted by the codec: 1 MiB.
///
/// Longer inbound lines cause [`LineCodec::decode`] to return
/// [`AppError::Parse`] with `"line too long"` rather than allocating
/// unboundedly.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Bounded `\n`-delimited UTF-8 line codec.
///
/// # Decoder
///
/// Inbound lines longer than [`MAX_LINE_BYTES`] return
/// [`AppError::Parse`]`("line too long: …")`. I/O errors are mapped to
/// [`AppError::Io`]. [`decode_eof`](LineCodec::decode_eof) flushes a
/// non-terminated trailing fragment as a final line.
#[derive(Debug)]
pub struct LineCodec(LinesCodec);

impl LineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

// ── Private helper ───────────────────────────────────────────────────────────

/// Map a [`LinesCodecError`] to an [`AppError`].
fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Parse(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
