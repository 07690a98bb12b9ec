//! Inbound frame validation.
//!
//! Every text frame received from the chat service goes through [`FrameDecoder`].
//! Frames that are not JSON, or whose shape matches none of the known
//! [`ServerFrame`] kinds, are dropped: they never reach the transcript. Each drop
//! is counted and logged so callers and tests can observe it.

use serde::Serialize;

use crate::protocol::ServerFrame;

/// Counters kept by the decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// Frames that decoded into a known kind.
    pub accepted: u64,
    /// Frames that were dropped as malformed or unrecognized.
    pub dropped: u64,
}

/// Why a frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Not valid JSON.
    NotJson,
    /// Valid JSON, but not one of the recognized frame shapes.
    UnknownShape,
}

impl DropReason {
    /// Short label used in log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotJson => "not_json",
            Self::UnknownShape => "unknown_shape",
        }
    }
}

/// Stateful decoder for inbound frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    stats: DecodeStats,
}

impl FrameDecoder {
    /// Create a decoder with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one raw frame.
    ///
    /// Returns `None` when the frame is dropped. Never panics.
    pub fn decode(&mut self, raw: &str) -> Option<ServerFrame> {
        match classify(raw) {
            Ok(frame) => {
                self.stats.accepted += 1;
                tracing::trace!(kind = frame.kind(), "Decoded server frame");
                Some(frame)
            }
            Err((reason, error)) => {
                self.stats.dropped += 1;
                tracing::warn!(
                    reason = reason.as_str(),
                    error = %error,
                    frame_len = raw.len(),
                    dropped_total = self.stats.dropped,
                    "Dropping malformed server frame"
                );
                None
            }
        }
    }

    /// Counters accumulated so far.
    #[must_use]
    pub const fn stats(&self) -> DecodeStats {
        self.stats
    }
}

fn classify(raw: &str) -> Result<ServerFrame, (DropReason, serde_json::Error)> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| (DropReason::NotJson, e))?;
    serde_json::from_value(value).map_err(|e| (DropReason::UnknownShape, e))
}
