//! Error types for packet decoding and capture file access

use thiserror::Error;

/// Structural problems found while decoding a frame
///
/// These are recorded on the [`Packet`](crate::Packet) rather than returned,
/// so a malformed frame stays available for raw inspection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParseError {
    /// Frame is shorter than header plus checksum
    #[error("packet too short: {len} bytes")]
    TooShort { len: usize },

    /// Declared payload length disagrees with the bytes between header and checksum
    #[error("payload length mismatch: expected {declared}, available {available}")]
    LengthMismatch { declared: u8, available: usize },

    /// Declared payload length exceeds the protocol maximum
    #[error("payload too long: declared {declared}, maximum {max}")]
    PayloadTooLong { declared: usize, max: usize },
}

/// Errors reading or writing capture files
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Underlying I/O failure (not a truncated record)
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame is too large to be described by a 32-bit record length
    #[error("frame of {0} bytes does not fit a capture record")]
    FrameTooLarge(usize),
}
