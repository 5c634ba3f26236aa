//! Error types for live capture and replay

use thiserror::Error;

/// Errors while capturing from the bus
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Serial port could not be opened
    #[error("failed to open {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// Serial settings cannot be applied
    #[error("invalid serial settings: {0}")]
    InvalidSettings(String),

    /// Capture file could not be written
    #[error("capture file error: {0}")]
    File(#[from] cl2_protocol::CaptureError),

    /// Port or file I/O failed mid-capture
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while replaying a capture
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("packet index {index} out of range (capture has {len} packets)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid range {start}..{end} (capture has {len} packets)")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("capture file error: {0}")]
    Capture(#[from] cl2_protocol::CaptureError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
