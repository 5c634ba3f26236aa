//! Error types for traffic analysis

use thiserror::Error;

/// Errors loading captures or writing exports
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// Capture file could not be read
    #[error("capture error: {0}")]
    Capture(#[from] cl2_protocol::CaptureError),

    /// Export could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
