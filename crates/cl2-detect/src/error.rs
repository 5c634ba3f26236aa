//! Error types for bus detection

use thiserror::Error;

/// Errors that can occur while probing the bus
#[derive(Debug, Error)]
pub enum DetectError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// Failed to open serial port
    #[error("failed to open port {port} at {baud} baud: {reason}")]
    OpenFailed {
        port: String,
        baud: u32,
        reason: String,
    },

    /// I/O error while sampling
    #[error("I/O error on {port}: {reason}")]
    IoError { port: String, reason: String },

    /// Serial port error
    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),
}

/// Errors from signal trace analysis
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SignalError {
    /// Too few edges for the requested analysis
    #[error("not enough edges: found {found}, need {required}")]
    NotEnoughEdges { found: usize, required: usize },

    /// Sample file could not be read
    #[error("failed to read samples: {0}")]
    Read(String),
}
