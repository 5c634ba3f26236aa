//! Raw bus frames
//!
//! A frame is a contiguous byte run believed to be one bus transmission.
//! Nothing about its content is assumed here; decoding happens in
//! [`crate::packet`].

/// A captured byte run with its capture timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    timestamp: f64,
    declared_len: u32,
}

impl Frame {
    /// Create a frame from bytes received at `timestamp` (seconds)
    pub fn new(data: Vec<u8>, timestamp: f64) -> Self {
        let declared_len = u32::try_from(data.len()).unwrap_or(u32::MAX);
        Self {
            data,
            timestamp,
            declared_len,
        }
    }

    /// Create a frame whose source claimed `declared_len` bytes but may have
    /// delivered fewer (a truncated capture record)
    pub fn with_declared_len(data: Vec<u8>, timestamp: f64, declared_len: u32) -> Self {
        Self {
            data,
            timestamp,
            declared_len,
        }
    }

    /// Raw frame bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Capture timestamp in seconds
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Length the source claimed for this frame
    pub fn declared_len(&self) -> u32 {
        self.declared_len
    }

    /// Number of bytes actually present
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// False when the source delivered fewer bytes than it declared
    pub fn is_complete(&self) -> bool {
        self.data.len() as u64 >= u64::from(self.declared_len)
    }

    /// Consume the frame, returning its bytes
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
