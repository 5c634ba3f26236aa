//! ComfortLink II Protocol Library
//!
//! Tentative wire model for the ComfortLink II HVAC bus, an undocumented
//! RS-485 protocol that appears to follow the Net485 structure:
//!
//! - **Frames**: timestamped byte runs cut from the bus by timing gaps
//! - **Capture files**: length-prefixed, timestamped frame records
//! - **Packets**: 10-byte header, 0-240 byte payload, 2-byte checksum
//! - **Checksums**: pluggable hypotheses, since the real algorithm is unknown
//!
//! Nothing in this crate rejects data. Malformed frames decode into packets
//! carrying a [`ParseError`], and checksum mismatches are a flag, not an error.
//!
//! # Example
//!
//! ```rust
//! use cl2_protocol::{Frame, PacketCodec};
//!
//! let codec = PacketCodec::new();
//! let bytes = vec![
//!     0x20, 0x01, 0x40, 0x01, 0x01, 0x00, 0x04, 0x00, 0x00, 0x00, b'H', b'V', b'A', b'C', 0x00,
//!     0x00,
//! ];
//! let frame = Frame::new(bytes, 0.0);
//!
//! let packet = codec.decode(&frame);
//! assert!(packet.is_valid());
//! assert_eq!(packet.dest_addr, 0x2001);
//! assert_eq!(packet.payload, b"HVAC");
//! ```

pub mod address;
pub mod capture;
pub mod checksum;
pub mod display;
pub mod error;
pub mod frame;
pub mod packet;

pub use address::{device_hint, parse_address, BROADCAST_ADDR};
pub use capture::{read_capture_file, segment, CaptureReader, CaptureWriter, RecordSegmenter};
pub use checksum::{ChecksumKind, ChecksumStrategy};
pub use error::{CaptureError, ParseError};
pub use frame::Frame;
pub use packet::{
    Packet, PacketCodec, PacketHeader, CHECKSUM_LEN, HEADER_LEN, MAX_PAYLOAD_LEN, MIN_PACKET_LEN,
};
