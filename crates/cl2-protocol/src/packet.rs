//! Tentative packet layout and codec
//!
//! The layout follows the Net485 structure as far as it is understood:
//!
//! ```text
//! [dest:2][src:2][type:1][seq:1][len:1][extra:3] [payload:len] [checksum:2]
//! ```
//!
//! All multi-byte fields are big-endian. Field names are guesses; the three
//! `extra` header bytes have no known meaning and are kept raw.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use tracing::trace;

use crate::checksum::{ChecksumKind, ChecksumStrategy, UnverifiedSum16};
use crate::display::{ascii_gutter, hex_string};
use crate::error::ParseError;
use crate::frame::Frame;

/// Header length in bytes
pub const HEADER_LEN: usize = 10;
/// Trailing checksum length in bytes
pub const CHECKSUM_LEN: usize = 2;
/// Smallest frame that can be decoded (empty payload)
pub const MIN_PACKET_LEN: usize = HEADER_LEN + CHECKSUM_LEN;
/// Largest payload the protocol allows
pub const MAX_PAYLOAD_LEN: usize = 240;

/// A frame decoded against the tentative layout
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Raw frame bytes
    pub raw: Vec<u8>,
    /// Capture timestamp in seconds
    pub timestamp: f64,
    pub dest_addr: u16,
    pub src_addr: u16,
    pub msg_type: u8,
    pub sequence: u8,
    /// Payload length as declared in the header
    pub payload_length: u8,
    /// Header bytes 7..10, meaning unknown
    pub header_extra: [u8; 3],
    pub payload: Vec<u8>,
    /// Trailing two bytes, big-endian
    pub checksum: u16,
    pub checksum_valid: bool,
    /// Set when the frame violates size or length invariants
    pub parse_error: Option<ParseError>,
}

impl Packet {
    /// A packet wrapping raw bytes with no fields extracted
    pub fn unparsed(raw: Vec<u8>, timestamp: f64) -> Self {
        Self {
            raw,
            timestamp,
            dest_addr: 0,
            src_addr: 0,
            msg_type: 0,
            sequence: 0,
            payload_length: 0,
            header_extra: [0; 3],
            payload: Vec::new(),
            checksum: 0,
            checksum_valid: false,
            parse_error: None,
        }
    }

    /// Decode with the default (unverified) checksum strategy
    pub fn from_bytes(data: &[u8], timestamp: f64) -> Self {
        decode_with(data, timestamp, &UnverifiedSum16)
    }

    /// Build a well-formed packet, computing the checksum with `strategy`
    pub fn build(
        header: PacketHeader,
        payload: &[u8],
        strategy: &dyn ChecksumStrategy,
    ) -> Result<Self, ParseError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ParseError::PayloadTooLong {
                declared: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let mut raw = Vec::with_capacity(MIN_PACKET_LEN + payload.len());
        raw.extend_from_slice(&header.encode(payload.len() as u8));
        raw.extend_from_slice(payload);
        let checksum = strategy.compute(&raw);
        raw.extend_from_slice(&checksum.to_be_bytes());

        Ok(decode_with(&raw, 0.0, strategy))
    }

    /// True when the frame decoded without structural errors
    pub fn is_valid(&self) -> bool {
        self.parse_error.is_none()
    }

    /// Header fields of this packet
    pub fn header(&self) -> PacketHeader {
        PacketHeader {
            dest_addr: self.dest_addr,
            src_addr: self.src_addr,
            msg_type: self.msg_type,
            sequence: self.sequence,
            extra: self.header_extra,
        }
    }

    /// Bytes covered by the checksum (everything but the trailing two bytes)
    pub fn checksummed_bytes(&self) -> Option<&[u8]> {
        (self.raw.len() >= MIN_PACKET_LEN).then(|| &self.raw[..self.raw.len() - CHECKSUM_LEN])
    }

    /// Re-serialize the decoded fields
    ///
    /// For packets without a parse error this reproduces `raw`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MIN_PACKET_LEN + self.payload.len());
        out.extend_from_slice(&self.header().encode(self.payload_length));
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.checksum.to_be_bytes());
        out
    }

    /// Raw bytes as hex separated by `separator`
    pub fn to_hex(&self, separator: &str) -> String {
        hex_string(&self.raw, separator)
    }

    /// `[SRC -> DEST] Type:TT Seq:SS Len:N`
    pub fn format_header(&self) -> String {
        format!(
            "[{:04X} -> {:04X}] Type:{:02X} Seq:{:02X} Len:{}",
            self.src_addr, self.dest_addr, self.msg_type, self.sequence, self.payload_length
        )
    }

    /// Payload hex dump with a printable-ASCII gutter
    pub fn format_payload(&self) -> String {
        if self.payload.is_empty() {
            return "(empty)".to_string();
        }
        format!(
            "{}  |{}|",
            hex_string(&self.payload, " "),
            ascii_gutter(&self.payload)
        )
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.parse_error {
            return write!(f, "[ERROR] {}: {}", err, self.to_hex(" "));
        }
        let status = if self.checksum_valid { "OK" } else { "BAD" };
        write!(
            f,
            "{} CRC:{}\n  Payload: {}",
            self.format_header(),
            status,
            self.format_payload()
        )
    }
}

/// Header fields excluding the payload length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    pub dest_addr: u16,
    pub src_addr: u16,
    pub msg_type: u8,
    pub sequence: u8,
    pub extra: [u8; 3],
}

impl PacketHeader {
    fn encode(&self, payload_length: u8) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        BigEndian::write_u16(&mut out[0..2], self.dest_addr);
        BigEndian::write_u16(&mut out[2..4], self.src_addr);
        out[4] = self.msg_type;
        out[5] = self.sequence;
        out[6] = payload_length;
        out[7..10].copy_from_slice(&self.extra);
        out
    }
}

fn decode_with(data: &[u8], timestamp: f64, checksum: &dyn ChecksumStrategy) -> Packet {
    let mut packet = Packet::unparsed(data.to_vec(), timestamp);

    if data.len() < MIN_PACKET_LEN {
        packet.parse_error = Some(ParseError::TooShort { len: data.len() });
        return packet;
    }

    packet.dest_addr = BigEndian::read_u16(&data[0..2]);
    packet.src_addr = BigEndian::read_u16(&data[2..4]);
    packet.msg_type = data[4];
    packet.sequence = data[5];
    packet.payload_length = data[6];
    packet.header_extra = [data[7], data[8], data[9]];

    let body_end = data.len() - CHECKSUM_LEN;
    let available = body_end - HEADER_LEN;
    let declared = usize::from(packet.payload_length);

    if declared != available {
        packet.parse_error = Some(ParseError::LengthMismatch {
            declared: packet.payload_length,
            available,
        });
    } else if declared > MAX_PAYLOAD_LEN {
        packet.parse_error = Some(ParseError::PayloadTooLong {
            declared,
            max: MAX_PAYLOAD_LEN,
        });
    }

    // On a mismatch everything between header and checksum is taken as payload
    packet.payload = data[HEADER_LEN..body_end].to_vec();
    packet.checksum = BigEndian::read_u16(&data[body_end..]);
    packet.checksum_valid = checksum.validate(&packet);

    trace!(
        "Decoded {} (checksum {} via {})",
        packet.format_header(),
        if packet.checksum_valid { "ok" } else { "bad" },
        checksum.name()
    );

    packet
}

/// Decodes frames using a pluggable checksum strategy
pub struct PacketCodec {
    checksum: Box<dyn ChecksumStrategy>,
}

impl PacketCodec {
    /// Codec with the unverified placeholder checksum
    pub fn new() -> Self {
        Self {
            checksum: Box::new(UnverifiedSum16),
        }
    }

    /// Codec validating with the given strategy
    pub fn with_checksum(checksum: impl ChecksumStrategy + 'static) -> Self {
        Self {
            checksum: Box::new(checksum),
        }
    }

    /// Codec validating with a configured strategy
    pub fn with_kind(kind: ChecksumKind) -> Self {
        Self {
            checksum: kind.strategy(),
        }
    }

    /// The active checksum strategy
    pub fn checksum(&self) -> &dyn ChecksumStrategy {
        self.checksum.as_ref()
    }

    /// Decode a frame; never fails, structural problems land in `parse_error`
    pub fn decode(&self, frame: &Frame) -> Packet {
        decode_with(frame.data(), frame.timestamp(), self.checksum.as_ref())
    }

    /// Decode raw bytes captured at `timestamp`
    pub fn decode_bytes(&self, data: &[u8], timestamp: f64) -> Packet {
        decode_with(data, timestamp, self.checksum.as_ref())
    }

    /// Decode a sequence of frames in order
    pub fn decode_all<I>(&self, frames: I) -> Vec<Packet>
    where
        I: IntoIterator<Item = Frame>,
    {
        frames.into_iter().map(|f| self.decode(&f)).collect()
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{Crc16Ccitt, Sum16};

    const HVAC: [u8; 16] = [
        0x20, 0x01, 0x40, 0x01, 0x01, 0x00, 0x04, 0x00, 0x00, 0x00, 0x48, 0x56, 0x41, 0x43, 0x00,
        0x00,
    ];

    #[test]
    fn test_too_short() {
        let packet = Packet::from_bytes(&[0u8; 10], 0.0);
        let err = packet.parse_error.as_ref().unwrap();
        assert!(err.to_string().to_lowercase().contains("too short"));
        assert!(!packet.checksum_valid);
    }

    #[test]
    fn test_minimum_size() {
        let data = [0x20, 0x01, 0x40, 0x01, 0, 0, 0, 0, 0, 0, 0, 0];
        let packet = Packet::from_bytes(&data, 0.0);
        assert!(packet.is_valid());
        assert_eq!(packet.dest_addr, 0x2001);
        assert_eq!(packet.src_addr, 0x4001);
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn test_with_payload() {
        let packet = Packet::from_bytes(&HVAC, 0.0);
        assert!(packet.is_valid());
        assert_eq!(packet.payload_length, 4);
        assert_eq!(packet.payload, b"HVAC");
        assert_eq!(packet.msg_type, 0x01);
        assert_eq!(packet.checksum, 0x0000);
    }

    #[test]
    fn test_declared_length_too_long() {
        let mut data = HVAC;
        data[6] = 0x10;
        let packet = Packet::from_bytes(&data, 0.0);
        assert_eq!(
            packet.parse_error,
            Some(ParseError::LengthMismatch {
                declared: 0x10,
                available: 4
            })
        );
        assert_eq!(packet.payload, b"HVAC");
    }

    #[test]
    fn test_declared_length_too_short() {
        let mut data = HVAC;
        data[6] = 0x02;
        let packet = Packet::from_bytes(&data, 0.0);
        assert!(matches!(
            packet.parse_error,
            Some(ParseError::LengthMismatch { declared: 2, .. })
        ));
        assert_eq!(packet.payload, b"HVAC");
    }

    #[test]
    fn test_checksum_is_last_two_bytes() {
        let mut data = HVAC;
        data[14] = 0xBE;
        data[15] = 0xEF;
        assert_eq!(Packet::from_bytes(&data, 0.0).checksum, 0xBEEF);
    }

    #[test]
    fn test_timestamp_preserved() {
        let packet = Packet::from_bytes(&[0u8; 12], 1_234_567_890.123);
        assert_eq!(packet.timestamp, 1_234_567_890.123);
    }

    #[test]
    fn test_all_zero_minimum_frame() {
        let packet = Packet::from_bytes(&[0u8; 12], 0.0);
        assert_eq!(packet.parse_error, None);
        assert_eq!(packet.dest_addr, 0);
        assert_eq!(packet.src_addr, 0);
        assert_eq!(packet.msg_type, 0);
        assert_eq!(packet.payload_length, 0);
        assert!(packet.payload.is_empty());
        assert_eq!(packet.checksum, 0);
    }

    #[test]
    fn test_codec_uses_strategy() {
        let header = PacketHeader {
            dest_addr: 0x2001,
            src_addr: 0x4001,
            msg_type: 0x05,
            ..Default::default()
        };
        let packet = Packet::build(header, b"HVAC", &Crc16Ccitt).unwrap();
        let frame = Frame::new(packet.raw.clone(), 3.0);

        assert!(PacketCodec::with_checksum(Crc16Ccitt).decode(&frame).checksum_valid);
        assert!(!PacketCodec::with_checksum(Sum16).decode(&frame).checksum_valid);
        assert!(PacketCodec::new().decode(&frame).checksum_valid);
        assert_eq!(PacketCodec::new().decode(&frame).timestamp, 3.0);
    }

    #[test]
    fn test_build_rejects_oversized_payload() {
        let result = Packet::build(PacketHeader::default(), &[0u8; 241], &Sum16);
        assert!(matches!(result, Err(ParseError::PayloadTooLong { .. })));
    }

    #[test]
    fn test_encode_reproduces_raw() {
        let packet = Packet::from_bytes(&HVAC, 0.0);
        assert_eq!(packet.encode(), HVAC.to_vec());
    }

    #[test]
    fn test_to_hex() {
        let packet = Packet::unparsed(vec![0xDE, 0xAD, 0xBE, 0xEF], 0.0);
        assert_eq!(packet.to_hex(" "), "de ad be ef");
        assert_eq!(packet.to_hex(""), "deadbeef");
    }

    #[test]
    fn test_format_header() {
        let data = [0x20, 0x01, 0x40, 0x01, 0x05, 0x0A, 0, 0, 0, 0, 0, 0];
        let header = Packet::from_bytes(&data, 0.0).format_header();
        assert_eq!(header, "[4001 -> 2001] Type:05 Seq:0A Len:0");
    }

    #[test]
    fn test_format_payload_ascii() {
        let mut packet = Packet::unparsed(vec![0; 12], 0.0);
        packet.payload = b"HELLO\x01".to_vec();
        let formatted = packet.format_payload();
        assert!(formatted.contains("HELLO."));
        assert!(formatted.starts_with("48 45 4c 4c 4f 01"));
        packet.payload.clear();
        assert_eq!(packet.format_payload(), "(empty)");
    }

    #[test]
    fn test_display() {
        let ok = Packet::from_bytes(&HVAC, 0.0).to_string();
        assert!(ok.contains("CRC:OK"));
        assert!(ok.contains("|HVAC|"));

        let bad = Packet::from_bytes(&[1, 2, 3], 0.0).to_string();
        assert_eq!(bad, "[ERROR] packet too short: 3 bytes: 01 02 03");
    }
}
