//! Display helpers for raw bytes and decoded packets
//!
//! Everything here is total: any byte slice or packet, valid or not, can be
//! rendered.

use std::ops::Range;

use crate::address::device_hint;
use crate::packet::{Packet, CHECKSUM_LEN, HEADER_LEN};

/// Render bytes as lowercase hex pairs joined by `separator`
pub fn hex_string(bytes: &[u8], separator: &str) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Printable ASCII rendering, non-printable bytes shown as `.`
pub fn ascii_gutter(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if (32..127).contains(&b) { b as char } else { '.' })
        .collect()
}

/// Hex string truncated to `max_chars`, ending in `...` when cut
pub fn truncated_hex(bytes: &[u8], max_chars: usize) -> String {
    let hex = hex_string(bytes, " ");
    if hex.len() > max_chars && max_chars > 3 {
        format!("{}...", &hex[..max_chars - 3])
    } else {
        hex
    }
}

/// Type of a packet field, for coloring or labelling in detail views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentType {
    Address,
    MessageType,
    Sequence,
    Length,
    /// Header bytes with unknown meaning
    Unknown,
    Payload,
    Checksum,
}

/// A labelled byte range of a packet
#[derive(Debug, Clone)]
pub struct FieldSegment {
    /// Byte range in the raw frame
    pub range: Range<usize>,
    pub label: &'static str,
    /// Decoded value as text
    pub value: String,
    pub segment_type: SegmentType,
}

impl FieldSegment {
    fn new(
        range: Range<usize>,
        label: &'static str,
        value: String,
        segment_type: SegmentType,
    ) -> Self {
        Self {
            range,
            label,
            value,
            segment_type,
        }
    }
}

fn format_address(addr: u16) -> String {
    match device_hint(addr) {
        Some(hint) => format!("0x{:04X} ({})", addr, hint),
        None => format!("0x{:04X}", addr),
    }
}

/// Break a packet into labelled fields
///
/// Packets with a `TooShort` error have no fields and yield an empty list.
pub fn annotate(packet: &Packet) -> Vec<FieldSegment> {
    let len = packet.raw.len();
    if len < HEADER_LEN + CHECKSUM_LEN {
        return Vec::new();
    }

    let body_end = len - CHECKSUM_LEN;
    let mut segments = vec![
        FieldSegment::new(
            0..2,
            "dest",
            format_address(packet.dest_addr),
            SegmentType::Address,
        ),
        FieldSegment::new(
            2..4,
            "src",
            format_address(packet.src_addr),
            SegmentType::Address,
        ),
        FieldSegment::new(
            4..5,
            "type",
            format!("0x{:02X}", packet.msg_type),
            SegmentType::MessageType,
        ),
        FieldSegment::new(
            5..6,
            "seq",
            packet.sequence.to_string(),
            SegmentType::Sequence,
        ),
        FieldSegment::new(
            6..7,
            "len",
            packet.payload_length.to_string(),
            SegmentType::Length,
        ),
        FieldSegment::new(
            7..10,
            "extra",
            hex_string(&packet.header_extra, " "),
            SegmentType::Unknown,
        ),
    ];

    if body_end > HEADER_LEN {
        segments.push(FieldSegment::new(
            HEADER_LEN..body_end,
            "payload",
            ascii_gutter(&packet.payload),
            SegmentType::Payload,
        ));
    }

    let status = if packet.checksum_valid { "ok" } else { "bad" };
    segments.push(FieldSegment::new(
        body_end..len,
        "checksum",
        format!("0x{:04X} ({})", packet.checksum, status),
        SegmentType::Checksum,
    ));

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_string() {
        assert_eq!(hex_string(&[0x00, 0x0F, 0xF0], ":"), "00:0f:f0");
        assert_eq!(hex_string(&[], " "), "");
    }

    #[test]
    fn test_ascii_gutter() {
        assert_eq!(ascii_gutter(b"A\x00~\x7F "), "A.~. ");
    }

    #[test]
    fn test_truncated_hex() {
        let bytes = [0xAB; 40];
        let text = truncated_hex(&bytes, 80);
        assert_eq!(text.len(), 80);
        assert!(text.ends_with("..."));
        assert_eq!(truncated_hex(&[1, 2], 80), "01 02");
    }

    #[test]
    fn test_annotate_covers_frame() {
        let data = [
            0x20, 0x01, 0x40, 0x01, 0x01, 0x07, 0x02, 0xAA, 0xBB, 0xCC, b'O', b'K', 0x12, 0x34,
        ];
        let packet = Packet::from_bytes(&data, 0.0);
        let segments = annotate(&packet);

        assert_eq!(segments.first().unwrap().range, 0..2);
        assert_eq!(segments.last().unwrap().range, 12..14);
        assert!(segments[0].value.contains("Thermostat"));
        let payload = segments.iter().find(|s| s.label == "payload").unwrap();
        assert_eq!(payload.value, "OK");
        // Segments are contiguous
        for pair in segments.windows(2) {
            assert_eq!(pair[0].range.end, pair[1].range.start);
        }
    }

    #[test]
    fn test_annotate_short_packet() {
        assert!(annotate(&Packet::from_bytes(&[1, 2, 3], 0.0)).is_empty());
    }
}
