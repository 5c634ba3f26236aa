//! Pluggable checksum strategies
//!
//! The bus checksum algorithm has not been identified. The trailing two
//! bytes of every packet are treated as a 16-bit big-endian checksum over
//! header + payload, and the algorithm is supplied to the codec as a
//! [`ChecksumStrategy`]. The default, [`UnverifiedSum16`], computes a plain
//! 16-bit sum but accepts every packet.
//!
//! Candidate algorithms can be compared against real captures with the
//! checksum survey in `cl2-analyze`.

use crate::packet::Packet;

/// A checksum algorithm hypothesis
///
/// Implementations must be total: neither method may panic for any input.
pub trait ChecksumStrategy: Send + Sync {
    /// Short identifier used in reports and configuration
    fn name(&self) -> &'static str;

    /// Compute the checksum over `data` (header + payload)
    fn compute(&self, data: &[u8]) -> u16;

    /// Check a decoded packet's trailing checksum
    ///
    /// Packets too short to carry a checksum never validate.
    fn validate(&self, packet: &Packet) -> bool {
        packet
            .checksummed_bytes()
            .is_some_and(|covered| self.compute(covered) == packet.checksum)
    }
}

/// Placeholder: 16-bit sum that accepts every packet
#[derive(Debug, Clone, Copy, Default)]
pub struct UnverifiedSum16;

impl ChecksumStrategy for UnverifiedSum16 {
    fn name(&self) -> &'static str {
        "unverified-sum16"
    }

    fn compute(&self, data: &[u8]) -> u16 {
        sum16(data)
    }

    fn validate(&self, _packet: &Packet) -> bool {
        true
    }
}

/// 16-bit sum modulo 65536, actually compared
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum16;

impl ChecksumStrategy for Sum16 {
    fn name(&self) -> &'static str {
        "sum16"
    }

    fn compute(&self, data: &[u8]) -> u16 {
        sum16(data)
    }
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, no reflection)
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc16Ccitt;

impl ChecksumStrategy for Crc16Ccitt {
    fn name(&self) -> &'static str {
        "crc16-ccitt"
    }

    fn compute(&self, data: &[u8]) -> u16 {
        let mut crc: u16 = 0xFFFF;
        for &byte in data {
            crc ^= u16::from(byte) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 {
                    (crc << 1) ^ 0x1021
                } else {
                    crc << 1
                };
            }
        }
        crc
    }
}

/// Reflected CRC-16 with polynomial 0x8005 (0xA001 reversed)
fn crc16_reflected(data: &[u8], init: u16) -> u16 {
    let mut crc = init;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            crc = if crc & 0x0001 != 0 {
                (crc >> 1) ^ 0xA001
            } else {
                crc >> 1
            };
        }
    }
    crc
}

/// CRC-16/ARC, also known as CRC-16-IBM (init 0x0000)
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc16Arc;

impl ChecksumStrategy for Crc16Arc {
    fn name(&self) -> &'static str {
        "crc16-arc"
    }

    fn compute(&self, data: &[u8]) -> u16 {
        crc16_reflected(data, 0x0000)
    }
}

/// CRC-16/MODBUS (init 0xFFFF)
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc16Modbus;

impl ChecksumStrategy for Crc16Modbus {
    fn name(&self) -> &'static str {
        "crc16-modbus"
    }

    fn compute(&self, data: &[u8]) -> u16 {
        crc16_reflected(data, 0xFFFF)
    }
}

/// Fletcher-16, `(sum2 << 8) | sum1`
#[derive(Debug, Clone, Copy, Default)]
pub struct Fletcher16;

impl ChecksumStrategy for Fletcher16 {
    fn name(&self) -> &'static str {
        "fletcher16"
    }

    fn compute(&self, data: &[u8]) -> u16 {
        let (mut sum1, mut sum2) = (0u16, 0u16);
        for &byte in data {
            sum1 = (sum1 + u16::from(byte)) % 255;
            sum2 = (sum2 + sum1) % 255;
        }
        (sum2 << 8) | sum1
    }
}

fn sum16(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

/// Selectable checksum hypotheses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ChecksumKind {
    /// Accept everything (algorithm unknown)
    #[default]
    Unverified,
    Sum16,
    Crc16Ccitt,
    Crc16Arc,
    Crc16Modbus,
    Fletcher16,
}

impl ChecksumKind {
    /// Every hypothesis that actually compares checksums
    pub const CANDIDATES: [ChecksumKind; 5] = [
        ChecksumKind::Sum16,
        ChecksumKind::Crc16Ccitt,
        ChecksumKind::Crc16Arc,
        ChecksumKind::Crc16Modbus,
        ChecksumKind::Fletcher16,
    ];

    /// Instantiate the strategy
    pub fn strategy(self) -> Box<dyn ChecksumStrategy> {
        match self {
            ChecksumKind::Unverified => Box::new(UnverifiedSum16),
            ChecksumKind::Sum16 => Box::new(Sum16),
            ChecksumKind::Crc16Ccitt => Box::new(Crc16Ccitt),
            ChecksumKind::Crc16Arc => Box::new(Crc16Arc),
            ChecksumKind::Crc16Modbus => Box::new(Crc16Modbus),
            ChecksumKind::Fletcher16 => Box::new(Fletcher16),
        }
    }

    /// Parse the names produced by [`ChecksumStrategy::name`]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "unverified" | "unverified-sum16" => Some(Self::Unverified),
            "sum16" => Some(Self::Sum16),
            "crc16-ccitt" => Some(Self::Crc16Ccitt),
            "crc16-arc" | "crc16-ibm" => Some(Self::Crc16Arc),
            "crc16-modbus" => Some(Self::Crc16Modbus),
            "fletcher16" => Some(Self::Fletcher16),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECK: &[u8] = b"123456789";

    #[test]
    fn test_crc_check_values() {
        assert_eq!(Crc16Ccitt.compute(CHECK), 0x29B1);
        assert_eq!(Crc16Arc.compute(CHECK), 0xBB3D);
        assert_eq!(Crc16Modbus.compute(CHECK), 0x4B37);
    }

    #[test]
    fn test_fletcher16() {
        assert_eq!(Fletcher16.compute(b"abcde"), 0xC8F0);
        assert_eq!(Fletcher16.compute(b"abcdef"), 0x2057);
    }

    #[test]
    fn test_sum16_wraps() {
        assert_eq!(Sum16.compute(&[0xFF; 300]), (0xFFu32 * 300 % 65536) as u16);
        assert_eq!(UnverifiedSum16.compute(&[1, 2, 3]), 6);
    }

    #[test]
    fn test_unverified_accepts_everything() {
        let packet = Packet::from_bytes(&[0x12; 14], 0.0);
        assert!(UnverifiedSum16.validate(&packet));
        assert!(!Sum16.validate(&packet));
    }

    #[test]
    fn test_short_packet_never_validates() {
        let packet = Packet::from_bytes(&[0u8; 4], 0.0);
        assert!(!Sum16.validate(&packet));
    }

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in ChecksumKind::CANDIDATES {
            let name = kind.strategy().name();
            assert_eq!(ChecksumKind::from_name(name), Some(kind));
        }
        assert_eq!(
            ChecksumKind::from_name("unverified-sum16"),
            Some(ChecksumKind::Unverified)
        );
    }
}
