//! Checksum hypothesis survey
//!
//! Scores candidate checksum algorithms against the trailing two bytes of
//! real packets. A hypothesis that matches nearly every packet is worth
//! promoting to the codec; one that matches at chance level (about 1 in
//! 65536) is refuted.

use cl2_protocol::{ChecksumKind, ChecksumStrategy, Packet};
use serde::Serialize;
use tracing::debug;

use crate::traffic::TrafficAnalyzer;

/// How well one checksum hypothesis explains the capture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveyEntry {
    pub name: &'static str,
    pub matched: usize,
    pub total: usize,
}

impl SurveyEntry {
    /// Fraction of packets whose checksum matched (0 when there were none)
    pub fn match_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.matched as f64 / self.total as f64
        }
    }
}

/// Score each strategy over the valid packets
///
/// Entries are ranked by match count descending; equal counts keep the order
/// the strategies were given in.
pub fn checksum_survey<'a, I>(
    packets: I,
    strategies: &[Box<dyn ChecksumStrategy>],
) -> Vec<SurveyEntry>
where
    I: IntoIterator<Item = &'a Packet>,
{
    let covered: Vec<(&[u8], u16)> = packets
        .into_iter()
        .filter(|p| p.is_valid())
        .filter_map(|p| p.checksummed_bytes().map(|bytes| (bytes, p.checksum)))
        .collect();

    let mut entries: Vec<_> = strategies
        .iter()
        .map(|strategy| {
            let matched = covered
                .iter()
                .filter(|(bytes, checksum)| strategy.compute(bytes) == *checksum)
                .count();
            debug!(
                "Checksum {}: {}/{} packets match",
                strategy.name(),
                matched,
                covered.len()
            );
            SurveyEntry {
                name: strategy.name(),
                matched,
                total: covered.len(),
            }
        })
        .collect();

    entries.sort_by(|a, b| b.matched.cmp(&a.matched));
    entries
}

impl TrafficAnalyzer {
    /// Score every built-in checksum hypothesis against this capture
    pub fn checksum_survey(&self) -> Vec<SurveyEntry> {
        let strategies: Vec<_> = ChecksumKind::CANDIDATES
            .iter()
            .map(|kind| kind.strategy())
            .collect();
        checksum_survey(self.packets(), &strategies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cl2_protocol::checksum::{Crc16Ccitt, Sum16};
    use cl2_protocol::PacketHeader;

    fn ccitt_packets() -> Vec<Packet> {
        (0u8..8)
            .map(|i| {
                let header = PacketHeader {
                    dest_addr: 0x2001,
                    src_addr: 0x4001,
                    msg_type: i,
                    sequence: i.wrapping_mul(7),
                    extra: [i, 0, 0],
                };
                Packet::build(header, &[i, i + 1, 0x55], &Crc16Ccitt).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_survey_finds_generating_algorithm() {
        let analyzer = TrafficAnalyzer::new(ccitt_packets());
        let survey = analyzer.checksum_survey();
        assert_eq!(survey.len(), ChecksumKind::CANDIDATES.len());
        assert_eq!(survey[0].name, "crc16-ccitt");
        assert_eq!(survey[0].matched, 8);
        assert_eq!(survey[0].match_ratio(), 1.0);
    }

    #[test]
    fn test_survey_skips_errored_packets() {
        let packets = vec![Packet::from_bytes(&[0u8; 3], 0.0)];
        let strategies: Vec<Box<dyn ChecksumStrategy>> = vec![Box::new(Sum16)];
        let survey = checksum_survey(&packets, &strategies);
        assert_eq!(survey[0].total, 0);
        assert_eq!(survey[0].match_ratio(), 0.0);
    }
}
