//! Traffic statistics over decoded packets
//!
//! A [`TrafficAnalyzer`] owns the packet set of one analysis run. Statistics
//! are computed once at construction; every query afterwards is a pure read.
//! Packets with a parse error are kept for raw inspection but never counted.
//!
//! All rankings are deterministic: ties in count are broken by ascending key.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;

use cl2_protocol::{read_capture_file, Packet, PacketCodec};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::AnalyzeError;

/// Default number of conversations surfaced by [`TrafficAnalyzer::conversations`]
pub const DEFAULT_TOP_CONVERSATIONS: usize = 20;
/// Default payload prefix length for pattern mining
pub const DEFAULT_PREFIX_LEN: usize = 4;
/// Default minimum occurrences for a prefix to be reported
pub const DEFAULT_MIN_OCCURRENCES: usize = 3;

/// Analyzer configuration
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzerConfig {
    /// Conversations surfaced in rankings and reports
    pub top_conversations: usize,
    /// Prefix length used by the report's pattern section
    pub prefix_len: usize,
    /// Minimum prefix count used by the report's pattern section
    pub min_occurrences: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            top_conversations: DEFAULT_TOP_CONVERSATIONS,
            prefix_len: DEFAULT_PREFIX_LEN,
            min_occurrences: DEFAULT_MIN_OCCURRENCES,
        }
    }
}

/// Ordered `(source, destination)` address pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConversationKey {
    pub src_addr: u16,
    pub dest_addr: u16,
}

impl ConversationKey {
    pub fn new(src_addr: u16, dest_addr: u16) -> Self {
        Self {
            src_addr,
            dest_addr,
        }
    }

    pub fn of(packet: &Packet) -> Self {
        Self::new(packet.src_addr, packet.dest_addr)
    }
}

/// Packets exchanged under one conversation key, in capture order
#[derive(Debug, Clone)]
pub struct ConversationStats<'a> {
    pub key: ConversationKey,
    pub packets: Vec<&'a Packet>,
}

impl ConversationStats<'_> {
    pub fn count(&self) -> usize {
        self.packets.len()
    }
}

/// A counted value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frequency<K> {
    pub value: K,
    pub count: usize,
}

/// A repeated payload prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefixPattern {
    pub prefix: Vec<u8>,
    pub count: usize,
}

/// Conversation summary used in reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    pub key: ConversationKey,
    pub count: usize,
    /// Distinct message types seen in this conversation, ascending
    pub message_types: Vec<u8>,
}

/// Summary of one analysis run
#[derive(Debug, Clone, Serialize)]
pub struct TrafficReport {
    pub total_packets: usize,
    pub valid_packets: usize,
    pub error_packets: usize,
    pub addresses: Vec<Frequency<u16>>,
    pub message_types: Vec<Frequency<u8>>,
    pub conversations: Vec<ConversationSummary>,
    pub patterns: Vec<PrefixPattern>,
}

/// Rank a counter by count descending, key ascending
fn ranked<K: Ord + Copy + Hash>(counter: &HashMap<K, usize>) -> Vec<Frequency<K>> {
    let mut entries: Vec<_> = counter
        .iter()
        .map(|(&value, &count)| Frequency { value, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then(a.value.cmp(&b.value)));
    entries
}

/// Address, message type and conversation statistics for one capture
pub struct TrafficAnalyzer {
    config: AnalyzerConfig,
    packets: Vec<Packet>,
    addresses: HashMap<u16, usize>,
    message_types: HashMap<u8, usize>,
    /// Indices into `packets`, in capture order
    conversations: HashMap<ConversationKey, Vec<usize>>,
}

impl TrafficAnalyzer {
    /// Analyze packets with the default configuration
    pub fn new(packets: Vec<Packet>) -> Self {
        Self::with_config(packets, AnalyzerConfig::default())
    }

    pub fn with_config(packets: Vec<Packet>, config: AnalyzerConfig) -> Self {
        let mut addresses = HashMap::new();
        let mut message_types = HashMap::new();
        let mut conversations: HashMap<ConversationKey, Vec<usize>> = HashMap::new();

        for (index, packet) in packets.iter().enumerate() {
            if !packet.is_valid() {
                continue;
            }
            *addresses.entry(packet.src_addr).or_insert(0) += 1;
            *addresses.entry(packet.dest_addr).or_insert(0) += 1;
            *message_types.entry(packet.msg_type).or_insert(0) += 1;
            conversations
                .entry(ConversationKey::of(packet))
                .or_default()
                .push(index);
        }

        debug!(
            "Analyzed {} packets: {} addresses, {} message types, {} conversations",
            packets.len(),
            addresses.len(),
            message_types.len(),
            conversations.len()
        );

        Self {
            config,
            packets,
            addresses,
            message_types,
            conversations,
        }
    }

    /// Load and decode a capture file
    pub fn load_capture(
        path: impl AsRef<Path>,
        codec: &PacketCodec,
        config: AnalyzerConfig,
    ) -> Result<Self, AnalyzeError> {
        let path = path.as_ref();
        let frames = read_capture_file(path)?;
        info!("Loaded {} frames from {}", frames.len(), path.display());
        Ok(Self::with_config(codec.decode_all(frames), config))
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Every packet, including those with parse errors
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// Packet by capture index
    pub fn packet(&self, index: usize) -> Option<&Packet> {
        self.packets.get(index)
    }

    /// Packets that decoded without structural errors
    pub fn valid_packets(&self) -> impl Iterator<Item = &Packet> {
        self.packets.iter().filter(|p| p.is_valid())
    }

    /// Address occurrence counts (source and destination both count)
    pub fn address_frequencies(&self) -> Vec<Frequency<u16>> {
        ranked(&self.addresses)
    }

    /// Message type occurrence counts
    pub fn message_type_frequencies(&self) -> Vec<Frequency<u8>> {
        ranked(&self.message_types)
    }

    fn stats_for(&self, key: ConversationKey, indices: &[usize]) -> ConversationStats<'_> {
        ConversationStats {
            key,
            packets: indices.iter().map(|&i| &self.packets[i]).collect(),
        }
    }

    /// Every conversation, ranked by packet count descending, key ascending
    pub fn all_conversations(&self) -> Vec<ConversationStats<'_>> {
        let mut keys: Vec<_> = self.conversations.iter().collect();
        keys.sort_by(|(ka, a), (kb, b)| b.len().cmp(&a.len()).then(ka.cmp(kb)));
        keys.into_iter()
            .map(|(&key, indices)| self.stats_for(key, indices))
            .collect()
    }

    /// The top conversations, limited by `top_conversations`
    pub fn conversations(&self) -> Vec<ConversationStats<'_>> {
        let mut all = self.all_conversations();
        all.truncate(self.config.top_conversations);
        all
    }

    /// Look up a single conversation
    pub fn conversation(&self, key: ConversationKey) -> Option<ConversationStats<'_>> {
        self.conversations
            .get(&key)
            .map(|indices| self.stats_for(key, indices))
    }

    /// Payload prefixes of `prefix_len` bytes seen at least `min_occurrences` times
    ///
    /// Only packets with at least `prefix_len` payload bytes contribute. A zero
    /// `prefix_len` yields nothing.
    pub fn payload_prefix_patterns(
        &self,
        prefix_len: usize,
        min_occurrences: usize,
    ) -> Vec<PrefixPattern> {
        if prefix_len == 0 {
            return Vec::new();
        }

        let mut counts: HashMap<&[u8], usize> = HashMap::new();
        for packet in self.valid_packets() {
            if packet.payload.len() >= prefix_len {
                *counts.entry(&packet.payload[..prefix_len]).or_insert(0) += 1;
            }
        }

        let mut patterns: Vec<_> = counts
            .into_iter()
            .filter(|&(_, count)| count >= min_occurrences)
            .map(|(prefix, count)| PrefixPattern {
                prefix: prefix.to_vec(),
                count,
            })
            .collect();
        patterns.sort_by(|a, b| b.count.cmp(&a.count).then(a.prefix.cmp(&b.prefix)));
        patterns
    }

    /// Valid packets where `addr` is either endpoint, in capture order
    pub fn filter_by_address(&self, addr: u16) -> Vec<&Packet> {
        self.valid_packets()
            .filter(|p| p.src_addr == addr || p.dest_addr == addr)
            .collect()
    }

    /// Summarize the run using the configured limits
    pub fn report(&self) -> TrafficReport {
        let valid_packets = self.valid_packets().count();
        let conversations = self
            .conversations()
            .into_iter()
            .map(|conv| {
                let mut message_types: Vec<u8> = conv.packets.iter().map(|p| p.msg_type).collect();
                message_types.sort_unstable();
                message_types.dedup();
                ConversationSummary {
                    key: conv.key,
                    count: conv.count(),
                    message_types,
                }
            })
            .collect();

        TrafficReport {
            total_packets: self.packets.len(),
            valid_packets,
            error_packets: self.packets.len() - valid_packets,
            addresses: self.address_frequencies(),
            message_types: self.message_type_frequencies(),
            conversations,
            patterns: self
                .payload_prefix_patterns(self.config.prefix_len, self.config.min_occurrences),
        }
    }
}

/// Analyze a packet set with the default configuration
pub fn analyze(packets: Vec<Packet>) -> TrafficReport {
    TrafficAnalyzer::new(packets).report()
}
