//! ComfortLink II Traffic Analysis
//!
//! Aggregates decoded packets into the statistics used to form and test
//! protocol hypotheses:
//!
//! - **Addresses**: who talks on the bus, counted as source and destination
//! - **Message types**: how often each type byte appears
//! - **Conversations**: packets grouped by `(source, destination)`
//! - **Patterns**: payload prefixes that repeat across packets
//! - **Checksum survey**: which checksum hypothesis explains the capture
//!
//! # Example
//!
//! ```rust
//! use cl2_analyze::TrafficAnalyzer;
//! use cl2_protocol::Packet;
//!
//! let packets = vec![
//!     Packet::from_bytes(&[0x20, 0x01, 0x40, 0x01, 0x01, 0, 0, 0, 0, 0, 0, 0], 0.0),
//!     Packet::from_bytes(&[0x40, 0x01, 0x20, 0x01, 0x02, 0, 0, 0, 0, 0, 0, 0], 0.1),
//! ];
//!
//! let analyzer = TrafficAnalyzer::new(packets);
//! let top = &analyzer.address_frequencies()[0];
//! assert_eq!((top.value, top.count), (0x2001, 2));
//! ```

pub mod error;
pub mod export;
pub mod survey;
pub mod traffic;

pub use error::AnalyzeError;
pub use export::{export_packets, format_packets, ExportFormat};
pub use survey::{checksum_survey, SurveyEntry};
pub use traffic::{
    analyze, AnalyzerConfig, ConversationKey, ConversationStats, ConversationSummary, Frequency,
    PrefixPattern, TrafficAnalyzer, TrafficReport,
};
