//! Packet log export

use std::fs;
use std::path::Path;

use cl2_protocol::Packet;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AnalyzeError;

/// Export line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// One line of raw hex per packet
    Hex,
    /// Decoded header and payload per packet
    #[default]
    Parsed,
}

/// Format one packet for export
pub fn format_entry(index: usize, packet: &Packet, format: ExportFormat) -> String {
    match format {
        ExportFormat::Hex => format!(
            "{:5} [{:10.3}] {}\n",
            index,
            packet.timestamp,
            packet.to_hex(" ")
        ),
        ExportFormat::Parsed => format!("{:5} [{:10.3}] {}\n\n", index, packet.timestamp, packet),
    }
}

/// Format every packet, errored ones included
pub fn format_packets(packets: &[Packet], format: ExportFormat) -> String {
    packets
        .iter()
        .enumerate()
        .map(|(i, p)| format_entry(i, p, format))
        .collect()
}

/// Write the export to `path`
pub fn export_packets(
    packets: &[Packet],
    path: impl AsRef<Path>,
    format: ExportFormat,
) -> Result<(), AnalyzeError> {
    let path = path.as_ref();
    fs::write(path, format_packets(packets, format))?;
    info!("Exported {} packets to {}", packets.len(), path.display());
    Ok(())
}
