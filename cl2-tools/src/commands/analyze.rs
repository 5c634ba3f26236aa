//! `cl2 analyze`

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use cl2_analyze::{export_packets, ExportFormat, TrafficAnalyzer};
use cl2_protocol::PacketCodec;
use tracing::info;

use crate::render;
use crate::settings::Settings;

/// Packets listed by an address filter before the rest are summarized
const ADDRESS_LISTING_LIMIT: usize = 50;

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Capture file to analyze
    pub file: PathBuf,

    /// Export packets to a text file
    #[arg(short, long)]
    pub export: Option<PathBuf>,

    /// Export format: hex or parsed
    #[arg(short, long, value_parser = format_arg, default_value = "parsed")]
    pub format: ExportFormat,

    /// Show one packet in detail
    #[arg(short, long)]
    pub packet: Option<usize>,

    /// List packets to or from an address (e.g. 0x2001)
    #[arg(short, long, value_parser = super::address_arg)]
    pub address: Option<u16>,

    /// Checksum hypothesis used to flag mismatches
    #[arg(long, value_parser = super::checksum_arg)]
    pub checksum: Option<cl2_protocol::ChecksumKind>,

    /// Score every checksum hypothesis against the capture
    #[arg(long)]
    pub survey: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

fn format_arg(text: &str) -> Result<ExportFormat, String> {
    match text.to_ascii_lowercase().as_str() {
        "hex" => Ok(ExportFormat::Hex),
        "parsed" => Ok(ExportFormat::Parsed),
        _ => Err(format!("invalid format '{}': expected hex or parsed", text)),
    }
}

pub fn run(args: AnalyzeArgs, settings: &Settings) -> anyhow::Result<()> {
    let kind = args.checksum.unwrap_or(settings.checksum);
    let codec = PacketCodec::with_kind(kind);
    info!("Loading {} (checksum: {})", args.file.display(), codec.checksum().name());

    let analyzer = TrafficAnalyzer::load_capture(&args.file, &codec, settings.analyzer_config())
        .with_context(|| format!("failed to load {}", args.file.display()))?;

    if let Some(index) = args.packet {
        let packet = analyzer.packet(index).with_context(|| {
            format!(
                "invalid packet index {} (capture has {} packets)",
                index,
                analyzer.packets().len()
            )
        })?;
        print!("{}", render::packet_detail(index, packet));
    } else if let Some(addr) = args.address {
        let filtered = analyzer.filter_by_address(addr);
        println!("Packets involving 0x{:04X}:", addr);
        for (i, packet) in filtered.iter().take(ADDRESS_LISTING_LIMIT).enumerate() {
            println!("{}: {}", i, packet.format_header());
        }
        if filtered.len() > ADDRESS_LISTING_LIMIT {
            println!("... and {} more", filtered.len() - ADDRESS_LISTING_LIMIT);
        }
    } else if args.json {
        let report = analyzer.report();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::traffic_summary(&analyzer.report()));
    }

    if args.survey {
        println!();
        print!("{}", render::checksum_survey(&analyzer.checksum_survey()));
    }

    if let Some(path) = &args.export {
        export_packets(analyzer.packets(), path, args.format)
            .with_context(|| format!("failed to export to {}", path.display()))?;
        println!("Exported to: {}", path.display());
    }

    Ok(())
}
