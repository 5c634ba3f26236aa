//! `cl2 capture`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use cl2_capture::{CaptureSession, Parity};

use crate::render;
use crate::settings::Settings;

#[derive(Debug, Args)]
pub struct CaptureArgs {
    /// Serial port for the RS-485 adapter
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Output directory for captures
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Silence in milliseconds that ends a packet
    #[arg(long)]
    pub quiet_ms: Option<u64>,

    #[arg(long)]
    pub data_bits: Option<u8>,

    /// N, E or O
    #[arg(long)]
    pub parity: Option<Parity>,

    #[arg(long)]
    pub stop_bits: Option<u8>,
}

pub async fn run(args: CaptureArgs, settings: &Settings) -> anyhow::Result<()> {
    let mut serial = settings.serial_settings();
    if let Some(port) = args.port {
        serial.port = port;
    }
    if let Some(baud) = args.baud {
        serial.baud_rate = baud;
    }
    if let Some(bits) = args.data_bits {
        serial.data_bits = bits;
    }
    if let Some(parity) = args.parity {
        serial.parity = parity;
    }
    if let Some(bits) = args.stop_bits {
        serial.stop_bits = bits;
    }

    let mut segmenter = settings.segmenter_config();
    if let Some(ms) = args.quiet_ms {
        segmenter.quiet_interval = Duration::from_millis(ms);
    }

    let output = args.output.unwrap_or_else(|| settings.output_dir.clone());
    let port = serial.port.clone();
    let session = CaptureSession::new(serial, segmenter, &output);

    println!("Capturing from {}... Press Ctrl+C to stop", port);
    let summary = session
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("capture failed")?;

    print!("{}", render::capture_summary(&summary));
    Ok(())
}
