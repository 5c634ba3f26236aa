//! `cl2 replay`

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;
use cl2_capture::Replayer;
use cl2_protocol::display::hex_string;

use crate::settings::Settings;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Capture file to replay from
    pub file: PathBuf,

    /// Serial port for the RS-485 adapter
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Replay a single packet by index
    #[arg(short = 'n', long, conflicts_with_all = ["start", "end"])]
    pub packet: Option<usize>,

    /// First packet of a sequence
    #[arg(long, default_value_t = 0)]
    pub start: usize,

    /// End of a sequence (exclusive); defaults to the end of the capture
    #[arg(long)]
    pub end: Option<usize>,

    /// Send back-to-back instead of with the captured gaps
    #[arg(long)]
    pub no_timing: bool,

    /// Show what would be sent without opening the port
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

pub async fn run(args: ReplayArgs, settings: &Settings) -> anyhow::Result<()> {
    let replayer = Replayer::load(&args.file)
        .with_context(|| format!("failed to load {}", args.file.display()))?;

    println!("WARNING: Replaying packets can affect HVAC operation.");
    println!("Only replay packets you understand.\n");

    if args.dry_run {
        if let Some(index) = args.packet {
            let frame = replayer.frame(index)?;
            println!("Would send: {}", hex_string(frame.data(), " "));
        } else {
            let range = replayer.range(args.start, args.end)?;
            let preview = replayer.preview(range)?;
            if preview.range.is_empty() {
                println!("Nothing to replay");
            } else {
                println!(
                    "Would replay packets {} to {}",
                    preview.range.start,
                    preview.range.end - 1
                );
            }
            for line in &preview.lines {
                println!("  {}: {}", line.index, line.hex);
            }
            if preview.remaining > 0 {
                println!("  ... and {} more", preview.remaining);
            }
        }
        return Ok(());
    }

    // Validate before prompting
    let range = match args.packet {
        Some(index) => {
            replayer.frame(index)?;
            index..index + 1
        }
        None => replayer.range(args.start, args.end)?,
    };

    if !args.yes && !confirm("Are you sure you want to send packets to the bus?")? {
        bail!("aborted");
    }

    let mut serial = settings.serial_settings();
    if let Some(port) = args.port {
        serial.port = port;
    }
    if let Some(baud) = args.baud {
        serial.baud_rate = baud;
    }
    let mut stream = serial.open()?;

    match args.packet {
        Some(index) => {
            replayer.replay_single(index, &mut stream).await?;
            println!("Sent");
        }
        None => {
            let sent = replayer
                .replay_sequence(range, !args.no_timing, &mut stream)
                .await?;
            println!("Sequence complete ({} packets)", sent);
        }
    }
    Ok(())
}
