//! ComfortLink II Bus Toolkit
//!
//! Command-line tools for capturing traffic from a ComfortLink II /
//! EnviraCOM HVAC bus and working out its protocol.

mod commands;
mod render;
mod settings;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::analyze::AnalyzeArgs;
use commands::capture::CaptureArgs;
use commands::probe::{BaudArgs, SignalArgs};
use commands::replay::ReplayArgs;
use settings::Settings;

const CRATES: [&str; 5] = ["cl2", "cl2_protocol", "cl2_analyze", "cl2_detect", "cl2_capture"];

#[derive(Debug, Parser)]
#[command(name = "cl2", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Capture raw bus traffic to a file
    Capture(CaptureArgs),
    /// Decode and summarize a capture file
    Analyze(AnalyzeArgs),
    /// Find the bus baud rate by listening at each standard rate
    Baud(BaudArgs),
    /// Classify the physical layer from a logic analyzer export
    Signal(SignalArgs),
    /// Send captured packets back onto the bus
    Replay(ReplayArgs),
    /// List serial ports
    Ports,
    /// Show the settings file, optionally writing the current values to it
    Config {
        #[arg(long)]
        save: bool,
    },
}

fn default_filter(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    CRATES
        .iter()
        .map(|c| format!("{}={}", c, level))
        .collect::<Vec<_>>()
        .join(",")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins unless -v was given
    let filter = if cli.verbose > 0 {
        tracing_subscriber::EnvFilter::new(default_filter(cli.verbose))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| default_filter(0).into())
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = Settings::load();

    match cli.command {
        Command::Capture(args) => commands::capture::run(args, &settings).await,
        Command::Analyze(args) => commands::analyze::run(args, &settings),
        Command::Baud(args) => commands::probe::run_baud(args, &settings).await,
        Command::Signal(args) => commands::probe::run_signal(args, &settings),
        Command::Replay(args) => commands::replay::run(args, &settings).await,
        Command::Ports => commands::probe::run_ports(),
        Command::Config { save } => {
            if save {
                let path = settings.save()?;
                println!("Saved settings to {}", path.display());
            } else {
                match Settings::settings_path() {
                    Some(path) => println!("# {}", path.display()),
                    None => println!("# no settings path available"),
                }
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
            Ok(())
        }
    }
}
