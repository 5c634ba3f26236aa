//! `cl2 baud`, `cl2 signal` and `cl2 ports`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use cl2_detect::{
    analyze_signal, load_csv_samples, BaudRateProber, CsvColumns, PortScanner, SerialSampler,
};

use crate::render;
use crate::settings::Settings;

#[derive(Debug, Args)]
pub struct BaudArgs {
    /// Serial port for the RS-485 adapter
    #[arg(short, long)]
    pub port: Option<String>,

    /// Seconds to listen at each rate
    #[arg(short = 't', long)]
    pub sample_time: Option<f64>,

    /// Try every rate instead of stopping at the first good match
    #[arg(short, long)]
    pub all: bool,
}

pub async fn run_baud(args: BaudArgs, settings: &Settings) -> anyhow::Result<()> {
    let port = args.port.unwrap_or_else(|| settings.port.clone());
    let mut config = settings.probe_config();
    config.exhaustive = args.all;
    if let Some(secs) = args.sample_time {
        config.sample_window = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("invalid sample time {}", secs))?;
    }

    println!(
        "Probing {} ({:.1}s per rate, {} rates)",
        port,
        config.sample_window.as_secs_f64(),
        config.catalog.len()
    );

    let mut sampler = SerialSampler::new(&port);
    let report = BaudRateProber::with_config(config)
        .probe(&mut sampler)
        .await
        .with_context(|| format!("probing {} failed", port))?;

    print!("{}", render::baud_report(&report));
    Ok(())
}

#[derive(Debug, Args)]
pub struct SignalArgs {
    /// Logic analyzer CSV export
    pub file: PathBuf,

    /// Column holding sample time in seconds
    #[arg(long, default_value_t = 0)]
    pub time_col: usize,

    /// Column holding the channel value
    #[arg(long, default_value_t = 1)]
    pub data_col: usize,

    /// Logic threshold
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Mains frequency in Hz
    #[arg(long)]
    pub ac_freq: Option<f64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run_signal(args: SignalArgs, settings: &Settings) -> anyhow::Result<()> {
    let columns = CsvColumns {
        time: args.time_col,
        data: args.data_col,
    };
    let samples = load_csv_samples(&args.file, columns)
        .with_context(|| format!("failed to load {}", args.file.display()))?;

    let threshold = args.threshold.unwrap_or(settings.logic_threshold);
    let ac_freq = args.ac_freq.unwrap_or(settings.ac_frequency);
    let report = analyze_signal(&samples, threshold, ac_freq);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::signal_report(&report));
    }
    Ok(())
}

pub fn run_ports() -> anyhow::Result<()> {
    let ports = PortScanner::new().enumerate_ports()?;
    print!("{}", render::ports(&ports));
    Ok(())
}
