//! Baud rate probing
//!
//! Listens on the bus at each candidate rate for a fixed window and scores
//! the received bytes. At the wrong rate a UART produces framing garbage,
//! typically dominated by 0x00 and 0xFF; at the right rate periodic bus
//! traffic shows up as repeated byte runs.
//!
//! # Scoring
//!
//! ```text
//! score = 50
//!       - 30  if (count(0x00) + count(0xFF)) / total > 0.3
//!       + 20  if 0.05 < printable_ratio < 0.5
//!       + 30  if some run of 10/12/14/16 bytes repeats immediately
//! clamped to 0..=100; an empty sample scores 0
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::time::{timeout, Instant};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, trace, warn};

use crate::error::DetectError;

/// Rates to try, in probe order (most likely first)
pub const BAUD_CATALOG: [u32; 8] = [9600, 19200, 38400, 57600, 115200, 4800, 2400, 1200];

/// Score at which probing stops unless exhaustive probing was requested
pub const EARLY_STOP_SCORE: u8 = 80;

/// Scores below this are too weak to act on without confirmation
pub const LOW_CONFIDENCE_SCORE: u8 = 50;

/// Run lengths checked for immediate repetition (common packet sizes)
const PATTERN_LENGTHS: [usize; 4] = [10, 12, 14, 16];

/// Heuristic quality of a byte sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQuality {
    pub score: u8,
    pub reason: String,
    pub printable_ratio: f64,
    pub noise_ratio: f64,
    pub has_repeating_pattern: bool,
}

/// True when some run of a typical packet length is immediately repeated
pub fn has_repeating_pattern(data: &[u8]) -> bool {
    PATTERN_LENGTHS.iter().any(|&len| {
        data.windows(len * 2)
            .any(|window| window[..len] == window[len..])
    })
}

/// Score a byte sample
pub fn analyze_data_quality(data: &[u8]) -> DataQuality {
    if data.is_empty() {
        return DataQuality {
            score: 0,
            reason: "no data received".to_string(),
            printable_ratio: 0.0,
            noise_ratio: 0.0,
            has_repeating_pattern: false,
        };
    }

    let total = data.len() as f64;
    let printable = data.iter().filter(|&&b| (32..127).contains(&b)).count();
    let noise = data.iter().filter(|&&b| b == 0x00 || b == 0xFF).count();
    let printable_ratio = printable as f64 / total;
    let noise_ratio = noise as f64 / total;
    let has_patterns = has_repeating_pattern(data);

    let noisy = noise_ratio > 0.3;
    let some_ascii = printable_ratio > 0.05 && printable_ratio < 0.5;

    let mut score: i32 = 50;
    let mut reasons = Vec::new();
    if noisy {
        score -= 30;
        reasons.push(format!(
            "High noise ({:.0}% 0x00/0xFF)",
            noise_ratio * 100.0
        ));
    }
    if has_patterns {
        score += 30;
        reasons.push("Repeating patterns found".to_string());
    }
    if some_ascii {
        score += 20;
        reasons.push(format!("Some ASCII ({:.0}%)", printable_ratio * 100.0));
    }

    DataQuality {
        score: score.clamp(0, 100) as u8,
        reason: if reasons.is_empty() {
            "Inconclusive".to_string()
        } else {
            reasons.join(", ")
        },
        printable_ratio,
        noise_ratio,
        has_repeating_pattern: has_patterns,
    }
}

/// Result of listening at one baud rate
#[derive(Debug, Clone, Serialize)]
pub struct BaudCandidate {
    pub baud_rate: u32,
    pub byte_count: usize,
    pub sample_bytes: Vec<u8>,
    /// 0..=100
    pub score: u8,
    pub reason: String,
    pub printable_ratio: f64,
    pub noise_ratio: f64,
    pub has_repeating_pattern: bool,
}

impl BaudCandidate {
    /// Score the bytes received at `baud_rate`
    pub fn evaluate(baud_rate: u32, sample_bytes: Vec<u8>) -> Self {
        let quality = analyze_data_quality(&sample_bytes);
        Self {
            baud_rate,
            byte_count: sample_bytes.len(),
            sample_bytes,
            score: quality.score,
            reason: quality.reason,
            printable_ratio: quality.printable_ratio,
            noise_ratio: quality.noise_ratio,
            has_repeating_pattern: quality.has_repeating_pattern,
        }
    }

    pub fn is_low_confidence(&self) -> bool {
        self.score < LOW_CONFIDENCE_SCORE
    }
}

/// Source of raw bytes received at a given baud rate
///
/// Each call owns the underlying port for the whole window; trials never
/// overlap.
pub trait BaudSampler {
    fn sample(
        &mut self,
        baud_rate: u32,
        window: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, DetectError>> + Send;
}

/// Samples a real serial port, reopening it at each rate
#[derive(Debug, Clone)]
pub struct SerialSampler {
    port: String,
}

impl SerialSampler {
    pub fn new(port: impl Into<String>) -> Self {
        Self { port: port.into() }
    }
}

impl BaudSampler for SerialSampler {
    fn sample(
        &mut self,
        baud_rate: u32,
        window: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, DetectError>> + Send {
        let port = self.port.clone();
        async move { sample_port(&port, baud_rate, window).await }
    }
}

/// Listen on `port` at `baud_rate` (8N1) for `window`
pub async fn sample_port(
    port: &str,
    baud_rate: u32,
    window: Duration,
) -> Result<Vec<u8>, DetectError> {
    debug!("Sampling {} at {} baud for {:?}", port, baud_rate, window);

    let mut stream = tokio_serial::new(port, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .timeout(Duration::from_millis(100))
        .open_native_async()
        .map_err(|e| DetectError::OpenFailed {
            port: port.to_string(),
            baud: baud_rate,
            reason: e.to_string(),
        })?;

    let deadline = Instant::now() + window;
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        match timeout(deadline - now, stream.read(&mut buf)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                trace!("{} baud: {:02X?}", baud_rate, &buf[..n]);
                data.extend_from_slice(&buf[..n]);
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Ok(Err(e)) => {
                return Err(DetectError::IoError {
                    port: port.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => break,
        }
    }

    Ok(data)
}

/// Replays pre-recorded samples, e.g. dumps taken with another tool
#[derive(Debug, Clone, Default)]
pub struct CannedSampler {
    samples: HashMap<u32, Vec<u8>>,
    requested: Vec<u32>,
}

impl CannedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes returned when `baud_rate` is sampled
    pub fn with_sample(mut self, baud_rate: u32, data: impl Into<Vec<u8>>) -> Self {
        self.samples.insert(baud_rate, data.into());
        self
    }

    /// Rates sampled so far, in order
    pub fn requested(&self) -> &[u32] {
        &self.requested
    }
}

impl BaudSampler for CannedSampler {
    fn sample(
        &mut self,
        baud_rate: u32,
        _window: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, DetectError>> + Send {
        self.requested.push(baud_rate);
        let data = self.samples.get(&baud_rate).cloned().unwrap_or_default();
        async move { Ok(data) }
    }
}

/// Configuration for probing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Rates to try, in order
    pub catalog: Vec<u32>,
    /// Listening time per rate
    pub sample_window: Duration,
    /// Score every rate instead of stopping at the first good match
    pub exhaustive: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            catalog: BAUD_CATALOG.to_vec(),
            sample_window: Duration::from_secs(2),
            exhaustive: false,
        }
    }
}

/// Outcome of a probing run
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    /// Candidates in probe order, including rates that received nothing
    pub candidates: Vec<BaudCandidate>,
    /// True when probing stopped at a good match before the catalog ran out
    pub stopped_early: bool,
}

impl ProbeReport {
    /// Candidates by score descending; equal scores keep probe order
    pub fn ranked(&self) -> Vec<&BaudCandidate> {
        let mut ranked: Vec<_> = self.candidates.iter().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
    }

    /// Highest-scoring candidate that received any data
    pub fn best(&self) -> Option<&BaudCandidate> {
        self.ranked().into_iter().find(|c| c.byte_count > 0)
    }
}

/// Baud rate prober
pub struct BaudRateProber {
    config: ProbeConfig,
}

impl BaudRateProber {
    /// Create a new prober with default configuration
    pub fn new() -> Self {
        Self {
            config: ProbeConfig::default(),
        }
    }

    /// Create a prober with custom configuration
    pub fn with_config(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Sample and score each catalog rate in order
    ///
    /// A sampler failure aborts the run: it means the port is unusable, not
    /// that the rate is wrong.
    pub async fn probe<S: BaudSampler>(&self, sampler: &mut S) -> Result<ProbeReport, DetectError> {
        let mut candidates = Vec::with_capacity(self.config.catalog.len());
        let mut stopped_early = false;

        for (i, &baud) in self.config.catalog.iter().enumerate() {
            let data = sampler.sample(baud, self.config.sample_window).await?;
            let candidate = BaudCandidate::evaluate(baud, data);

            if candidate.byte_count == 0 {
                info!("{:6} baud: no data", baud);
            } else {
                info!(
                    "{:6} baud: {:5} bytes, score {:3} ({})",
                    baud, candidate.byte_count, candidate.score, candidate.reason
                );
            }

            let good_enough = candidate.score >= EARLY_STOP_SCORE;
            candidates.push(candidate);

            if good_enough && !self.config.exhaustive {
                info!("Good match found at {} baud", baud);
                stopped_early = i + 1 < self.config.catalog.len();
                break;
            }
        }

        let report = ProbeReport {
            candidates,
            stopped_early,
        };

        match report.best() {
            Some(best) if best.is_low_confidence() => warn!(
                "Best match {} baud has low confidence (score {}); consider measuring the bit period with a scope",
                best.baud_rate, best.score
            ),
            Some(_) => {}
            None => warn!("No data received at any baud rate"),
        }

        Ok(report)
    }
}

impl Default for BaudRateProber {
    fn default() -> Self {
        Self::new()
    }
}

/// Probe `catalog` in order with `sampler`
pub async fn probe_baud_rates<S: BaudSampler>(
    sampler: &mut S,
    catalog: &[u32],
    exhaustive: bool,
) -> Result<ProbeReport, DetectError> {
    let config = ProbeConfig {
        catalog: catalog.to_vec(),
        exhaustive,
        ..Default::default()
    };
    BaudRateProber::with_config(config).probe(sampler).await
}
