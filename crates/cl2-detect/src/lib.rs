//! ComfortLink II Bus Detection
//!
//! Tools for getting onto an unknown bus:
//!
//! - [`BaudRateProber`]: listen at each standard rate and score the bytes
//! - [`classify_signal`]: tell EnviraCOM from RS-485 using a logic analyzer trace
//! - [`PortScanner`]: list candidate serial adapters
//!
//! # Example
//!
//! ```rust
//! use cl2_detect::{classify_signal, PhysicalLayer};
//!
//! // A 120 baud square wave, sampled every 0.5ms
//! let samples: Vec<(f64, f64)> = (0..400)
//!     .map(|i| {
//!         let t = i as f64 * 0.0005;
//!         let high = ((t * 120.0) as u64) % 2 == 1;
//!         (t, if high { 3.3 } else { 0.0 })
//!     })
//!     .collect();
//!
//! let classification = classify_signal(&samples, 1.5, 60.0);
//! assert_eq!(classification.kind, PhysicalLayer::EnviraCom);
//! ```

pub mod baud;
pub mod error;
pub mod samples;
pub mod scanner;
pub mod signal;

pub use baud::{
    analyze_data_quality, probe_baud_rates, BaudCandidate, BaudRateProber, BaudSampler,
    CannedSampler, DataQuality, ProbeConfig, ProbeReport, SerialSampler, BAUD_CATALOG,
    LOW_CONFIDENCE_SCORE,
};
pub use error::{DetectError, SignalError};
pub use samples::{load_csv_samples, parse_csv_samples, CsvColumns};
pub use scanner::{AdapterChip, PortScanner, SerialPortInfo};
pub use signal::{
    analyze_pulse_widths, analyze_signal, check_ac_synchronization, classify_physical_layer,
    classify_signal, find_edges, AcSyncResult, Classification, Edge, EdgeKind, PhysicalLayer,
    PulseAnalysis, SignalReport,
};
