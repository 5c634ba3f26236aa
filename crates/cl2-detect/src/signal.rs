//! Physical layer classification from logic analyzer traces
//!
//! EnviraCOM signals at 120 baud by pulling the 24VAC line in step with the
//! mains, so its bit cells are ~8.33ms and its edges land at a fixed phase
//! of each AC half-cycle. RS-485 signalling runs at kilobaud rates with bit
//! cells well under a millisecond.

use serde::Serialize;
use tracing::debug;

use crate::error::SignalError;

/// EnviraCOM bit rate
pub const ENVIRACOM_BAUD: u32 = 120;

/// Minimum edges for an AC synchronization check
pub const MIN_SYNC_EDGES: usize = 10;

/// Phase variance below which edges count as mains-synchronized
pub const SYNC_VARIANCE_THRESHOLD: f64 = 0.1;

/// Phases this close below 1.0 wrap to 0.0
pub const PHASE_WRAP_EPSILON: f64 = 1e-9;

/// Standard rates and their bit periods in milliseconds
const RS485_BIT_PERIODS_MS: [(u32, f64); 5] = [
    (9600, 0.104),
    (19200, 0.052),
    (38400, 0.026),
    (57600, 0.017),
    (115200, 0.0087),
];

/// Direction of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Rising,
    Falling,
}

/// A logic transition: `level` is the new level after `time` (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Edge {
    pub time: f64,
    pub level: bool,
}

impl Edge {
    pub fn kind(&self) -> EdgeKind {
        if self.level {
            EdgeKind::Rising
        } else {
            EdgeKind::Falling
        }
    }
}

/// Find logic transitions in `(time, value)` samples
///
/// A sample is high when its value exceeds `threshold`. The initial level
/// is taken from the first sample and produces no edge.
pub fn find_edges(samples: &[(f64, f64)], threshold: f64) -> Vec<Edge> {
    let Some(&(_, first)) = samples.first() else {
        return Vec::new();
    };

    let mut level = first > threshold;
    let mut edges = Vec::new();
    for &(time, value) in &samples[1..] {
        let high = value > threshold;
        if high != level {
            edges.push(Edge { time, level: high });
            level = high;
        }
    }
    edges
}

/// Statistics over the intervals between consecutive edges (seconds)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PulseAnalysis {
    pub widths: Vec<f64>,
    pub min_width: f64,
    pub max_width: f64,
    pub mean_width: f64,
    pub median_width: f64,
    /// `1 / min_width`, or 0 when the shortest interval is not positive
    pub estimated_baud: f64,
}

impl PulseAnalysis {
    pub fn min_width_ms(&self) -> f64 {
        self.min_width * 1000.0
    }

    pub fn max_width_ms(&self) -> f64 {
        self.max_width * 1000.0
    }

    pub fn mean_width_ms(&self) -> f64 {
        self.mean_width * 1000.0
    }

    pub fn median_width_ms(&self) -> f64 {
        self.median_width * 1000.0
    }
}

/// Measure pulse widths; the shortest one approximates a single bit cell
pub fn analyze_pulse_widths(edges: &[Edge]) -> Result<PulseAnalysis, SignalError> {
    if edges.len() < 2 {
        return Err(SignalError::NotEnoughEdges {
            found: edges.len(),
            required: 2,
        });
    }

    let widths: Vec<f64> = edges.windows(2).map(|w| w[1].time - w[0].time).collect();

    let min_width = widths.iter().copied().fold(f64::INFINITY, f64::min);
    let max_width = widths.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean_width = widths.iter().sum::<f64>() / widths.len() as f64;

    let mut sorted = widths.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    let median_width = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    let estimated_baud = if min_width > 0.0 { 1.0 / min_width } else { 0.0 };

    Ok(PulseAnalysis {
        widths,
        min_width,
        max_width,
        mean_width,
        median_width,
        estimated_baud,
    })
}

/// Candidate physical layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PhysicalLayer {
    /// 120 baud, AC-synchronized, on the 24VAC control wiring
    EnviraCom,
    /// Differential serial at standard UART rates
    Rs485,
    Unknown,
}

impl std::fmt::Display for PhysicalLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhysicalLayer::EnviraCom => write!(f, "EnviraCOM"),
            PhysicalLayer::Rs485 => write!(f, "RS-485"),
            PhysicalLayer::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub kind: PhysicalLayer,
    /// 0..=100
    pub confidence: u8,
    pub reason: String,
    pub estimated_baud: Option<u32>,
}

/// Standard rate whose bit period is closest to `bit_ms`
fn nearest_standard_baud(bit_ms: f64) -> u32 {
    RS485_BIT_PERIODS_MS
        .iter()
        .min_by(|a, b| (a.1 - bit_ms).abs().total_cmp(&(b.1 - bit_ms).abs()))
        .map(|&(baud, _)| baud)
        .unwrap_or(9600)
}

/// Classify the physical layer from measured pulse widths
pub fn classify_physical_layer(analysis: &PulseAnalysis) -> Classification {
    let min_ms = analysis.min_width_ms();

    if min_ms > 6.0 && min_ms < 12.0 {
        Classification {
            kind: PhysicalLayer::EnviraCom,
            confidence: 90,
            reason: format!(
                "Bit period {:.2}ms matches EnviraCOM ({} baud, 8.33ms)",
                min_ms, ENVIRACOM_BAUD
            ),
            estimated_baud: Some(ENVIRACOM_BAUD),
        }
    } else if min_ms < 1.0 {
        let baud = nearest_standard_baud(min_ms);
        Classification {
            kind: PhysicalLayer::Rs485,
            confidence: 80,
            reason: format!(
                "Bit period {:.3}ms suggests RS-485 at ~{} baud",
                min_ms, baud
            ),
            estimated_baud: Some(baud),
        }
    } else {
        Classification {
            kind: PhysicalLayer::Unknown,
            confidence: 30,
            reason: format!(
                "Bit period {:.2}ms does not match known protocols",
                min_ms
            ),
            estimated_baud: Some(analysis.estimated_baud as u32),
        }
    }
}

/// Classify a trace from raw samples
///
/// EnviraCOM classifications note whether the edges follow the
/// `ac_frequency` mains phase.
pub fn classify_signal(
    samples: &[(f64, f64)],
    threshold: f64,
    ac_frequency: f64,
) -> Classification {
    analyze_signal(samples, threshold, ac_frequency).classification
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcSyncResult {
    pub synchronized: bool,
    /// Variance of edge phase within the AC half-cycle; absent with too few edges
    pub phase_variance: Option<f64>,
    pub ac_frequency: f64,
    pub reason: String,
}

/// Check whether edges hold a fixed phase relative to the AC half-cycle
///
/// An edge's phase is `(time mod half_period) / half_period`. Remainders
/// within [`PHASE_WRAP_EPSILON`] of a full half-cycle are floating-point
/// error on an exact multiple and count as phase 0.
pub fn check_ac_synchronization(edges: &[Edge], ac_frequency: f64) -> AcSyncResult {
    if edges.len() < MIN_SYNC_EDGES {
        return AcSyncResult {
            synchronized: false,
            phase_variance: None,
            ac_frequency,
            reason: format!(
                "Not enough edges for AC sync analysis (found {}, need {})",
                edges.len(),
                MIN_SYNC_EDGES
            ),
        };
    }

    let half_period = 1.0 / (2.0 * ac_frequency);
    let phases: Vec<f64> = edges
        .iter()
        .map(|e| {
            let phase = e.time.rem_euclid(half_period) / half_period;
            if 1.0 - phase < PHASE_WRAP_EPSILON {
                0.0
            } else {
                phase
            }
        })
        .collect();

    let n = phases.len() as f64;
    let mean = phases.iter().sum::<f64>() / n;
    let variance = phases.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let synchronized = variance < SYNC_VARIANCE_THRESHOLD;

    AcSyncResult {
        synchronized,
        phase_variance: Some(variance),
        ac_frequency,
        reason: if synchronized {
            format!(
                "Edges synchronized with {}Hz AC (phase variance {:.4})",
                ac_frequency, variance
            )
        } else {
            format!(
                "Edges not synchronized with AC (phase variance {:.4})",
                variance
            )
        },
    }
}

/// Full analysis of one trace
#[derive(Debug, Clone, Serialize)]
pub struct SignalReport {
    pub sample_count: usize,
    pub edge_count: usize,
    pub pulses: Option<PulseAnalysis>,
    pub classification: Classification,
    /// Only checked when the trace looks like EnviraCOM
    pub ac_sync: Option<AcSyncResult>,
}

/// Edges, pulse statistics, classification and (for EnviraCOM) AC sync
pub fn analyze_signal(samples: &[(f64, f64)], threshold: f64, ac_frequency: f64) -> SignalReport {
    let edges = find_edges(samples, threshold);
    debug!("Found {} edges in {} samples", edges.len(), samples.len());

    let (pulses, mut classification) = match analyze_pulse_widths(&edges) {
        Ok(analysis) => {
            let classification = classify_physical_layer(&analysis);
            (Some(analysis), classification)
        }
        Err(e) => (
            None,
            Classification {
                kind: PhysicalLayer::Unknown,
                confidence: 0,
                reason: e.to_string(),
                estimated_baud: None,
            },
        ),
    };

    let ac_sync = (classification.kind == PhysicalLayer::EnviraCom)
        .then(|| check_ac_synchronization(&edges, ac_frequency));
    if let Some(sync) = &ac_sync {
        classification.reason = format!("{}; {}", classification.reason, sync.reason);
    }

    SignalReport {
        sample_count: samples.len(),
        edge_count: edges.len(),
        pulses,
        classification,
        ac_sync,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Square wave toggling every `period` seconds, sampled at 10x that rate
    fn square_wave(period: f64, toggles: usize) -> Vec<(f64, f64)> {
        let step = period / 10.0;
        (0..toggles * 10)
            .map(|i| {
                let t = i as f64 * step;
                let high = (i / 10) % 2 == 1;
                (t, if high { 3.3 } else { 0.0 })
            })
            .collect()
    }

    fn edges_at(times: &[f64]) -> Vec<Edge> {
        times
            .iter()
            .enumerate()
            .map(|(i, &time)| Edge {
                time,
                level: i % 2 == 0,
            })
            .collect()
    }

    #[test]
    fn test_find_edges() {
        let samples = [(0.0, 0.0), (1.0, 3.3), (2.0, 3.3), (3.0, 0.1), (4.0, 2.0)];
        let edges = find_edges(&samples, 1.5);
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[0], Edge { time: 1.0, level: true });
        assert_eq!(edges[1].kind(), EdgeKind::Falling);
        assert_eq!(edges[2].time, 4.0);
    }

    #[test]
    fn test_find_edges_threshold_is_exclusive() {
        let samples = [(0.0, 0.0), (1.0, 1.5), (2.0, 1.6)];
        let edges = find_edges(&samples, 1.5);
        assert_eq!(edges, vec![Edge { time: 2.0, level: true }]);
    }

    #[test]
    fn test_find_edges_empty() {
        assert!(find_edges(&[], 1.5).is_empty());
        assert!(find_edges(&[(0.0, 5.0)], 1.5).is_empty());
    }

    #[test]
    fn test_pulse_widths() {
        let edges = edges_at(&[0.0, 0.001, 0.003, 0.006]);
        let analysis = analyze_pulse_widths(&edges).unwrap();
        assert_eq!(analysis.widths.len(), 3);
        assert!((analysis.min_width - 0.001).abs() < 1e-12);
        assert!((analysis.max_width - 0.003).abs() < 1e-12);
        assert!((analysis.median_width - 0.002).abs() < 1e-12);
        assert!((analysis.estimated_baud - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_pulse_widths_needs_two_edges() {
        let err = analyze_pulse_widths(&edges_at(&[0.0])).unwrap_err();
        assert_eq!(
            err,
            SignalError::NotEnoughEdges {
                found: 1,
                required: 2
            }
        );
    }

    #[test]
    fn test_classify_enviracom() {
        let samples = square_wave(1.0 / 120.0, 20);
        let classification = classify_signal(&samples, 1.5, 60.0);
        assert_eq!(classification.kind, PhysicalLayer::EnviraCom);
        assert_eq!(classification.confidence, 90);
        assert_eq!(classification.estimated_baud, Some(120));
    }

    #[test]
    fn test_classify_rs485() {
        let samples = square_wave(0.000052, 20);
        let classification = classify_signal(&samples, 1.5, 60.0);
        assert_eq!(classification.kind, PhysicalLayer::Rs485);
        assert_eq!(classification.confidence, 80);
        assert_eq!(classification.estimated_baud, Some(19200));
    }

    #[test]
    fn test_classify_unknown() {
        let samples = square_wave(0.003, 20);
        let classification = classify_signal(&samples, 1.5, 60.0);
        assert_eq!(classification.kind, PhysicalLayer::Unknown);
        assert_eq!(classification.confidence, 30);
        assert_eq!(classification.estimated_baud, Some(333));
    }

    #[test]
    fn test_classify_flat_trace() {
        let samples: Vec<_> = (0..100).map(|i| (i as f64, 0.0)).collect();
        let classification = classify_signal(&samples, 1.5, 60.0);
        assert_eq!(classification.kind, PhysicalLayer::Unknown);
        assert_eq!(classification.confidence, 0);
        assert_eq!(classification.estimated_baud, None);
    }

    #[test]
    fn test_ac_sync_on_half_cycle_multiples() {
        let times: Vec<f64> = (0..20).map(|i| f64::from(i) / 120.0).collect();
        let result = check_ac_synchronization(&edges_at(&times), 60.0);
        assert!(result.synchronized);
        assert!(result.phase_variance.unwrap() < 1e-6);
    }

    #[test]
    fn test_ac_sync_jitter_around_zero_crossing() {
        // Phases land near 0.012 and 0.988, the far ends of the half-cycle
        let times: Vec<f64> = (0..20)
            .map(|i| f64::from(i) / 120.0 + if i % 2 == 0 { 0.0001 } else { -0.0001 })
            .collect();
        let result = check_ac_synchronization(&edges_at(&times), 60.0);
        assert!(!result.synchronized);
        assert!(result.phase_variance.unwrap() > 0.2);
    }

    #[test]
    fn test_ac_sync_split_phase() {
        // Edges alternate between 35% and 65% of the half-cycle
        let half = 1.0 / 120.0;
        let times: Vec<f64> = (0..20)
            .map(|i| {
                let phase = if i % 2 == 0 { 0.35 } else { 0.65 };
                (f64::from(i) + phase) * half
            })
            .collect();
        let result = check_ac_synchronization(&edges_at(&times), 60.0);
        assert!(result.synchronized);
        let variance = result.phase_variance.unwrap();
        assert!((variance - 0.45 / 19.0).abs() < 1e-9);
    }

    #[test]
    fn test_ac_sync_spread_phase() {
        let half = 1.0 / 120.0;
        let times: Vec<f64> = (0..20)
            .map(|i| {
                let phase = if i % 2 == 0 { 0.05 } else { 0.95 };
                (f64::from(i) + phase) * half
            })
            .collect();
        let result = check_ac_synchronization(&edges_at(&times), 60.0);
        assert!(!result.synchronized);
    }

    #[test]
    fn test_ac_sync_too_few_edges() {
        let result = check_ac_synchronization(&edges_at(&[0.0, 0.1, 0.2]), 60.0);
        assert!(!result.synchronized);
        assert!(result.phase_variance.is_none());
    }

    #[test]
    fn test_analyze_signal_checks_sync_for_enviracom() {
        let samples = square_wave(1.0 / 120.0, 30);
        let report = analyze_signal(&samples, 1.5, 60.0);
        assert_eq!(report.classification.kind, PhysicalLayer::EnviraCom);
        assert!(report.ac_sync.is_some());

        let samples = square_wave(0.000104, 30);
        let report = analyze_signal(&samples, 1.5, 60.0);
        assert_eq!(report.classification.kind, PhysicalLayer::Rs485);
        assert!(report.ac_sync.is_none());
    }
}
