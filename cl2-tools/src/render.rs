//! Plain-text rendering of reports

use std::fmt::Write as _;

use cl2_analyze::{SurveyEntry, TrafficReport};
use cl2_capture::CaptureSummary;
use cl2_detect::{ProbeReport, SerialPortInfo, SignalReport};
use cl2_protocol::display::{annotate, hex_string};
use cl2_protocol::{device_hint, Packet};

/// Column-aligned text table
pub struct Table {
    title: String,
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(title: impl Into<String>, headers: &[&'static str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.len()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.chars().count());
                }
            }
        }

        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let header: Vec<String> = self
            .headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| format!("{:<w$}", h, w = *w))
            .collect();
        let _ = writeln!(out, "  {}", header.join("  ").trim_end());
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        let _ = writeln!(out, "  {}", rule.join("  "));
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<w$}", c, w = *w))
                .collect();
            let _ = writeln!(out, "  {}", cells.join("  ").trim_end());
        }
        out
    }
}

fn hint(addr: u16) -> String {
    device_hint(addr).unwrap_or("Unknown").to_string()
}

pub fn traffic_summary(report: &TrafficReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Analysis Summary: {} packets ({} valid, {} errors)\n",
        report.total_packets, report.valid_packets, report.error_packets
    );

    let mut addresses = Table::new("Addresses", &["Address", "Count", "Likely Device"]);
    for f in &report.addresses {
        addresses.row(vec![format!("0x{:04X}", f.value), f.count.to_string(), hint(f.value)]);
    }
    out.push_str(&addresses.render());
    out.push('\n');

    let mut types = Table::new("Message Types", &["Type", "Count"]);
    for f in &report.message_types {
        types.row(vec![format!("0x{:02X}", f.value), f.count.to_string()]);
    }
    out.push_str(&types.render());
    out.push('\n');

    let mut conversations =
        Table::new("Conversations", &["Source", "Destination", "Count", "Types"]);
    for c in &report.conversations {
        let types: Vec<String> = c.message_types.iter().map(|t| format!("{:02X}", t)).collect();
        conversations.row(vec![
            format!("0x{:04X}", c.key.src_addr),
            format!("0x{:04X}", c.key.dest_addr),
            c.count.to_string(),
            types.join(" "),
        ]);
    }
    out.push_str(&conversations.render());
    out.push('\n');

    let mut patterns = Table::new("Repeating Patterns", &["Prefix", "Count"]);
    for p in &report.patterns {
        patterns.row(vec![hex_string(&p.prefix, " "), p.count.to_string()]);
    }
    out.push_str(&patterns.render());
    out
}

pub fn checksum_survey(entries: &[SurveyEntry]) -> String {
    let mut table = Table::new("Checksum Hypotheses", &["Algorithm", "Matched", "Ratio"]);
    for e in entries {
        table.row(vec![
            e.name.to_string(),
            format!("{}/{}", e.matched, e.total),
            format!("{:.1}%", e.match_ratio() * 100.0),
        ]);
    }
    table.render()
}

/// Full detail for one packet, including labelled fields
pub fn packet_detail(index: usize, packet: &Packet) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Packet {}", index);
    let _ = writeln!(out, "Timestamp: {:.3}", packet.timestamp);
    let _ = writeln!(out, "Raw ({} bytes): {}", packet.raw.len(), packet.to_hex(" "));
    let _ = writeln!(out, "\n{}\n", packet);

    let segments = annotate(packet);
    if !segments.is_empty() {
        let mut table = Table::new("Fields", &["Bytes", "Field", "Value"]);
        for s in segments {
            table.row(vec![
                format!("{}..{}", s.range.start, s.range.end),
                s.label.to_string(),
                s.value,
            ]);
        }
        out.push_str(&table.render());
    }
    out
}

pub fn baud_report(report: &ProbeReport) -> String {
    let mut table = Table::new("Baud Rate Candidates", &["Baud", "Bytes", "Score", "Reason"]);
    for c in report.ranked() {
        table.row(vec![
            c.baud_rate.to_string(),
            c.byte_count.to_string(),
            c.score.to_string(),
            c.reason.clone(),
        ]);
    }

    let mut out = table.render();
    match report.best() {
        Some(best) if best.is_low_confidence() => {
            let _ = writeln!(
                out,
                "\nBest guess: {} baud (low confidence, score {})",
                best.baud_rate, best.score
            );
            let _ = writeln!(
                out,
                "Try a longer sample time, or measure the bit period with a scope or logic analyzer."
            );
        }
        Some(best) => {
            let _ = writeln!(out, "\nRecommended: {} baud (score {})", best.baud_rate, best.score);
        }
        None => {
            let _ = writeln!(out, "\nNo data received. Check wiring and A/B polarity.");
        }
    }
    out
}

pub fn signal_report(report: &SignalReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Samples: {}  Edges: {}",
        report.sample_count, report.edge_count
    );

    if let Some(p) = &report.pulses {
        let mut table = Table::new("Pulse Widths", &["Statistic", "Value"]);
        table.row(vec!["Pulses".into(), p.widths.len().to_string()]);
        table.row(vec!["Min".into(), format!("{:.4} ms", p.min_width_ms())]);
        table.row(vec!["Max".into(), format!("{:.4} ms", p.max_width_ms())]);
        table.row(vec!["Mean".into(), format!("{:.4} ms", p.mean_width_ms())]);
        table.row(vec!["Median".into(), format!("{:.4} ms", p.median_width_ms())]);
        table.row(vec!["Estimated baud".into(), format!("{:.0}", p.estimated_baud)]);
        out.push('\n');
        out.push_str(&table.render());
    }

    let c = &report.classification;
    let _ = writeln!(out, "\nPhysical layer: {} (confidence {}%)", c.kind, c.confidence);
    if let Some(baud) = c.estimated_baud {
        let _ = writeln!(out, "Estimated baud: {}", baud);
    }
    let _ = writeln!(out, "Reason: {}", c.reason);

    if let Some(sync) = &report.ac_sync {
        let _ = writeln!(
            out,
            "AC sync ({} Hz): {}",
            sync.ac_frequency,
            if sync.synchronized { "yes" } else { "no" }
        );
    }
    out
}

pub fn capture_summary(summary: &CaptureSummary) -> String {
    format!(
        "Capture complete!\n  File: {}\n  Packets: {}\n  Bytes: {}\n  Duration: {:.1}s\n",
        summary.path.display(),
        summary.stats.frames,
        summary.stats.bytes,
        summary.stats.duration.as_secs_f64()
    )
}

pub fn ports(ports: &[SerialPortInfo]) -> String {
    if ports.is_empty() {
        return "No serial ports found\n".to_string();
    }
    let mut table = Table::new("Serial Ports", &["Port", "Description", "VID:PID"]);
    for p in ports {
        let ids = match (p.vid, p.pid) {
            (Some(vid), Some(pid)) => format!("{:04x}:{:04x}", vid, pid),
            _ => "-".to_string(),
        };
        table.row(vec![p.port.clone(), p.description(), ids]);
    }
    table.render()
}
