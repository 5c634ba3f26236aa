//! Logic analyzer CSV exports
//!
//! Saleae and PulseView both export one row per sample with a time column
//! followed by one column per channel, optionally preceded by a header row.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::SignalError;

/// Which columns hold time and channel value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvColumns {
    pub time: usize,
    pub data: usize,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self { time: 0, data: 1 }
    }
}

/// Parse `(time, value)` samples from CSV text
///
/// A leading row whose columns are not numeric is treated as a header.
/// Rows that are short or unparseable are skipped.
pub fn parse_csv_samples<R: BufRead>(
    reader: R,
    columns: CsvColumns,
) -> Result<Vec<(f64, f64)>, SignalError> {
    let mut samples = Vec::new();
    let mut skipped = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SignalError::Read(e.to_string()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_row(line, columns) {
            Some(sample) => samples.push(sample),
            None if index == 0 => debug!("Skipping header row: {}", line),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("Skipped {} unparseable rows", skipped);
    }
    debug!("Loaded {} samples", samples.len());
    Ok(samples)
}

fn parse_row(line: &str, columns: CsvColumns) -> Option<(f64, f64)> {
    let fields: Vec<&str> = line.split(',').map(|f| f.trim().trim_matches('"')).collect();
    let time = fields.get(columns.time)?.parse().ok()?;
    let value = fields.get(columns.data)?.parse().ok()?;
    Some((time, value))
}

/// Load samples from a CSV file
pub fn load_csv_samples(
    path: impl AsRef<Path>,
    columns: CsvColumns,
) -> Result<Vec<(f64, f64)>, SignalError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| SignalError::Read(format!("{}: {}", path.display(), e)))?;
    parse_csv_samples(BufReader::new(file), columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_header() {
        let csv = "Time [s], Channel 0\n0.000,0\n0.001,1\n0.002,0\n";
        let samples = parse_csv_samples(csv.as_bytes(), CsvColumns::default()).unwrap();
        assert_eq!(samples, vec![(0.0, 0.0), (0.001, 1.0), (0.002, 0.0)]);
    }

    #[test]
    fn test_parse_without_header() {
        let csv = "0.5,3.3\n1.0,0.0\n";
        let samples = parse_csv_samples(csv.as_bytes(), CsvColumns::default()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], (0.5, 3.3));
    }

    #[test]
    fn test_custom_columns() {
        let csv = "Time,CH0,CH1\n0.0,0,1\n0.1,1,0\n";
        let columns = CsvColumns { time: 0, data: 2 };
        let samples = parse_csv_samples(csv.as_bytes(), columns).unwrap();
        assert_eq!(samples, vec![(0.0, 1.0), (0.1, 0.0)]);
    }

    #[test]
    fn test_bad_rows_skipped() {
        let csv = "t,v\n0.0,0\ngarbage\n0.2\n0.3,1\n\n";
        let samples = parse_csv_samples(csv.as_bytes(), CsvColumns::default()).unwrap();
        assert_eq!(samples, vec![(0.0, 0.0), (0.3, 1.0)]);
    }

    #[test]
    fn test_missing_file() {
        let err = load_csv_samples("/nonexistent/trace.csv", CsvColumns::default()).unwrap_err();
        assert!(matches!(err, SignalError::Read(_)));
    }
}
