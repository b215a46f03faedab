//! Chromatography detector traces
//!
//! Loads delimited text exports of LC/GC detectors (time in the first column,
//! signal in the last) and removes their baseline with the LLS operator. The
//! resulting series go through the same [`crate::peaks::PeakIntegrator`] as
//! XICs, usually with [`crate::peaks::IntegrationConfig::lc`].

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use log::{debug, info};
use serde::Serialize;

use crate::peaks::percentile;

/// Errors raised while loading a trace
#[derive(Debug, thiserror::Error)]
pub enum ChromatogramError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The first line holds none of comma, tab or space
    #[error("no recognizable delimiter in the first line")]
    NoDelimiter,

    #[error("no numeric rows found")]
    Empty,
}

/// A detector trace, times in minutes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trace {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Baseline estimate and the corrected signal of a trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineCorrection {
    pub corrected: Vec<f64>,
    pub baseline: Vec<f64>,
}

fn detect_delimiter(line: &str) -> Option<u8> {
    [b',', b'\t', b' ']
        .into_iter()
        .find(|&d| line.as_bytes().contains(&d))
}

/// Load a trace file
pub fn load_trace<P: AsRef<Path>>(path: P) -> Result<Trace, ChromatogramError> {
    let path = path.as_ref();
    let trace = read_trace(BufReader::new(File::open(path)?))?;
    info!("Loaded {} points from {}", trace.len(), path.display());
    Ok(trace)
}

/// Read a trace from any buffered source
///
/// Rows with fewer than two columns, or whose first or last column is not a
/// number, are skipped (headers, metadata blocks).
pub fn read_trace<R: BufRead>(mut reader: R) -> Result<Trace, ChromatogramError> {
    let mut first_line = String::new();
    reader.read_line(&mut first_line)?;
    let delimiter = detect_delimiter(first_line.trim_end_matches(['\r', '\n']))
        .ok_or(ChromatogramError::NoDelimiter)?;

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(first_line.as_bytes().chain(reader));

    let mut trace = Trace::default();
    let mut skipped = 0usize;
    for record in csv_reader.records() {
        let record = record?;
        let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
        let parsed = match fields.as_slice() {
            [first, .., last] => first.parse::<f64>().ok().zip(last.parse::<f64>().ok()),
            _ => None,
        };
        match parsed {
            Some((time, value)) => {
                trace.times.push(time);
                trace.values.push(value);
            }
            None => skipped += 1,
        }
    }

    if trace.is_empty() {
        return Err(ChromatogramError::Empty);
    }
    debug!("Skipped {} non-numeric rows", skipped);
    Ok(trace)
}

const LLS_ITERATIONS: usize = 20;

/// Baseline correction with the log-log-square-root (LLS) operator
///
/// Negative signals are first shifted by the median of the negative values
/// and clipped at zero. The transformed signal is eroded by 20 passes of
/// increasing half-width, then transformed back into the baseline.
pub fn lls_baseline_correction(values: &[f64]) -> BaselineCorrection {
    let mut negatives: Vec<f64> = values.iter().copied().filter(|&v| v < 0.0).collect();
    let shift = if negatives.is_empty() {
        0.0
    } else {
        negatives.sort_by(f64::total_cmp);
        percentile(&negatives, 50.0)
    };

    let signal: Vec<f64> = values.iter().map(|&v| (v - shift).max(0.0)).collect();
    let mut tform: Vec<f64> = signal
        .iter()
        .map(|&v| ((v + 1.0).sqrt() + 1.0).ln().ln_1p())
        .collect();

    let n = tform.len();
    for width in 1..=LLS_ITERATIONS {
        if n <= 2 * width {
            break;
        }
        let mut next = tform.clone();
        for j in width..n - width {
            next[j] = next[j].min(0.5 * (next[j + width] + next[j - width]));
        }
        tform = next;
    }

    let inverse: Vec<f64> = tform
        .iter()
        .map(|&t| (t.exp_m1().exp() - 1.0).powi(2) - 1.0)
        .collect();

    BaselineCorrection {
        corrected: signal
            .iter()
            .zip(&inverse)
            .map(|(s, b)| ((s - b) * 1e9).round() / 1e9)
            .collect(),
        baseline: inverse.iter().map(|b| b + shift).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_comma_with_header() {
        let text = "Time (min),Value (mAU)\n0.0,1.5\n0.1,2.5\nfooter line\n0.2,3.0\n";
        let trace = read_trace(Cursor::new(text)).unwrap();
        assert_eq!(trace.times, vec![0.0, 0.1, 0.2]);
        assert_eq!(trace.values, vec![1.5, 2.5, 3.0]);
    }

    #[test]
    fn test_read_tab_uses_last_column() {
        let text = "0.0\tx\t10\n0.5\ty\t20\n";
        let trace = read_trace(Cursor::new(text)).unwrap();
        assert_eq!(trace.values, vec![10.0, 20.0]);
    }

    #[test]
    fn test_read_space_collapses_runs() {
        let text = "0.0   4.0\n1.0  5.0\n";
        let trace = read_trace(Cursor::new(text)).unwrap();
        assert_eq!(trace.times, vec![0.0, 1.0]);
        assert_eq!(trace.values, vec![4.0, 5.0]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            read_trace(Cursor::new("12345\n")),
            Err(ChromatogramError::NoDelimiter)
        ));
        assert!(matches!(
            read_trace(Cursor::new("a,b\nc,d\n")),
            Err(ChromatogramError::Empty)
        ));
        assert!(matches!(
            load_trace("/nonexistent/trace.csv"),
            Err(ChromatogramError::Io(_))
        ));
    }

    #[test]
    fn test_flat_signal_has_flat_baseline() {
        let result = lls_baseline_correction(&[5.0; 60]);
        for (c, b) in result.corrected.iter().zip(&result.baseline) {
            assert!(c.abs() < 1e-6);
            assert!((b - 5.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_peak_survives_correction() {
        let values: Vec<f64> = (0..200)
            .map(|i| {
                let x = i as f64;
                50.0 + 0.1 * x + 400.0 * (-((x - 100.0) / 5.0).powi(2) / 2.0).exp()
            })
            .collect();
        let result = lls_baseline_correction(&values);
        assert_eq!(result.corrected.len(), values.len());
        assert!(result.corrected[100] > 300.0);
        assert!(result.corrected[10].abs() < 5.0);
        assert!(result.corrected.iter().all(|&v| v >= -1e-6));
    }

    #[test]
    fn test_negative_signal_shift() {
        let result = lls_baseline_correction(&[-4.0, -2.0, 0.0, 10.0, 0.0]);
        assert_eq!(result.corrected.len(), 5);
        assert!(result.baseline.iter().all(|b| b.is_finite()));
    }
}
