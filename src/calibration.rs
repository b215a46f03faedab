//! Calibration & quantitation
//!
//! Turns per-ion integration results into one signal per compound, fits a
//! linear calibration curve `signal = slope * concentration + intercept` over
//! the calibration files and inverts it for samples.
//!
//! Concentrations are expressed in mM throughout.
//!
//! ## Signal policy
//!
//! For each ion, the baseline-corrected peak area is used when it comes from a
//! real integration and is positive; otherwise the ion contributes its XIC
//! intensity sum rounded to an integer. [`SignalSource`] records whether any
//! peak area was used.
//!
//! [`Calibrator`] fits on peak areas first and refits on intensity sums when
//! the coefficient of determination is below `min_r_squared`. Samples are then
//! quantified with the same policy the curve was built with.

use std::sync::OnceLock;

use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::peaks::PeakRegion;

/// Errors raised while building calibration data
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    /// A line needs at least two points
    #[error("need at least 2 calibration points, got {found}")]
    InsufficientPoints { found: usize },

    /// A concentration string could not be parsed
    #[error("invalid concentration '{0}'")]
    InvalidConcentration(String),

    /// A concentration unit is not one of M, mM, uM, nM, pM
    #[error("unknown concentration unit '{0}'")]
    UnknownUnit(String),
}

/// Provenance of a compound signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// At least one ion contributed a baseline-corrected peak area
    PeakArea,
    /// Every ion contributed its raw intensity sum
    IntensitySum,
}

/// What one ion contributes to its compound signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IonMeasurement {
    /// Corrected area of a real (non-fallback) integration
    pub corrected_area: Option<f64>,
    /// Sum of the ion's XIC intensities
    pub intensity_sum: f64,
}

impl IonMeasurement {
    pub fn new(region: &PeakRegion, intensity_sum: f64) -> Self {
        Self {
            corrected_area: (!region.is_fallback()).then_some(region.corrected_area),
            intensity_sum,
        }
    }
}

/// Aggregated signal of one compound in one file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompoundSignal {
    pub value: f64,
    pub source: SignalSource,
}

/// Combine ion measurements into a compound signal
pub fn compound_signal(ions: &[IonMeasurement], prefer_peak_area: bool) -> CompoundSignal {
    let mut value = 0.0;
    let mut used_area = false;

    for ion in ions {
        match ion.corrected_area {
            Some(area) if prefer_peak_area && area > 0.0 => {
                value += area;
                used_area = true;
            }
            _ => value += ion.intensity_sum.round(),
        }
    }

    CompoundSignal {
        value,
        source: if used_area {
            SignalSource::PeakArea
        } else {
            SignalSource::IntensitySum
        },
    }
}

/// One (concentration, signal) pair of a calibration series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub concentration: f64,
    pub signal: f64,
}

/// Least-squares calibration line; immutable once fit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationCurve {
    slope: f64,
    intercept: f64,
    r_squared: f64,
    points: Vec<CalibrationPoint>,
    source: SignalSource,
}

impl CalibrationCurve {
    /// Ordinary least squares over `(concentration, signal)` pairs
    ///
    /// Without concentration variance the line is flat at the mean signal and
    /// r² is 0. Non-finite coefficients are replaced by 0.
    pub fn fit(points: &[(f64, f64)]) -> Result<Self, CalibrationError> {
        if points.len() < 2 {
            return Err(CalibrationError::InsufficientPoints {
                found: points.len(),
            });
        }

        let n = points.len() as f64;
        let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
        let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

        let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
        for &(x, y) in points {
            let (dx, dy) = (x - mean_x, y - mean_y);
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }

        let (slope, intercept, r_squared) = if sxx > 0.0 {
            let slope = sxy / sxx;
            let r_squared = if syy > 0.0 {
                (sxy * sxy) / (sxx * syy)
            } else {
                0.0
            };
            (slope, mean_y - slope * mean_x, r_squared)
        } else {
            (0.0, mean_y, 0.0)
        };

        Ok(Self {
            slope: finite_or_zero(slope),
            intercept: finite_or_zero(intercept),
            r_squared: finite_or_zero(r_squared).clamp(0.0, 1.0),
            points: points
                .iter()
                .map(|&(concentration, signal)| CalibrationPoint {
                    concentration,
                    signal,
                })
                .collect(),
            source: SignalSource::PeakArea,
        })
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Coefficient of determination
    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    /// Signal policy the curve was built with
    pub fn source(&self) -> SignalSource {
        self.source
    }

    /// A flat line cannot be inverted; every concentration reads as 0
    pub fn is_degenerate(&self) -> bool {
        self.slope == 0.0
    }

    /// Invert the line; 0 for a flat curve or a non-finite result
    pub fn concentration(&self, signal: f64) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        round6(finite_or_zero((signal - self.intercept) / self.slope))
    }
}

/// Concentration computed for one compound in one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationResult {
    pub compound: String,
    pub file: String,
    /// mM, rounded to 6 decimals
    pub concentration: f64,
    pub source: SignalSource,
}

/// Calibration policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Below this r² a peak-area curve is refit on intensity sums
    pub min_r_squared: f64,
    /// Try peak areas before intensity sums
    pub prefer_peak_area: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_r_squared: 0.75,
            prefer_peak_area: true,
        }
    }
}

/// One calibration file's measurements of a compound
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSample {
    /// Known concentration (mM)
    pub concentration: f64,
    pub ions: Vec<IonMeasurement>,
}

/// Two-pass calibration and quantitation
#[derive(Debug, Clone, Copy, Default)]
pub struct Calibrator {
    config: CalibrationConfig,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// Fit the curve of `compound` over its calibration samples
    pub fn calibrate(
        &self,
        compound: &str,
        samples: &[CalibrationSample],
    ) -> Result<CalibrationCurve, CalibrationError> {
        let mut curve = self.fit_with_policy(samples, self.config.prefer_peak_area)?;

        if curve.source == SignalSource::PeakArea && curve.r_squared < self.config.min_r_squared {
            warn!(
                "Low r² ({:.3}) for {} with peak areas, refitting on intensity sums",
                curve.r_squared, compound
            );
            curve = self.fit_with_policy(samples, false)?;
            info!(
                "Recalibrated {} on intensity sums, new r²: {:.3}",
                compound, curve.r_squared
            );
        }

        if curve.is_degenerate() {
            warn!(
                "Calibration of {} has slope 0; its concentrations will read as 0",
                compound
            );
        }
        debug!(
            "{}: slope {:.6}, intercept {:.6}, r² {:.4} ({:?})",
            compound, curve.slope, curve.intercept, curve.r_squared, curve.source
        );
        Ok(curve)
    }

    fn fit_with_policy(
        &self,
        samples: &[CalibrationSample],
        prefer_peak_area: bool,
    ) -> Result<CalibrationCurve, CalibrationError> {
        let signals: Vec<CompoundSignal> = samples
            .iter()
            .map(|s| compound_signal(&s.ions, prefer_peak_area))
            .collect();
        let points: Vec<(f64, f64)> = samples
            .iter()
            .zip(&signals)
            .map(|(s, sig)| (s.concentration, sig.value))
            .collect();

        let mut curve = CalibrationCurve::fit(&points)?;
        curve.source = if signals.iter().any(|s| s.source == SignalSource::PeakArea) {
            SignalSource::PeakArea
        } else {
            SignalSource::IntensitySum
        };
        Ok(curve)
    }

    /// Quantify a sample with the signal policy of `curve`
    pub fn quantify(
        &self,
        curve: &CalibrationCurve,
        compound: &str,
        file: &str,
        ions: &[IonMeasurement],
    ) -> ConcentrationResult {
        let signal = compound_signal(ions, curve.source == SignalSource::PeakArea);
        let concentration = curve.concentration(signal.value);
        debug!(
            "{} in {}: signal {:.3} ({:?}) -> {} mM",
            compound, file, signal.value, signal.source, concentration
        );
        ConcentrationResult {
            compound: compound.to_string(),
            file: file.to_string(),
            concentration,
            source: signal.source,
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn round6(value: f64) -> f64 {
    let rounded = (value * 1e6).round() / 1e6;
    // avoid reporting -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Parse a concentration such as `"10 mM"` or `"2.5uM"` into mM
///
/// A bare number is read as mM.
pub fn parse_concentration(text: &str) -> Result<f64, CalibrationError> {
    let caps = concentration_pattern()
        .captures(text)
        .ok_or_else(|| CalibrationError::InvalidConcentration(text.to_string()))?;
    let value: f64 = caps[1]
        .parse()
        .map_err(|_| CalibrationError::InvalidConcentration(text.to_string()))?;

    let unit = caps[2].to_lowercase().replace(['µ', 'μ'], "u");
    let factor = match unit.as_str() {
        "" | "mm" => 1.0,
        "m" => 1e3,
        "um" => 1e-3,
        "nm" => 1e-6,
        "pm" => 1e-9,
        _ => return Err(CalibrationError::UnknownUnit(caps[2].to_string())),
    };
    Ok(value * factor)
}

/// True when a file name carries the calibration mix marker
pub fn is_calibration_file(file_name: &str) -> bool {
    file_name.contains("STMIX")
}

/// Concentration tag of a calibration file name, e.g. `STMIX_5mM.mzML` -> `"5 mM"`
///
/// Falls back to the first number of an `STMIX` file name, read as mM.
pub fn concentration_from_filename(file_name: &str) -> Option<String> {
    if let Some(caps) = filename_tag_pattern().captures(file_name) {
        return Some(format!("{} {}", &caps[1], &caps[2]));
    }

    if !is_calibration_file(file_name) {
        return None;
    }
    first_number_pattern()
        .find(file_name)
        .map(|m| format!("{} mM", m.as_str()))
}

fn concentration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([-+]?\d*\.?\d+(?:[eE][-+]?\d+)?)\s*([A-Za-zµμ]*)\s*$")
            .expect("valid regex")
    })
}

fn filename_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)\s*(mM|uM|µM|nM|pM|M)").expect("valid regex")
    })
}

fn first_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d*\.?\d+").expect("valid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(corrected: f64, sum: f64) -> IonMeasurement {
        IonMeasurement {
            corrected_area: Some(corrected),
            intensity_sum: sum,
        }
    }

    fn sum_only(sum: f64) -> IonMeasurement {
        IonMeasurement {
            corrected_area: None,
            intensity_sum: sum,
        }
    }

    #[test]
    fn test_compound_signal_policy() {
        let signal = compound_signal(&[area(10.0, 99.0), sum_only(20.4), area(0.0, 5.6)], true);
        assert_eq!(signal.value, 10.0 + 20.0 + 6.0);
        assert_eq!(signal.source, SignalSource::PeakArea);

        let signal = compound_signal(&[area(10.0, 99.0)], false);
        assert_eq!(signal.value, 99.0);
        assert_eq!(signal.source, SignalSource::IntensitySum);
    }

    #[test]
    fn test_round_trip() {
        let concentrations = [0.5, 1.0, 2.0, 5.0, 10.0];
        let points: Vec<(f64, f64)> = concentrations.iter().map(|&c| (c, 5.0 * c + 2.0)).collect();
        let curve = CalibrationCurve::fit(&points).unwrap();
        assert!((curve.slope() - 5.0).abs() < 1e-9);
        assert!((curve.intercept() - 2.0).abs() < 1e-9);
        assert!((curve.r_squared() - 1.0).abs() < 1e-9);
        for &c in &concentrations[1..4] {
            assert!((curve.concentration(5.0 * c + 2.0) - c).abs() < 1e-6);
        }
    }

    #[test]
    fn test_flat_curve_reads_zero() {
        let curve = CalibrationCurve::fit(&[(1.0, 7.0), (2.0, 7.0), (3.0, 7.0)]).unwrap();
        assert!(curve.is_degenerate());
        for signal in [0.0, 7.0, 1e12, -3.0, f64::NAN] {
            assert_eq!(curve.concentration(signal), 0.0);
        }

        let curve = CalibrationCurve::fit(&[(2.0, 1.0), (2.0, 9.0)]).unwrap();
        assert_eq!(curve.slope(), 0.0);
        assert_eq!(curve.intercept(), 5.0);
        assert_eq!(curve.r_squared(), 0.0);
    }

    #[test]
    fn test_insufficient_points() {
        assert_eq!(
            CalibrationCurve::fit(&[(1.0, 2.0)]),
            Err(CalibrationError::InsufficientPoints { found: 1 })
        );
    }

    #[test]
    fn test_non_finite_signal_clamped() {
        let curve = CalibrationCurve::fit(&[(1.0, 7.0), (2.0, 12.0)]).unwrap();
        assert_eq!(curve.concentration(f64::INFINITY), 0.0);
        assert_eq!(curve.concentration(12.0), 2.0);
    }

    #[test]
    fn test_two_pass_refit() {
        // areas are noise, sums follow the concentration
        let samples = vec![
            CalibrationSample {
                concentration: 1.0,
                ions: vec![area(900.0, 110.0)],
            },
            CalibrationSample {
                concentration: 2.0,
                ions: vec![area(100.0, 210.0)],
            },
            CalibrationSample {
                concentration: 3.0,
                ions: vec![area(800.0, 310.0)],
            },
            CalibrationSample {
                concentration: 4.0,
                ions: vec![area(150.0, 410.0)],
            },
        ];
        let calibrator = Calibrator::default();
        let curve = calibrator.calibrate("lysine", &samples).unwrap();
        assert_eq!(curve.source(), SignalSource::IntensitySum);
        assert!((curve.slope() - 100.0).abs() < 1e-9);

        let result = calibrator.quantify(&curve, "lysine", "sample.mzML", &[area(5.0, 260.0)]);
        assert_eq!(result.source, SignalSource::IntensitySum);
        assert!((result.concentration - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_good_area_curve_is_kept() {
        let samples: Vec<CalibrationSample> = [1.0, 2.0, 4.0]
            .iter()
            .map(|&c| CalibrationSample {
                concentration: c,
                ions: vec![area(50.0 * c, 1.0)],
            })
            .collect();
        let curve = Calibrator::default().calibrate("ornithine", &samples).unwrap();
        assert_eq!(curve.source(), SignalSource::PeakArea);
        assert!((curve.concentration(150.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_patterns_compile() {
        assert!(concentration_pattern().is_match("2.5 uM"));
        assert!(filename_tag_pattern().is_match("STMIX_5mM"));
        assert!(first_number_pattern().is_match("STMIX-2"));
    }

    #[test]
    fn test_parse_concentration() {
        assert_eq!(parse_concentration("10 mM").unwrap(), 10.0);
        assert_eq!(parse_concentration("10mM").unwrap(), 10.0);
        assert_eq!(parse_concentration("2").unwrap(), 2.0);
        assert_eq!(parse_concentration("1 M").unwrap(), 1000.0);
        assert!((parse_concentration("500 uM").unwrap() - 0.5).abs() < 1e-12);
        assert!((parse_concentration("500 µM").unwrap() - 0.5).abs() < 1e-12);
        assert!((parse_concentration("3 nM").unwrap() - 3e-6).abs() < 1e-18);
        assert!((parse_concentration("3 pM").unwrap() - 3e-9).abs() < 1e-21);
        assert!(matches!(
            parse_concentration("5 kg"),
            Err(CalibrationError::UnknownUnit(_))
        ));
        assert!(parse_concentration("abc").is_err());
        assert!(parse_concentration("").is_err());
    }

    #[test]
    fn test_concentration_from_filename() {
        assert_eq!(
            concentration_from_filename("STMIX_5mM_pos.mzML").as_deref(),
            Some("5 mM")
        );
        assert_eq!(
            concentration_from_filename("STMIX_0.5uM.mzML").as_deref(),
            Some("0.5 uM")
        );
        assert_eq!(
            concentration_from_filename("STMIX-2.mzML").as_deref(),
            Some("2 mM")
        );
        assert_eq!(concentration_from_filename("sample_07.mzML"), None);
        assert!(is_calibration_file("STMIX_5mM.mzML"));
        assert!(!is_calibration_file("blank.mzML"));
    }
}
