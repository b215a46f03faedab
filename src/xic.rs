//! Extracted ion chromatogram (XIC) construction
//!
//! For every scan, the intensities inside an inclusive m/z window around the
//! target are summed. The window is located by binary search on the ascending
//! m/z axis of each [`Scan`], so extraction is `O(log n)` per scan.

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::scan::Scan;

/// Errors raised when constructing ions or tolerances
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum XicError {
    /// Target m/z must be finite and positive
    #[error("invalid target m/z {0}: must be finite and > 0")]
    InvalidTarget(f64),

    /// Explicit m/z range must satisfy 0 <= lower <= upper
    #[error("invalid m/z range [{0}, {1}]")]
    InvalidRange(f64, f64),

    /// Accuracy and multiplier must be finite and positive
    #[error("invalid mass tolerance: {0}")]
    InvalidTolerance(String),
}

/// A target m/z to extract
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ion {
    mz: f64,
    label: Option<String>,
    custom_range: Option<(f64, f64)>,
}

impl Ion {
    /// Create an ion; `mz` must be finite and positive
    pub fn new(mz: f64) -> Result<Self, XicError> {
        if !mz.is_finite() || mz <= 0.0 {
            return Err(XicError::InvalidTarget(mz));
        }
        Ok(Self {
            mz,
            label: None,
            custom_range: None,
        })
    }

    /// Attach a descriptive label (adduct, fragment name...)
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Use an explicit m/z window instead of the shared tolerance
    pub fn with_range(mut self, lower: f64, upper: f64) -> Result<Self, XicError> {
        if !(lower.is_finite() && upper.is_finite()) || lower < 0.0 || lower > upper {
            return Err(XicError::InvalidRange(lower, upper));
        }
        self.custom_range = Some((lower, upper));
        Ok(self)
    }

    pub fn mz(&self) -> f64 {
        self.mz
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn custom_range(&self) -> Option<(f64, f64)> {
        self.custom_range
    }
}

/// How the tolerance accuracy scales with the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceMode {
    /// Accuracy in Th, independent of the target
    Absolute,
    /// Accuracy as a fraction of the target m/z (1e-4 = 100 ppm)
    Relative,
}

/// Mass tolerance policy: half-window = multiplier x accuracy (x target when relative)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MassTolerance {
    accuracy: f64,
    multiplier: f64,
    mode: ToleranceMode,
}

impl Default for MassTolerance {
    fn default() -> Self {
        Self {
            accuracy: 1e-4,
            multiplier: 3.0,
            mode: ToleranceMode::Relative,
        }
    }
}

impl MassTolerance {
    /// Default window multiplier
    pub const DEFAULT_MULTIPLIER: f64 = 3.0;

    /// Build a tolerance, validating both numbers
    pub fn new(accuracy: f64, multiplier: f64, mode: ToleranceMode) -> Result<Self, XicError> {
        if !accuracy.is_finite() || accuracy <= 0.0 {
            return Err(XicError::InvalidTolerance(format!(
                "accuracy must be > 0, got {}",
                accuracy
            )));
        }
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(XicError::InvalidTolerance(format!(
                "multiplier must be > 0, got {}",
                multiplier
            )));
        }
        Ok(Self {
            accuracy,
            multiplier,
            mode,
        })
    }

    /// Absolute tolerance in Th with the default multiplier
    pub fn absolute(accuracy: f64) -> Result<Self, XicError> {
        Self::new(accuracy, Self::DEFAULT_MULTIPLIER, ToleranceMode::Absolute)
    }

    /// Relative tolerance with the default multiplier
    pub fn relative(accuracy: f64) -> Result<Self, XicError> {
        Self::new(accuracy, Self::DEFAULT_MULTIPLIER, ToleranceMode::Relative)
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn mode(&self) -> ToleranceMode {
        self.mode
    }

    /// Half-width of the extraction window around `target`
    pub fn half_window(&self, target: f64) -> f64 {
        match self.mode {
            ToleranceMode::Absolute => self.multiplier * self.accuracy,
            ToleranceMode::Relative => self.multiplier * self.accuracy * target,
        }
    }

    /// Inclusive window for an ion, honoring its explicit range if it has one
    pub fn window(&self, ion: &Ion) -> (f64, f64) {
        match ion.custom_range {
            Some(range) => range,
            None => {
                let half = self.half_window(ion.mz);
                (ion.mz - half, ion.mz + half)
            }
        }
    }
}

/// An extracted ion chromatogram, one point per scan in file order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Xic {
    pub target_mz: f64,
    pub lower_mz: f64,
    pub upper_mz: f64,
    /// Retention times (minutes)
    pub times: Vec<f64>,
    /// Summed intensity inside the window at each time
    pub intensities: Vec<f64>,
}

impl Xic {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Sum of all intensities, the fallback signal when no peak is integrated
    pub fn total_intensity(&self) -> f64 {
        self.intensities.iter().sum()
    }
}

/// Builds XICs for ions against a scan sequence
#[derive(Debug, Clone, Copy, Default)]
pub struct XicExtractor {
    tolerance: MassTolerance,
}

impl XicExtractor {
    pub fn new(tolerance: MassTolerance) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> &MassTolerance {
        &self.tolerance
    }

    /// Extract the chromatogram of one ion
    pub fn extract(&self, scans: &[Scan], ion: &Ion) -> Xic {
        let (lower, upper) = self.tolerance.window(ion);
        let mut times = Vec::with_capacity(scans.len());
        let mut intensities = Vec::with_capacity(scans.len());

        for scan in scans {
            times.push(scan.retention_time());
            intensities.push(scan.intensity_in_window(lower, upper));
        }

        debug!(
            "XIC m/z {:.5} [{:.5}, {:.5}] over {} scans",
            ion.mz,
            lower,
            upper,
            scans.len()
        );

        Xic {
            target_mz: ion.mz,
            lower_mz: lower,
            upper_mz: upper,
            times,
            intensities,
        }
    }

    /// Extract several ions in parallel; output order follows `ions`
    pub fn extract_all(&self, scans: &[Scan], ions: &[Ion]) -> Vec<Xic> {
        ions.par_iter().map(|ion| self.extract(scans, ion)).collect()
    }
}

/// Total ion current trace over a scan sequence
pub fn tic_trace(scans: &[Scan]) -> Xic {
    let (lower, upper) = scans
        .iter()
        .filter(|s| !s.is_empty())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.mz()[0]), hi.max(s.mz()[s.len() - 1]))
        });
    let (lower, upper) = if lower.is_finite() { (lower, upper) } else { (0.0, 0.0) };

    Xic {
        target_mz: 0.0,
        lower_mz: lower,
        upper_mz: upper,
        times: scans.iter().map(Scan::retention_time).collect(),
        intensities: scans.iter().map(Scan::total_ion_current).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scan(index: usize, rt: f64, mz: Vec<f64>, intensity: Vec<f64>) -> Scan {
        Scan::from_arrays(index, format!("scan={}", index + 1), rt, 1, mz, intensity)
    }

    #[test]
    fn test_ion_validation() {
        assert!(Ion::new(0.0).is_err());
        assert!(Ion::new(-5.0).is_err());
        assert!(Ion::new(f64::NAN).is_err());
        assert!(Ion::new(100.0).unwrap().with_range(101.0, 100.0).is_err());
        let ion = Ion::new(100.0).unwrap().with_label("[M+H]+");
        assert_eq!(ion.label(), Some("[M+H]+"));
    }

    #[test]
    fn test_tolerance_validation() {
        assert!(MassTolerance::absolute(0.0).is_err());
        assert!(MassTolerance::new(0.01, -1.0, ToleranceMode::Absolute).is_err());
        let tol = MassTolerance::relative(1e-4).unwrap();
        assert!((tol.half_window(100.0) - 0.03).abs() < 1e-12);
        let tol = MassTolerance::absolute(0.01).unwrap();
        assert!((tol.half_window(1000.0) - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_end_to_end_three_scans() {
        let scans = vec![
            scan(0, 1.0, vec![100.0, 200.0], vec![0.0, 0.0]),
            scan(1, 2.0, vec![100.0, 105.0, 200.0], vec![0.0, 500.0, 0.0]),
            scan(2, 3.0, vec![100.0, 200.0], vec![0.0, 0.0]),
        ];
        let extractor = XicExtractor::new(MassTolerance::absolute(0.01).unwrap());
        let xic = extractor.extract(&scans, &Ion::new(105.0).unwrap());
        assert_eq!(xic.times, vec![1.0, 2.0, 3.0]);
        assert_eq!(xic.intensities, vec![0.0, 500.0, 0.0]);
    }

    #[test]
    fn test_custom_range_overrides_tolerance() {
        let scans = vec![scan(0, 1.0, vec![99.0, 100.0, 101.0], vec![1.0, 2.0, 4.0])];
        let extractor = XicExtractor::default();
        let ion = Ion::new(100.0).unwrap().with_range(99.0, 101.0).unwrap();
        assert_eq!(extractor.extract(&scans, &ion).intensities, vec![7.0]);
        assert_eq!(
            extractor.extract(&scans, &Ion::new(100.0).unwrap()).intensities,
            vec![2.0]
        );
    }

    #[test]
    fn test_no_match_and_empty_scans() {
        let scans = vec![
            scan(0, 1.0, vec![], vec![]),
            scan(1, 2.0, vec![300.0], vec![9.0]),
        ];
        let extractor = XicExtractor::new(MassTolerance::absolute(0.01).unwrap());
        let xic = extractor.extract(&scans, &Ion::new(105.0).unwrap());
        assert_eq!(xic.len(), 2);
        assert_eq!(xic.total_intensity(), 0.0);
        assert!(extractor.extract(&[], &Ion::new(105.0).unwrap()).is_empty());
    }

    #[test]
    fn test_extract_all_preserves_order() {
        let scans = vec![scan(0, 1.0, vec![100.0, 200.0], vec![1.0, 2.0])];
        let ions = vec![Ion::new(200.0).unwrap(), Ion::new(100.0).unwrap()];
        let xics = XicExtractor::new(MassTolerance::absolute(0.01).unwrap())
            .extract_all(&scans, &ions);
        assert_eq!(xics[0].intensities, vec![2.0]);
        assert_eq!(xics[1].intensities, vec![1.0]);
    }

    #[test]
    fn test_tic_trace() {
        let scans = vec![
            scan(0, 1.0, vec![100.0, 200.0], vec![1.0, 2.0]),
            scan(1, 2.0, vec![150.0], vec![5.0]),
        ];
        let tic = tic_trace(&scans);
        assert_eq!(tic.intensities, vec![3.0, 5.0]);
        assert_eq!((tic.lower_mz, tic.upper_mz), (100.0, 200.0));
    }

    proptest! {
        #[test]
        fn prop_matches_brute_force(
            points in prop::collection::vec((50.0f64..150.0, 0.0f64..1e6), 0..64),
            target in 60.0f64..140.0,
            accuracy in 1e-3f64..2.0,
        ) {
            let (mz, intensity): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
            let scans = vec![scan(0, 1.0, mz.clone(), intensity.clone())];
            let tolerance = MassTolerance::absolute(accuracy).unwrap();
            let (lo, hi) = tolerance.window(&Ion::new(target).unwrap());
            let expected: f64 = mz
                .iter()
                .zip(&intensity)
                .filter(|(&m, _)| m >= lo && m <= hi)
                .map(|(_, &i)| i)
                .sum();
            let xic = XicExtractor::new(tolerance).extract(&scans, &Ion::new(target).unwrap());
            prop_assert!((xic.intensities[0] - expected).abs() <= 1e-6 * expected.max(1.0));
        }
    }
}
