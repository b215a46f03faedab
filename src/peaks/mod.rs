//! # Peak Detector & Integrator
//!
//! Finds the dominant chromatographic peak in a time series, integrates it
//! against a linear baseline and scores the result. The same code path serves
//! MS-derived XICs and LC detector traces.
//!
//! ## Pipeline
//!
//! 1. Restrict the series to the optional retention time window
//! 2. Compute [`SignalStats`] and the prominence threshold of the [`PeakStrategy`]
//! 3. Pick the tallest local maximum whose prominence clears the threshold
//! 4. Walk outward from the apex to the boundaries
//! 5. Subtract a baseline drawn between the two boundary intensities
//! 6. Integrate with the trapezoid rule and score quality
//!
//! [`PeakIntegrator::integrate_or_fallback`] never fails: when detection is not
//! possible it returns a [`IntegrationMethod::FallbackSum`] region with a quality
//! score of 0 and logs the degradation.
//!
//! ## Example
//!
//! ```rust
//! use mzquant::peaks::{IntegrationConfig, PeakIntegrator};
//!
//! let times = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let intensities = [0.0, 2_000.0, 50_000.0, 2_000.0, 0.0];
//!
//! let integrator = PeakIntegrator::new(IntegrationConfig::default());
//! let peak = integrator.integrate(&times, &intensities, None)?;
//! assert_eq!(peak.apex, 2);
//! assert!(peak.corrected_area > 0.0);
//! # Ok::<(), mzquant::peaks::InsufficientDataError>(())
//! ```

use std::ops::Range;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

mod quality;
mod stats;
mod strategy;

pub use quality::QualityMetrics;
pub use stats::{percentile, trapezoid, SignalStats};
pub use strategy::{AdaptiveStrategy, PeakStrategy};

use strategy::{local_maxima, prominence};

/// Why a peak could not be detected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InsufficientDataError {
    /// Time and intensity series differ in length
    #[error("time series has {times} points but intensity series has {intensities}")]
    LengthMismatch { times: usize, intensities: usize },

    /// Not enough points inside the window
    #[error("only {found} points available, at least {required} required")]
    TooFewPoints { found: usize, required: usize },

    /// No local maximum clears the prominence threshold
    #[error("no peak candidate exceeds prominence threshold {threshold:.3}")]
    NoCandidate { threshold: f64 },
}

/// How a [`PeakRegion`] was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    /// Detected peak, trapezoidal integration against a linear baseline
    Trapezoidal,
    /// Detection failed; the area is the plain intensity sum
    FallbackSum,
}

/// Inclusive retention time window in minutes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RtWindow {
    pub start: f64,
    pub end: f64,
}

impl RtWindow {
    pub fn new(start: f64, end: f64) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Index range of `times` (non-decreasing) inside the window
    fn index_range(&self, times: &[f64]) -> Range<usize> {
        let start = times.partition_point(|&t| t < self.start);
        let end = times.partition_point(|&t| t <= self.end);
        start..end.max(start)
    }
}

/// Tunables of peak detection and integration
///
/// Widths are in minutes. Defaults are tuned for MS XICs; see
/// [`IntegrationConfig::lc`] for detector traces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Minimum number of points inside the window
    pub min_points: usize,
    /// Minimum peak width
    pub min_width: f64,
    /// Maximum distance of a boundary from the apex
    pub max_width: f64,
    /// Absolute intensity floor for the boundary walk
    pub noise_floor: f64,
    /// Absolute floor of the prominence threshold
    pub prominence_floor: f64,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            min_points: 3,
            min_width: 0.1,
            max_width: 5.0,
            noise_floor: 1000.0,
            prominence_floor: 5.0,
        }
    }
}

impl IntegrationConfig {
    /// Preset for UV/VIS detector traces (absorbance units)
    pub fn lc() -> Self {
        Self {
            min_width: 0.05,
            max_width: 2.0,
            noise_floor: 10.0,
            ..Self::default()
        }
    }
}

/// One integrated peak; indices refer to the full input series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakRegion {
    pub apex: usize,
    pub left: usize,
    pub right: usize,
    pub apex_time: f64,
    pub start_time: f64,
    pub end_time: f64,
    /// Baseline intensity at the left boundary
    pub baseline_start: f64,
    /// Baseline intensity at the right boundary
    pub baseline_end: f64,
    /// Apex height above the baseline
    pub peak_height: f64,
    pub raw_area: f64,
    pub corrected_area: f64,
    pub snr: f64,
    pub quality_score: f64,
    pub method: IntegrationMethod,
}

impl PeakRegion {
    pub fn is_fallback(&self) -> bool {
        self.method == IntegrationMethod::FallbackSum
    }

    /// Number of points between the boundaries, inclusive
    pub fn width_points(&self) -> usize {
        self.right - self.left + 1
    }
}

/// The windowed view of a series the detector works on
struct Trace<'a> {
    times: &'a [f64],
    values: &'a [f64],
    offset: usize,
    stats: SignalStats,
}

/// Peak detector and integrator
///
/// Stateless between calls; one instance can be shared across threads.
#[derive(Debug)]
pub struct PeakIntegrator {
    config: IntegrationConfig,
    strategy: Box<dyn PeakStrategy>,
}

impl Default for PeakIntegrator {
    fn default() -> Self {
        Self::new(IntegrationConfig::default())
    }
}

impl PeakIntegrator {
    /// Integrator with the [`AdaptiveStrategy`] built from `config`
    pub fn new(config: IntegrationConfig) -> Self {
        Self {
            config,
            strategy: Box::new(AdaptiveStrategy::from_config(&config)),
        }
    }

    /// Integrator with a custom threshold policy
    pub fn with_strategy(config: IntegrationConfig, strategy: Box<dyn PeakStrategy>) -> Self {
        Self { config, strategy }
    }

    pub fn config(&self) -> &IntegrationConfig {
        &self.config
    }

    /// Detect and integrate the dominant peak
    pub fn integrate(
        &self,
        times: &[f64],
        intensities: &[f64],
        window: Option<RtWindow>,
    ) -> Result<PeakRegion, InsufficientDataError> {
        let trace = self.prepare(times, intensities, window)?;
        let threshold = self.strategy.prominence_threshold(&trace.stats);

        let apex = self
            .candidates(&trace, threshold)
            .into_iter()
            .fold(None, |best: Option<usize>, idx| match best {
                Some(b) if trace.values[b] >= trace.values[idx] => Some(b),
                _ => Some(idx),
            })
            .ok_or(InsufficientDataError::NoCandidate { threshold })?;

        Ok(self.integrate_at(&trace, apex))
    }

    /// [`PeakIntegrator::integrate`], substituting the intensity sum on failure
    pub fn integrate_or_fallback(
        &self,
        times: &[f64],
        intensities: &[f64],
        window: Option<RtWindow>,
    ) -> PeakRegion {
        match self.integrate(times, intensities, window) {
            Ok(region) => region,
            Err(e) => {
                warn!("Peak integration degraded to intensity sum: {}", e);
                fallback_region(times, intensities, window)
            }
        }
    }

    /// Integrate every candidate peak, in time order
    ///
    /// Used for detector traces that carry several compounds. Regions of
    /// neighbouring peaks may overlap.
    pub fn integrate_all(
        &self,
        times: &[f64],
        intensities: &[f64],
        window: Option<RtWindow>,
    ) -> Result<Vec<PeakRegion>, InsufficientDataError> {
        let trace = self.prepare(times, intensities, window)?;
        let threshold = self.strategy.prominence_threshold(&trace.stats);
        Ok(self
            .candidates(&trace, threshold)
            .into_iter()
            .map(|apex| self.integrate_at(&trace, apex))
            .collect())
    }

    fn prepare<'a>(
        &self,
        times: &'a [f64],
        intensities: &'a [f64],
        window: Option<RtWindow>,
    ) -> Result<Trace<'a>, InsufficientDataError> {
        if times.len() != intensities.len() {
            return Err(InsufficientDataError::LengthMismatch {
                times: times.len(),
                intensities: intensities.len(),
            });
        }

        let range = window.map_or(0..times.len(), |w| w.index_range(times));
        let required = self.config.min_points.max(1);
        if range.len() < required {
            return Err(InsufficientDataError::TooFewPoints {
                found: range.len(),
                required,
            });
        }

        let values = &intensities[range.clone()];
        Ok(Trace {
            times: &times[range.clone()],
            values,
            offset: range.start,
            stats: SignalStats::from_values(values),
        })
    }

    fn candidates(&self, trace: &Trace<'_>, threshold: f64) -> Vec<usize> {
        let candidates: Vec<usize> = local_maxima(trace.values)
            .into_iter()
            .filter(|&p| prominence(trace.values, p) > threshold)
            .collect();
        debug!(
            "{} peak candidates above prominence {:.3} (max {:.3}, noise {:.3})",
            candidates.len(),
            threshold,
            trace.stats.max,
            trace.stats.noise
        );
        candidates
    }

    /// Boundaries, baseline, areas and quality for the apex at `apex` (window index)
    fn integrate_at(&self, trace: &Trace<'_>, apex: usize) -> PeakRegion {
        let (t, y) = (trace.times, trace.values);
        let (left, right) = self.boundaries(trace, apex);

        let baseline_start = y[left];
        let baseline_end = y[right];
        let baseline: Vec<f64> = if right > left {
            let span = (right - left) as f64;
            (left..=right)
                .map(|j| baseline_start + (baseline_end - baseline_start) * (j - left) as f64 / span)
                .collect()
        } else {
            vec![baseline_start]
        };

        let raw_area = trapezoid(&t[left..=right], &y[left..=right]).max(0.0);
        let baseline_area = trapezoid(&t[left..=right], &baseline);
        let corrected_area = clamp_area(raw_area - baseline_area, raw_area);

        let baseline_at_apex = baseline[apex - left];
        let quality = quality::score(y, left, right, apex, baseline_at_apex, trace.stats.noise);

        PeakRegion {
            apex: trace.offset + apex,
            left: trace.offset + left,
            right: trace.offset + right,
            apex_time: t[apex],
            start_time: t[left],
            end_time: t[right],
            baseline_start,
            baseline_end,
            peak_height: y[apex] - baseline_at_apex,
            raw_area,
            corrected_area,
            snr: quality.snr,
            quality_score: quality.score,
            method: IntegrationMethod::Trapezoidal,
        }
    }

    /// Walk outward from the apex, then widen to the minimum width
    fn boundaries(&self, trace: &Trace<'_>, apex: usize) -> (usize, usize) {
        let (t, y) = (trace.times, trace.values);
        let last = y.len() - 1;
        let stop = self.strategy.stop_intensity(&trace.stats, y[apex]);
        let valley = self.strategy.valley_limit(stop);
        let max_width = self.config.max_width;

        let mut left = apex;
        for i in (0..apex).rev() {
            if t[apex] - t[i] > max_width {
                break;
            }
            left = i;
            if y[i] <= stop {
                break;
            }
            if i > 0 && y[i] < y[i - 1] && y[i] < y[i + 1] && y[i] <= valley {
                break;
            }
        }

        let mut right = apex;
        for i in apex + 1..=last {
            if t[i] - t[apex] > max_width {
                break;
            }
            right = i;
            if y[i] <= stop {
                break;
            }
            if i < last && y[i] < y[i - 1] && y[i] < y[i + 1] && y[i] <= valley {
                break;
            }
        }

        while t[right] - t[left] < self.config.min_width && (left > 0 || right < last) {
            if left > 0 {
                left -= 1;
            }
            if t[right] - t[left] < self.config.min_width && right < last {
                right += 1;
            }
        }

        (left, right)
    }
}

fn clamp_area(corrected: f64, raw: f64) -> f64 {
    if corrected.is_finite() {
        corrected.clamp(0.0, raw)
    } else {
        0.0
    }
}

/// Pseudo-region used when detection fails: the plain intensity sum
///
/// Covers the window (or the whole series) with a quality score of 0.
pub fn fallback_region(times: &[f64], intensities: &[f64], window: Option<RtWindow>) -> PeakRegion {
    let len = times.len().min(intensities.len());
    let times = &times[..len];
    let range = window.map_or(0..len, |w| w.index_range(times));

    let values = &intensities[range.clone()];
    let total = values.iter().sum::<f64>().max(0.0);
    let apex_rel = values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        });

    let (left, right, apex, height) = match apex_rel {
        Some((i, v)) => (range.start, range.end - 1, range.start + i, v),
        None => (0, 0, 0, 0.0),
    };
    let time_at = |i: usize| times.get(i).copied().unwrap_or(0.0);

    PeakRegion {
        apex,
        left,
        right,
        apex_time: time_at(apex),
        start_time: time_at(left),
        end_time: time_at(right),
        baseline_start: 0.0,
        baseline_end: 0.0,
        peak_height: height,
        raw_area: total,
        corrected_area: total,
        snr: 0.0,
        quality_score: 0.0,
        method: IntegrationMethod::FallbackSum,
    }
}
