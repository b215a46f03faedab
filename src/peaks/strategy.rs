//! Replaceable detection heuristics
//!
//! The integrator owns the control flow (candidate search, boundary walk,
//! baseline, areas). A [`PeakStrategy`] only supplies the thresholds, so the
//! heuristics can be tuned or swapped without touching that flow.

use super::stats::SignalStats;
use super::IntegrationConfig;

/// Threshold policy used by [`super::PeakIntegrator`]
pub trait PeakStrategy: Send + Sync + std::fmt::Debug {
    /// Minimum prominence a local maximum needs to become a candidate
    fn prominence_threshold(&self, stats: &SignalStats) -> f64;

    /// Intensity at or below which the boundary walk stops
    fn stop_intensity(&self, stats: &SignalStats, apex_height: f64) -> f64;

    /// A local minimum at or below this value also stops the walk
    fn valley_limit(&self, stop_intensity: f64) -> f64 {
        2.0 * stop_intensity
    }
}

/// Adaptive thresholds derived from the trace statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveStrategy {
    /// Absolute prominence floor
    pub prominence_floor: f64,
    /// Absolute intensity floor for the boundary walk
    pub noise_floor: f64,
}

impl AdaptiveStrategy {
    const NOISE_PROMINENCE_FACTOR: f64 = 4.0;
    const STD_PROMINENCE_FACTOR: f64 = 2.0;
    const RANGE_PROMINENCE_FRACTION: f64 = 0.005;
    const APEX_STOP_FRACTION: f64 = 0.02;
    const NOISE_STOP_FACTOR: f64 = 3.0;

    pub fn from_config(config: &IntegrationConfig) -> Self {
        Self {
            prominence_floor: config.prominence_floor,
            noise_floor: config.noise_floor,
        }
    }
}

impl Default for AdaptiveStrategy {
    fn default() -> Self {
        Self::from_config(&IntegrationConfig::default())
    }
}

impl PeakStrategy for AdaptiveStrategy {
    fn prominence_threshold(&self, stats: &SignalStats) -> f64 {
        self.prominence_floor
            .max(Self::NOISE_PROMINENCE_FACTOR * stats.noise)
            .max(Self::STD_PROMINENCE_FACTOR * stats.std)
            .max(Self::RANGE_PROMINENCE_FRACTION * (stats.max - stats.baseline))
    }

    fn stop_intensity(&self, stats: &SignalStats, apex_height: f64) -> f64 {
        self.noise_floor
            .max(Self::APEX_STOP_FRACTION * apex_height)
            .max(stats.baseline + Self::NOISE_STOP_FACTOR * stats.noise)
    }
}

/// Indices of local maxima; a flat top counts once, at its midpoint
///
/// The first and last samples are never maxima.
pub(super) fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Height of a peak above the higher of its two bounding minima
pub(super) fn prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];

    let mut left_min = height;
    for &v in x[..peak].iter().rev() {
        if v > height {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = height;
    for &v in &x[peak + 1..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}
