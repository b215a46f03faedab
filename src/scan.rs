//! Immutable scan records
//!
//! A [`Scan`] is produced once by the scan store and never mutated afterwards,
//! so it can be shared by reference between XIC tasks without locking.
//!
//! Construction enforces the invariants every downstream window query relies on:
//!
//! - m/z and intensity arrays have equal length (the longer one is truncated)
//! - every m/z value is finite (NaN or infinite points are dropped with their intensity)
//! - the m/z axis is non-decreasing (both arrays are co-sorted, stably, when not)
//! - the total ion current is the sum of the intensity array

use std::ops::Range;

use log::debug;
use serde::Serialize;

/// One decoded spectrum, reduced to what quantitation needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scan {
    index: usize,
    native_id: String,
    retention_time: f64,
    ms_level: u8,
    mz: Vec<f64>,
    intensity: Vec<f64>,
    total_ion_current: f64,
}

impl Scan {
    /// Build a scan from decoded arrays, applying the truncation and ordering policy.
    ///
    /// `retention_time` is in minutes.
    pub fn from_arrays(
        index: usize,
        native_id: impl Into<String>,
        retention_time: f64,
        ms_level: u8,
        mut mz: Vec<f64>,
        mut intensity: Vec<f64>,
    ) -> Self {
        let native_id = native_id.into();

        if mz.len() != intensity.len() {
            let len = mz.len().min(intensity.len());
            debug!(
                "scan {} ({}): m/z has {} points, intensity has {}; truncating to {}",
                index,
                native_id,
                mz.len(),
                intensity.len(),
                len
            );
            mz.truncate(len);
            intensity.truncate(len);
        }

        if mz.iter().any(|m| !m.is_finite()) {
            let before = mz.len();
            let (kept_mz, kept_intensity): (Vec<f64>, Vec<f64>) = mz
                .into_iter()
                .zip(intensity)
                .filter(|(m, _)| m.is_finite())
                .unzip();
            debug!(
                "scan {} ({}): dropped {} non-finite m/z points",
                index,
                native_id,
                before - kept_mz.len()
            );
            mz = kept_mz;
            intensity = kept_intensity;
        }

        if !is_non_decreasing(&mz) {
            let mut order: Vec<usize> = (0..mz.len()).collect();
            // sort_by is stable: equal masses keep their acquisition order
            order.sort_by(|&a, &b| mz[a].total_cmp(&mz[b]));
            mz = order.iter().map(|&i| mz[i]).collect();
            intensity = order.iter().map(|&i| intensity[i]).collect();
        }

        let total_ion_current = intensity.iter().sum();

        Self {
            index,
            native_id,
            retention_time,
            ms_level,
            mz,
            intensity,
            total_ion_current,
        }
    }

    /// Position of the spectrum in the source file (0-based)
    pub fn index(&self) -> usize {
        self.index
    }

    /// Native spectrum identifier, e.g. `scan=42`
    pub fn native_id(&self) -> &str {
        &self.native_id
    }

    /// Retention time in minutes
    pub fn retention_time(&self) -> f64 {
        self.retention_time
    }

    /// MS level (1 for survey scans)
    pub fn ms_level(&self) -> u8 {
        self.ms_level
    }

    /// Ascending m/z axis
    pub fn mz(&self) -> &[f64] {
        &self.mz
    }

    /// Intensities aligned with [`Scan::mz`]
    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    /// Sum of all intensities
    pub fn total_ion_current(&self) -> f64 {
        self.total_ion_current
    }

    /// Number of data points
    pub fn len(&self) -> usize {
        self.mz.len()
    }

    /// True when the scan holds no data points
    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    /// Index range of points with `lower <= mz <= upper`, found by binary search.
    pub fn window_indices(&self, lower: f64, upper: f64) -> Range<usize> {
        let start = self.mz.partition_point(|&m| m < lower);
        let end = self.mz.partition_point(|&m| m <= upper);
        start..end.max(start)
    }

    /// Summed intensity inside the inclusive m/z window.
    pub fn intensity_in_window(&self, lower: f64, upper: f64) -> f64 {
        self.intensity[self.window_indices(lower, upper)].iter().sum()
    }
}

fn is_non_decreasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] <= w[1])
}
