//! Composite quality score of an integrated peak

use super::stats::{mean, std_dev};

const SNR_WEIGHT: f64 = 0.40;
const SYMMETRY_WEIGHT: f64 = 0.35;
const STABILITY_WEIGHT: f64 = 0.25;

/// SNR at which the SNR sub-score saturates
const SNR_SATURATION: f64 = 50.0;
/// Below this SNR the combined score is halved
const LOW_SNR: f64 = 3.0;
/// Flanking points considered on each side of the peak
const FLANK_POINTS: usize = 20;

/// Sub-scores and combined score, all in [0, 1] except `snr`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityMetrics {
    pub snr: f64,
    pub snr_score: f64,
    pub symmetry: f64,
    pub stability: f64,
    pub score: f64,
}

/// Score the region `left..=right` of `y` with apex `apex`
///
/// `noise` is the trace noise estimate; when it is not positive a fallback
/// of 1% of the apex height (at least 1) is used.
pub(super) fn score(
    y: &[f64],
    left: usize,
    right: usize,
    apex: usize,
    baseline_at_apex: f64,
    noise: f64,
) -> QualityMetrics {
    let apex_height = y[apex];
    let noise = if noise > 0.0 {
        noise
    } else {
        (0.01 * apex_height).max(1.0)
    };
    let snr = ((apex_height - baseline_at_apex) / noise).max(0.0);
    let snr_score = (snr / SNR_SATURATION).clamp(0.0, 1.0);

    let symmetry = symmetry(y, left, right, apex).clamp(0.0, 1.0);
    let stability = baseline_stability(y, left, right).clamp(0.0, 1.0);

    let mut combined =
        SNR_WEIGHT * snr_score + SYMMETRY_WEIGHT * symmetry + STABILITY_WEIGHT * stability;
    if snr < LOW_SNR {
        combined *= 0.5;
    }

    QualityMetrics {
        snr,
        snr_score,
        symmetry,
        stability,
        score: if combined.is_finite() {
            combined.clamp(0.0, 1.0)
        } else {
            0.0
        },
    }
}

/// Mean of point-count balance and a USP tailing score at 10% height
fn symmetry(y: &[f64], left: usize, right: usize, apex: usize) -> f64 {
    let lead = (apex - left) as f64;
    let tail = (right - apex) as f64;
    let balance = 1.0 - (lead - tail).abs() / (lead + tail).max(1.0);

    let region = &y[left..=right];
    if region.len() <= 4 {
        return balance;
    }

    let apex_rel = apex - left;
    let level = 0.1 * region[apex_rel];
    let closest = |values: &[f64]| {
        values
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - level).abs().total_cmp(&(b.1 - level).abs()))
            .map_or(0, |(i, _)| i)
    };

    let left10 = if apex_rel > 0 {
        closest(&region[..apex_rel])
    } else {
        0
    };
    let right10 = apex_rel + closest(&region[apex_rel..]);

    if right10 <= left10 {
        return balance;
    }

    let front = apex_rel - left10;
    let tailing_score = if front == 0 {
        0.0
    } else {
        let tailing_factor = (right10 - left10) as f64 / (2.0 * front as f64);
        (1.0 - (tailing_factor - 1.0).abs()).max(0.0)
    };
    (balance + tailing_score) / 2.0
}

/// 1 - relative variability of up to 20 points on each side of the peak
fn baseline_stability(y: &[f64], left: usize, right: usize) -> f64 {
    let before = &y[left.saturating_sub(FLANK_POINTS)..left];
    let after_end = (right + 1 + FLANK_POINTS).min(y.len());
    let after = &y[(right + 1).min(after_end)..after_end];

    let flanks: Vec<f64> = before.iter().chain(after).copied().collect();
    if flanks.len() < 2 {
        return 1.0;
    }

    let ratio = std_dev(&flanks) / (mean(&flanks) + 1.0);
    if ratio.is_finite() {
        (1.0 - ratio).max(0.0)
    } else {
        0.0
    }
}
