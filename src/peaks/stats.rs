//! Summary statistics of a chromatographic trace

/// Statistics the detection heuristics are derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalStats {
    /// Largest intensity
    pub max: f64,
    /// Population standard deviation of all intensities
    pub std: f64,
    /// Standard deviation of the intensities at or below the 25th percentile
    pub noise: f64,
    /// 10th percentile of the intensities
    pub baseline: f64,
}

impl SignalStats {
    /// Compute the statistics of `values`; an empty slice gives all zeros
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                max: 0.0,
                std: 0.0,
                noise: 0.0,
                baseline: 0.0,
            };
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let q25 = percentile(&sorted, 25.0);
        let quiet: Vec<f64> = values.iter().copied().filter(|&v| v <= q25).collect();

        Self {
            max: sorted[sorted.len() - 1],
            std: std_dev(values),
            noise: std_dev(&quiet),
            baseline: percentile(&sorted, 10.0),
        }
    }
}

/// Percentile of already sorted data, linearly interpolated between ranks
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Trapezoidal integral of `values` over `times`
pub fn trapezoid(times: &[f64], values: &[f64]) -> f64 {
    times
        .windows(2)
        .zip(values.windows(2))
        .map(|(t, y)| 0.5 * (y[0] + y[1]) * (t[1] - t[0]))
        .sum()
}
