use anyhow::{Context, Result};
use log::{info, warn};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use mzquant::chromatogram::{lls_baseline_correction, load_trace};
use mzquant::peaks::{IntegrationConfig, PeakIntegrator};

/// Integrate every peak of a detector trace
pub fn run(
    file: PathBuf,
    baseline: bool,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    // detector traces use the LC preset unless a config file says otherwise
    let settings = match config.as_deref() {
        Some(path) => super::config::load(Some(path))?.integration,
        None => mzquant::config::IntegrationSettings {
            params: IntegrationConfig::lc(),
            rt_window: None,
        },
    };

    let trace = load_trace(&file).with_context(|| format!("Failed to load {}", file.display()))?;
    let values = if baseline {
        info!("Applying LLS baseline correction");
        lls_baseline_correction(&trace.values).corrected
    } else {
        trace.values.clone()
    };

    let integrator = PeakIntegrator::new(settings.params);
    let peaks = match integrator.integrate_all(&trace.times, &values, settings.rt_window) {
        Ok(peaks) => peaks,
        Err(e) => {
            warn!("No peaks integrated: {}", e);
            Vec::new()
        }
    };

    println!("Detector Trace Peaks");
    println!("====================");
    println!("File: {} ({} points)", file.display(), trace.len());
    println!();
    println!(
        "  {:>3}  {:>9}  {:>9}  {:>9}  {:>12}  {:>7}",
        "#", "apex", "start", "end", "area", "quality"
    );
    for (i, peak) in peaks.iter().enumerate() {
        println!(
            "  {:>3}  {:>9.3}  {:>9.3}  {:>9.3}  {:>12.3}  {:>7.2}",
            i + 1,
            peak.apex_time,
            peak.start_time,
            peak.end_time,
            peak.corrected_area,
            peak.quality_score
        );
    }

    if let Some(path) = &output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &peaks)
            .context("Failed to write peaks")?;
        info!("Peaks written to {}", path.display());
    }
    Ok(())
}
