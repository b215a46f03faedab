//! Configuration loading for the command line
//!
//! Settings come from an optional `mzquant.toml` (see
//! [`mzquant::config::ProcessingConfig`]); flags given on the command line
//! take precedence over the file.

use anyhow::{Context, Result};
use std::path::Path;

use mzquant::config::ProcessingConfig;
use mzquant::peaks::RtWindow;

use super::ProcessingOverrides;

/// Load the configuration file, or the defaults when none is given
pub fn load(path: Option<&Path>) -> Result<ProcessingConfig> {
    match path {
        Some(path) => ProcessingConfig::from_file(path)
            .with_context(|| format!("Failed to load config file: {}", path.display())),
        None => Ok(ProcessingConfig::default()),
    }
}

/// Apply command line overrides and re-validate
pub fn apply(mut config: ProcessingConfig, overrides: &ProcessingOverrides) -> Result<ProcessingConfig> {
    if let Some(accuracy) = overrides.mass_accuracy {
        config.xic.mass_accuracy = accuracy;
    }
    if let Some(mode) = overrides.tolerance {
        config.xic.mode = mode.into();
    }
    if let Some(level) = overrides.ms_level {
        config.scans.ms_level = level;
        config.scans.all_levels = false;
    }
    if let (Some(start), Some(end)) = (overrides.rt_start, overrides.rt_end) {
        config.integration.rt_window = Some(RtWindow::new(start, end));
    }
    if overrides.threads.is_some() {
        config.batch.threads = overrides.threads;
    }

    config.validate().context("Invalid settings")?;
    Ok(config)
}
