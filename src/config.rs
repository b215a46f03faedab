//! TOML processing configuration
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration:
//!
//! ```toml
//! # mzquant.toml
//! [scans]
//! ms_level = 1
//!
//! [xic]
//! mass_accuracy = 0.0001
//! multiplier = 3.0
//! mode = "relative"
//!
//! [integration]
//! min_points = 3
//! min_width = 0.1
//! max_width = 5.0
//! noise_floor = 1000.0
//! rt_window = { start = 2.0, end = 8.5 }
//!
//! [calibration]
//! min_r_squared = 0.75
//! prefer_peak_area = true
//!
//! [batch]
//! threads = 4
//! ion_list = "amino_acids"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationConfig;
use crate::mzml::streamer::DEFAULT_INPUT_BUFFER_SIZE;
use crate::peaks::{IntegrationConfig, RtWindow};
use crate::store::ScanStoreOptions;
use crate::xic::{MassTolerance, ToleranceMode, XicError};

/// Errors raised while loading configuration files
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON ion list: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Xic(#[from] XicError),
}

pub(crate) fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Root of `mzquant.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub scans: ScanSettings,
    pub xic: XicSettings,
    pub integration: IntegrationSettings,
    pub calibration: CalibrationConfig,
    pub batch: BatchSettings,
}

/// `[scans]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// MS level to keep
    pub ms_level: u8,
    /// Keep every MS level, ignoring `ms_level`
    pub all_levels: bool,
    /// Input buffer size in bytes
    pub buffer_size: usize,
    /// Spectra decoded per parallel batch
    pub batch_size: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            ms_level: 1,
            all_levels: false,
            buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
            batch_size: 256,
        }
    }
}

impl ScanSettings {
    /// Scan store options with a fresh cancellation token
    pub fn store_options(&self) -> ScanStoreOptions {
        ScanStoreOptions {
            ms_level: (!self.all_levels).then_some(self.ms_level),
            buffer_size: self.buffer_size,
            batch_size: self.batch_size,
            ..Default::default()
        }
    }
}

/// `[xic]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XicSettings {
    pub mass_accuracy: f64,
    pub multiplier: f64,
    pub mode: ToleranceMode,
}

impl Default for XicSettings {
    fn default() -> Self {
        let tolerance = MassTolerance::default();
        Self {
            mass_accuracy: tolerance.accuracy(),
            multiplier: tolerance.multiplier(),
            mode: tolerance.mode(),
        }
    }
}

impl XicSettings {
    pub fn tolerance(&self) -> Result<MassTolerance, XicError> {
        MassTolerance::new(self.mass_accuracy, self.multiplier, self.mode)
    }
}

/// `[integration]`: the integrator tunables plus an optional RT window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationSettings {
    #[serde(flatten)]
    pub params: IntegrationConfig,
    /// Restrict detection to this retention time range (minutes)
    pub rt_window: Option<RtWindow>,
}

/// `[batch]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Worker threads; rayon's default when unset
    pub threads: Option<usize>,
    /// Ion list to process when the JSON file holds several
    pub ion_list: Option<String>,
}

impl ProcessingConfig {
    /// Load and validate a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = read_file(path)?;
        content.parse()
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.xic.tolerance()?;

        let params = &self.integration.params;
        if params.min_points == 0 {
            return Err(ConfigError::Invalid(
                "integration.min_points must be at least 1".to_string(),
            ));
        }
        let widths_ok = params.min_width.is_finite()
            && params.min_width >= 0.0
            && params.max_width.is_finite()
            && params.max_width > 0.0;
        if !widths_ok {
            return Err(ConfigError::Invalid(format!(
                "integration widths must satisfy min_width >= 0 and max_width > 0 (got {} and {})",
                params.min_width, params.max_width
            )));
        }
        if self.scans.batch_size == 0 || self.scans.buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "scans.batch_size and scans.buffer_size must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.calibration.min_r_squared) {
            return Err(ConfigError::Invalid(format!(
                "calibration.min_r_squared must lie in [0, 1] (got {})",
                self.calibration.min_r_squared
            )));
        }
        if self.batch.threads == Some(0) {
            return Err(ConfigError::Invalid(
                "batch.threads must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::str::FromStr for ProcessingConfig {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let config: ProcessingConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}
