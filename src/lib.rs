//! # mzquant - Targeted LC-MS Quantitation
//!
//! `mzquant` turns mzML measurements into analyte concentrations:
//!
//! 1. **Spectrum decoding**: a streaming mzML reader captures each spectrum's
//!    Base64 arrays and decodes them (zlib, 32/64-bit floats) into immutable
//!    [`scan::Scan`] records, in parallel batches.
//! 2. **Extracted ion chromatograms**: for every target ion, the intensity
//!    inside a mass tolerance window is summed per scan.
//! 3. **Peak integration**: the dominant chromatographic peak is located by
//!    prominence, its boundaries walked out to the baseline and its
//!    baseline-corrected area scored for quality.
//! 4. **Calibration**: compound signals of calibration files fit a linear
//!    curve that is inverted for the samples.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mzquant::prelude::*;
//!
//! let scans = ScanStore::load("STMIX_5mM.mzML", ScanStoreOptions::default())?.scans;
//! let ion = Ion::new(147.1128)?.with_label("[M+H]+");
//!
//! let xic = XicExtractor::new(MassTolerance::default()).extract(&scans, &ion);
//! let peak = PeakIntegrator::default().integrate_or_fallback(&xic.times, &xic.intensities, None);
//! println!(
//!     "apex {:.2} min, area {:.1}, quality {:.2}",
//!     peak.apex_time, peak.corrected_area, peak.quality_score
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Batches
//!
//! ```rust,no_run
//! use mzquant::prelude::*;
//! use std::path::PathBuf;
//!
//! let config = ProcessingConfig::default();
//! let lists = load_ion_lists("ions.json")?;
//! let pipeline = Pipeline::new(&config)?;
//! let files = vec![PathBuf::from("STMIX_1mM.mzML"), PathBuf::from("STMIX_5mM.mzML"), PathBuf::from("sample.mzML")];
//! let report = pipeline.process_batch(&files, &lists[0].compounds);
//! println!("{}", report);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - [`mzml`]: streaming mzML reader and Base64 array decoder
//! - [`scan`]: the immutable scan record
//! - [`store`]: scan iteration, MS level filter, cancellation
//! - [`xic`]: ions, mass tolerance, XIC extraction
//! - [`peaks`]: peak detection, integration and quality scoring
//! - [`calibration`]: compound signals, calibration curves, concentrations
//! - [`compound`]: target compounds and JSON ion lists
//! - [`chromatogram`]: detector traces and LLS baseline correction
//! - [`config`]: TOML processing configuration
//! - [`pipeline`]: per-file and batch processing, reports

#![allow(clippy::too_many_arguments)]

pub mod calibration;
pub mod chromatogram;
pub mod compound;
pub mod config;
pub mod mzml;
pub mod peaks;
pub mod pipeline;
pub mod scan;
pub mod store;
pub mod xic;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::calibration::{
        compound_signal, parse_concentration, CalibrationConfig, CalibrationCurve,
        CalibrationError, Calibrator, ConcentrationResult, IonMeasurement, SignalSource,
    };
    pub use crate::chromatogram::{lls_baseline_correction, load_trace, ChromatogramError, Trace};
    pub use crate::compound::{load_ion_lists, Compound, IonList};
    pub use crate::config::{ConfigError, ProcessingConfig};
    pub use crate::mzml::{DecodeError, MzMLStreamer, ParseError};
    pub use crate::peaks::{
        InsufficientDataError, IntegrationConfig, IntegrationMethod, PeakIntegrator, PeakRegion,
        RtWindow,
    };
    pub use crate::pipeline::{
        BatchReport, CompoundResult, FileOutcome, IonResult, Pipeline, PipelineError,
    };
    pub use crate::scan::Scan;
    pub use crate::store::{CancellationToken, ScanIterator, ScanStore, ScanStoreOptions};
    pub use crate::xic::{tic_trace, Ion, MassTolerance, ToleranceMode, Xic, XicError, XicExtractor};
}
