//! Per-file processing and parallel batches
//!
//! ```text
//! mzML ─▶ ScanStore::load ─▶ [Scan] ─┬─▶ XIC ─▶ integrate ─▶ IonResult ─┐
//!                                    ├─▶ XIC ─▶ integrate ─▶ IonResult ─┼─▶ ResultSink
//!                                    └─▶ ...  (one task per ion)       ─┘
//! ```
//!
//! Files are processed in parallel, and so are the ions of one file. Once
//! every file is done, ion results are combined into compound signals, a
//! calibration curve is fit per compound over the calibration files
//! (`STMIX` in the file name, concentration tag such as `5mM`) and the
//! remaining files are quantified.
//!
//! Files are reported under their file name, or under their full path when
//! two inputs of the batch share a file name. A file that cannot be read, or
//! an input given twice, is reported as [`FileOutcome::Failed`]; the rest of
//! the batch goes on.

mod error;
mod report;
mod sink;

pub use error::PipelineError;
pub use report::{BatchReport, CompoundResult, FileOutcome, FileSummary, IonResult};
pub use sink::{IonKey, IonResults, ResultSink, DEFAULT_SINK_CAPACITY};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use crossbeam_channel::Sender;
use log::{error, info, warn};
use rayon::prelude::*;

use crate::calibration::{
    compound_signal, concentration_from_filename, is_calibration_file, parse_concentration,
    CalibrationCurve, CalibrationSample, Calibrator, IonMeasurement, SignalSource,
};
use crate::compound::Compound;
use crate::config::{ConfigError, ProcessingConfig};
use crate::peaks::{PeakIntegrator, RtWindow};
use crate::store::{CancellationToken, ScanStore, ScanStoreOptions};
use crate::xic::{Ion, XicExtractor};

/// Results of a single file
#[derive(Debug, Clone)]
pub struct FileResult {
    pub summary: FileSummary,
    pub ions: Vec<IonResult>,
}

/// The configured processing chain
#[derive(Debug)]
pub struct Pipeline {
    scan_options: ScanStoreOptions,
    extractor: XicExtractor,
    integrator: PeakIntegrator,
    rt_window: Option<RtWindow>,
    calibrator: Calibrator,
}

impl Pipeline {
    pub fn new(config: &ProcessingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            scan_options: config.scans.store_options(),
            extractor: XicExtractor::new(config.xic.tolerance()?),
            integrator: PeakIntegrator::new(config.integration.params),
            rt_window: config.integration.rt_window,
            calibrator: Calibrator::new(config.calibration),
        })
    }

    /// Token that stops every file of this pipeline between scans
    pub fn cancellation_token(&self) -> CancellationToken {
        self.scan_options.cancel.clone()
    }

    /// Measure every ion of `compounds` in one file
    pub fn process_file<P: AsRef<Path>>(
        &self,
        path: P,
        compounds: &[Compound],
    ) -> Result<FileResult, PipelineError> {
        let sink = ResultSink::new(DEFAULT_SINK_CAPACITY)?;
        let path = path.as_ref();
        let measured = self.measure_file(path, &file_name(path), compounds, sink.sender());
        let ions = sink.finish()?.into_values().collect();
        Ok(FileResult {
            summary: measured?,
            ions,
        })
    }

    /// Process files in parallel, calibrate and quantify
    pub fn process_batch(&self, paths: &[PathBuf], compounds: &[Compound]) -> BatchReport {
        let generated_at = Utc::now();
        info!(
            "Processing {} files for {} compounds",
            paths.len(),
            compounds.len()
        );

        let labels = file_labels(paths);
        let (files, results) = match ResultSink::new(DEFAULT_SINK_CAPACITY) {
            Ok(sink) => {
                let files: Vec<FileOutcome> = paths
                    .par_iter()
                    .zip(labels.par_iter())
                    .map(|(path, (file, first))| {
                        let measured = if *first {
                            self.measure_file(path, file, compounds, sink.sender())
                        } else {
                            Err(PipelineError::DuplicateInput(path.display().to_string()))
                        };
                        match measured {
                            Ok(summary) => FileOutcome::Ok(summary),
                            Err(e) => {
                                error!("Failed to process {}: {}", file, e);
                                FileOutcome::Failed {
                                    file: file.clone(),
                                    error: e.to_string(),
                                }
                            }
                        }
                    })
                    .collect();
                match sink.finish() {
                    Ok(results) => (files, results),
                    Err(e) => (fail_all(&labels, &e), IonResults::new()),
                }
            }
            Err(e) => (fail_all(&labels, &e), IonResults::new()),
        };

        let (compounds_out, curves) = self.quantify(&files, compounds, &results);
        let report = BatchReport {
            generated_at,
            files,
            ions: results.into_values().collect(),
            compounds: compounds_out,
            curves,
        };
        info!(
            "Batch finished: {} files ok, {} failed",
            report.succeeded(),
            report.failed()
        );
        report
    }

    fn measure_file(
        &self,
        path: &Path,
        file: &str,
        compounds: &[Compound],
        sender: Sender<IonResult>,
    ) -> Result<FileSummary, PipelineError> {
        let collection = ScanStore::load(path, self.scan_options.clone())
            .map_err(|e| PipelineError::from_parse(file, e))?;
        let scans = &collection.scans;

        let jobs: Vec<(&Compound, usize, &Ion)> = compounds
            .iter()
            .flat_map(|c| c.ions().iter().enumerate().map(move |(i, ion)| (c, i, ion)))
            .collect();

        jobs.par_iter().for_each_with(sender, |tx, &(compound, index, ion)| {
            let xic = self.extractor.extract(scans, ion);
            let region =
                self.integrator
                    .integrate_or_fallback(&xic.times, &xic.intensities, self.rt_window);
            let record = IonResult::new(file, compound.name(), index, ion, &xic, &region);
            if tx.send(record).is_err() {
                warn!("Result sink closed, dropping {} ion {}", compound.name(), index);
            }
        });

        info!(
            "{}: {} scans, {} ions measured",
            file,
            scans.len(),
            jobs.len()
        );
        Ok(FileSummary {
            file: file.to_string(),
            scans: scans.len(),
            skipped_scans: collection.skipped,
            filtered_scans: collection.filtered,
        })
    }

    /// Compound signals of every successful file, curves and concentrations
    fn quantify(
        &self,
        files: &[FileOutcome],
        compounds: &[Compound],
        results: &IonResults,
    ) -> (Vec<CompoundResult>, BTreeMap<String, CalibrationCurve>) {
        let mut measurements: BTreeMap<(&str, &str), Vec<IonMeasurement>> = BTreeMap::new();
        for ion in results.values() {
            measurements
                .entry((ion.file.as_str(), ion.compound.as_str()))
                .or_default()
                .push(ion.measurement());
        }

        let known: BTreeMap<&str, f64> = files
            .iter()
            .filter(|f| f.is_ok())
            .filter_map(|f| {
                calibration_concentration(&file_name(Path::new(f.file()))).map(|c| (f.file(), c))
            })
            .collect();

        let mut curves = BTreeMap::new();
        for compound in compounds {
            let samples: Vec<CalibrationSample> = known
                .iter()
                .filter_map(|(&file, &concentration)| {
                    measurements
                        .get(&(file, compound.name()))
                        .map(|ions| CalibrationSample {
                            concentration,
                            ions: ions.clone(),
                        })
                })
                .collect();
            if samples.is_empty() {
                continue;
            }
            match self.calibrator.calibrate(compound.name(), &samples) {
                Ok(curve) => {
                    curves.insert(compound.name().to_string(), curve);
                }
                Err(e) => error!("Cannot calibrate {}: {}", compound.name(), e),
            }
        }

        let mut out = Vec::new();
        for outcome in files.iter().filter(|f| f.is_ok()) {
            let file = outcome.file();
            for compound in compounds {
                let Some(ions) = measurements.get(&(file, compound.name())) else {
                    continue;
                };
                let expected = known.get(file).copied();
                let curve = curves.get(compound.name());

                let (signal, source, concentration) = match curve {
                    Some(curve) => {
                        let prefer = curve.source() == SignalSource::PeakArea;
                        let signal = compound_signal(ions, prefer);
                        let concentration = if expected.is_none() {
                            Some(
                                self.calibrator
                                    .quantify(curve, compound.name(), file, ions)
                                    .concentration,
                            )
                        } else {
                            None
                        };
                        (signal.value, signal.source, concentration)
                    }
                    None => {
                        let signal = compound_signal(ions, true);
                        (signal.value, signal.source, None)
                    }
                };

                out.push(CompoundResult {
                    file: file.to_string(),
                    compound: compound.name().to_string(),
                    signal,
                    source,
                    expected_concentration: expected,
                    concentration,
                });
            }
        }
        (out, curves)
    }
}

/// Known concentration (mM) of a calibration file, from its name
pub fn calibration_concentration(file_name: &str) -> Option<f64> {
    if !is_calibration_file(file_name) {
        return None;
    }
    let tag = concentration_from_filename(file_name)?;
    match parse_concentration(&tag) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{}: unusable concentration tag '{}': {}", file_name, tag, e);
            None
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Report name of every batch input and whether it is the first occurrence
/// of that input
///
/// The file name is used unless another input shares it, in which case the
/// full path keeps the results of both apart.
fn file_labels(paths: &[PathBuf]) -> Vec<(String, bool)> {
    let mut name_counts: HashMap<String, usize> = HashMap::new();
    for path in paths {
        *name_counts.entry(file_name(path)).or_default() += 1;
    }

    let mut seen = HashSet::new();
    paths
        .iter()
        .map(|path| {
            let name = file_name(path);
            let shared = name_counts.get(&name).is_some_and(|&n| n > 1);
            let label = if shared {
                path.display().to_string()
            } else {
                name
            };
            let first = seen.insert(label.clone());
            (label, first)
        })
        .collect()
}

fn fail_all(labels: &[(String, bool)], e: &PipelineError) -> Vec<FileOutcome> {
    error!("{}", e);
    labels
        .iter()
        .map(|(file, _)| FileOutcome::Failed {
            file: file.clone(),
            error: e.to_string(),
        })
        .collect()
}
