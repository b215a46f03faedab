//! Result records and the batch report

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::calibration::{CalibrationCurve, IonMeasurement, SignalSource};
use crate::peaks::{IntegrationMethod, PeakRegion};
use crate::xic::{Ion, Xic};

use super::sink::IonKey;

/// Integration result of one ion in one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IonResult {
    pub file: String,
    pub compound: String,
    /// Position of the ion within its compound
    pub ion_index: usize,
    pub mz: f64,
    pub label: Option<String>,
    pub apex_time: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub left: usize,
    pub right: usize,
    pub raw_area: f64,
    pub corrected_area: f64,
    pub snr: f64,
    pub quality_score: f64,
    pub method: IntegrationMethod,
    /// Sum of the whole XIC
    pub intensity_sum: f64,
}

impl IonResult {
    pub fn new(
        file: &str,
        compound: &str,
        ion_index: usize,
        ion: &Ion,
        xic: &Xic,
        region: &PeakRegion,
    ) -> Self {
        Self {
            file: file.to_string(),
            compound: compound.to_string(),
            ion_index,
            mz: ion.mz(),
            label: ion.label().map(str::to_string),
            apex_time: region.apex_time,
            start_time: region.start_time,
            end_time: region.end_time,
            left: region.left,
            right: region.right,
            raw_area: region.raw_area,
            corrected_area: region.corrected_area,
            snr: region.snr,
            quality_score: region.quality_score,
            method: region.method,
            intensity_sum: xic.total_intensity(),
        }
    }

    pub fn key(&self) -> IonKey {
        (self.file.clone(), self.compound.clone(), self.ion_index)
    }

    /// What this ion contributes to its compound signal
    pub fn measurement(&self) -> IonMeasurement {
        IonMeasurement {
            corrected_area: (self.method != IntegrationMethod::FallbackSum)
                .then_some(self.corrected_area),
            intensity_sum: self.intensity_sum,
        }
    }
}

/// Signal and concentration of one compound in one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompoundResult {
    pub file: String,
    pub compound: String,
    pub signal: f64,
    pub source: SignalSource,
    /// Known concentration of a calibration file (mM)
    pub expected_concentration: Option<f64>,
    /// Concentration read from the calibration curve (mM)
    pub concentration: Option<f64>,
}

/// Per-file summary of a successful run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub file: String,
    pub scans: usize,
    pub skipped_scans: usize,
    pub filtered_scans: usize,
}

/// Outcome of one file in a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Ok(FileSummary),
    Failed { file: String, error: String },
}

impl FileOutcome {
    pub fn file(&self) -> &str {
        match self {
            FileOutcome::Ok(summary) => &summary.file,
            FileOutcome::Failed { file, .. } => file,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, FileOutcome::Ok(_))
    }
}

/// Everything a batch produced
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub files: Vec<FileOutcome>,
    pub ions: Vec<IonResult>,
    pub compounds: Vec<CompoundResult>,
    pub curves: BTreeMap<String, CalibrationCurve>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.len() - self.succeeded()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Pretty-printed JSON of the whole report
    pub fn write_json<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, self)
    }

    /// One CSV row per ion result
    pub fn write_ion_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for ion in &self.ions {
            csv_writer.serialize(ion)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Format the summary with colors (requires console feature)
    pub fn format_colored(&self) -> String {
        #[cfg(feature = "colorized_output")]
        {
            use console::{style, Emoji};

            static OK: Emoji<'_, '_> = Emoji("✓", "[OK]");
            static FAIL: Emoji<'_, '_> = Emoji("✗", "[FAIL]");

            let mut output = String::new();
            output.push_str(&format!("{}\n", style("mzquant Batch Report").bold().cyan()));
            output.push_str(&format!("{}\n", style("====================").cyan()));
            output.push_str(&format!(
                "{}: {}\n\n",
                style("Generated").bold(),
                self.generated_at.to_rfc3339()
            ));

            for outcome in &self.files {
                match outcome {
                    FileOutcome::Ok(s) => output.push_str(&format!(
                        "[{}] {} ({} scans, {} skipped)\n",
                        OK,
                        style(&s.file).green(),
                        s.scans,
                        s.skipped_scans
                    )),
                    FileOutcome::Failed { file, error } => output.push_str(&format!(
                        "[{}] {} - {}: {}\n",
                        FAIL,
                        style(file).red(),
                        style("FAILED").red().bold(),
                        error
                    )),
                }
            }

            if !self.curves.is_empty() {
                output.push_str(&format!("\n{}\n", style("Calibration").bold()));
                for (compound, curve) in &self.curves {
                    let r2 = format!("{:.4}", curve.r_squared());
                    let r2 = if curve.r_squared() < 0.75 {
                        style(r2).yellow()
                    } else {
                        style(r2).green()
                    };
                    output.push_str(&format!(
                        "  {}: slope {:.4}, intercept {:.4}, r² {}\n",
                        compound,
                        curve.slope(),
                        curve.intercept(),
                        r2
                    ));
                }
            }

            output.push_str(&format!(
                "\n{}: {} files processed, {} failed, {} ion results\n",
                style("Summary").bold(),
                style(self.succeeded()).green(),
                style(self.failed()).red(),
                self.ions.len()
            ));
            output
        }

        #[cfg(not(feature = "colorized_output"))]
        {
            format!("{}", self)
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "mzquant Batch Report")?;
        writeln!(f, "====================")?;
        writeln!(f, "Generated: {}", self.generated_at.to_rfc3339())?;
        writeln!(f)?;

        for outcome in &self.files {
            match outcome {
                FileOutcome::Ok(s) => writeln!(
                    f,
                    "[✓] {} ({} scans, {} skipped)",
                    s.file, s.scans, s.skipped_scans
                )?,
                FileOutcome::Failed { file, error } => {
                    writeln!(f, "[✗] {} - FAILED: {}", file, error)?
                }
            }
        }

        if !self.curves.is_empty() {
            writeln!(f)?;
            writeln!(f, "Calibration")?;
            for (compound, curve) in &self.curves {
                writeln!(
                    f,
                    "  {}: slope {:.4}, intercept {:.4}, r² {:.4}",
                    compound,
                    curve.slope(),
                    curve.intercept(),
                    curve.r_squared()
                )?;
            }
        }

        writeln!(f)?;
        write!(
            f,
            "Summary: {} files processed, {} failed, {} ion results",
            self.succeeded(),
            self.failed(),
            self.ions.len()
        )
    }
}
