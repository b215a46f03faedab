use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use mzquant::compound::load_ion_lists;
use mzquant::pipeline::Pipeline;

use super::ProcessingOverrides;

/// Process a batch of mzML files
pub fn run(
    inputs: Vec<PathBuf>,
    ions: PathBuf,
    list: Option<String>,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    csv: Option<PathBuf>,
    overrides: ProcessingOverrides,
) -> Result<()> {
    let config = super::config::load(config.as_deref())?;
    let config = super::config::apply(config, &overrides)?;

    if let Some(threads) = config.batch.threads {
        log::debug!("Using {} threads", threads);
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure the thread pool")?;
    }

    let lists = load_ion_lists(&ions)
        .with_context(|| format!("Failed to load ion lists: {}", ions.display()))?;
    let wanted = list.or_else(|| config.batch.ion_list.clone());
    let ion_list = match wanted {
        Some(name) => lists
            .into_iter()
            .find(|l| l.name == name)
            .with_context(|| format!("Ion list '{}' not found in {}", name, ions.display()))?,
        None => lists
            .into_iter()
            .next()
            .with_context(|| format!("No ion list in {}", ions.display()))?,
    };

    info!("mzquant - targeted quantitation");
    info!("===============================");
    info!("Files: {}", inputs.len());
    info!(
        "Ion list: {} ({} compounds)",
        ion_list.name,
        ion_list.compounds.len()
    );
    info!(
        "Mass accuracy: {} ({:?})",
        config.xic.mass_accuracy, config.xic.mode
    );

    let pipeline = Pipeline::new(&config).context("Invalid settings")?;
    let report = pipeline.process_batch(&inputs, &ion_list.compounds);

    if let Some(path) = &output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create report: {}", path.display()))?;
        report
            .write_json(BufWriter::new(file))
            .context("Failed to write JSON report")?;
        info!("Report written to {}", path.display());
    }
    if let Some(path) = &csv {
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV: {}", path.display()))?;
        report
            .write_ion_csv(BufWriter::new(file))
            .context("Failed to write CSV results")?;
        info!("Ion results written to {}", path.display());
    }

    println!("{}", report.format_colored());

    if report.succeeded() == 0 {
        anyhow::bail!("No input file could be processed");
    }
    Ok(())
}
