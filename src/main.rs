//! # mzquant
//!
//! Command-line front end for targeted LC-MS quantitation.
//!
//! ## Usage
//!
//! ```bash
//! # Quantify compounds of an ion list over calibration files and samples
//! mzquant process STMIX_*.mzML sample_*.mzML --ions ions.json -o report.json --csv ions.csv
//!
//! # Scan summary of one file
//! mzquant inspect sample.mzML
//!
//! # Integrate the peaks of a UV detector export
//! mzquant trace sample_uv.txt
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
