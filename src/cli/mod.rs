use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod config;
mod inspect;
mod process;
mod trace;

/// mzquant - Targeted LC-MS quantitation
#[derive(Parser)]
#[command(name = "mzquant")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Mass tolerance mode
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ToleranceArg {
    /// Fixed window in m/z units
    Absolute,
    /// Window proportional to the target m/z
    Relative,
}

impl From<ToleranceArg> for mzquant::xic::ToleranceMode {
    fn from(arg: ToleranceArg) -> Self {
        match arg {
            ToleranceArg::Absolute => Self::Absolute,
            ToleranceArg::Relative => Self::Relative,
        }
    }
}

/// Overrides applied on top of the configuration file
#[derive(clap::Args, Debug, Default)]
pub struct ProcessingOverrides {
    /// Mass accuracy (relative, or m/z units with --tolerance absolute)
    #[arg(short = 'm', long)]
    pub mass_accuracy: Option<f64>,

    /// Tolerance mode
    #[arg(long, value_enum)]
    pub tolerance: Option<ToleranceArg>,

    /// MS level to keep
    #[arg(long)]
    pub ms_level: Option<u8>,

    /// Start of the retention time window (minutes)
    #[arg(long, requires = "rt_end")]
    pub rt_start: Option<f64>,

    /// End of the retention time window (minutes)
    #[arg(long, requires = "rt_start")]
    pub rt_end: Option<f64>,

    /// Worker threads (rayon default when omitted)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure target compounds in mzML files and quantify them
    Process {
        /// Input mzML files
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// JSON ion list file
        #[arg(short = 'i', long, value_name = "FILE")]
        ions: PathBuf,

        /// Ion list to use when the file holds several
        #[arg(short = 'l', long)]
        list: Option<String>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Write the JSON report here (stdout summary only when omitted)
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write per-ion results as CSV
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,

        #[command(flatten)]
        overrides: ProcessingOverrides,
    },

    /// Summarize the scans of an mzML file
    Inspect {
        /// Input mzML file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Keep every MS level instead of MS1 only
        #[arg(long)]
        all_levels: bool,
    },

    /// Integrate the peaks of a delimited LC/GC detector trace
    Trace {
        /// Input text file (time in the first column, signal in the last)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Skip LLS baseline correction
        #[arg(long)]
        no_baseline: bool,

        /// Load integration settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Write the detected peaks as JSON
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Process {
            inputs,
            ions,
            list,
            config,
            output,
            csv,
            overrides,
        } => process::run(inputs, ions, list, config, output, csv, overrides),
        Commands::Inspect { file, all_levels } => inspect::run(file, all_levels),
        Commands::Trace {
            file,
            no_baseline,
            config,
            output,
        } => trace::run(file, !no_baseline, config, output),
    }
}
