//! Module describing all possible commands and sub-commands to the
//! `tempoctl` main driver.
//!
//! We have four main commands:
//!
//! - `validate`
//! - `analyze`
//! - `speeds`
//! - `export`
//!
//! `validate` runs the cheap prefix scan and reports whether the file looks
//! like a usable log at all, without a full parse.
//!
//! `analyze` parses the whole log, fuses the series and reports the jump
//! events (exit, deployment, activation, landing, peak descent rate).
//!
//! `speeds` produces the fall-rate distribution over the freefall window,
//! raw and density-calibrated; a custom calibration table can be supplied
//! as an HCL file.
//!
//! `export` dumps the fused time series as CSV for further processing.
//!
//! `completion` is here just to configure the various shells completion
//! system.
//!

use std::path::PathBuf;

use clap::{crate_authors, crate_description, crate_name, crate_version, Parser};
use clap_complete::shells::Shell;

/// CLI options
#[derive(Parser)]
#[command(disable_version_flag = true)]
#[clap(name = crate_name!(), about = crate_description!())]
#[clap(version = crate_version!(), author = crate_authors!())]
pub struct Opts {
    /// debug mode (hierarchical traces).
    #[clap(short = 'D', long = "debug")]
    pub debug: bool,
    /// Verbose mode.
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Display utility full version.
    #[clap(short = 'V', long)]
    pub version: bool,
    /// Sub-commands (see below).
    #[clap(subcommand)]
    pub subcmd: Option<SubCommand>,
}

// ------

/// All sub-commands:
///
/// `completion SHELL`
/// `analyze [--json] FILE`
/// `export [-o FILE] FILE`
/// `speeds [-c CALIB] [--json] FILE`
/// `validate [--json] FILE`
///
#[derive(Debug, Parser)]
pub enum SubCommand {
    /// Parse a log and report the detected jump events
    Analyze(AnalyzeOpts),
    /// Generate Completion stuff
    Completion(ComplOpts),
    /// Export the fused time series as CSV
    Export(ExportOpts),
    /// Fall-rate distribution over the freefall window
    Speeds(SpeedsOpts),
    /// Cheap validity check on a log file
    Validate(ValidateOpts),
}

// ------

/// Options for the full analysis pass.
///
#[derive(Debug, Parser)]
pub struct AnalyzeOpts {
    /// JSON output instead of a table.
    #[clap(long)]
    pub json: bool,
    /// Log file.
    pub file: PathBuf,
}

// ------

#[derive(Debug, Parser)]
pub struct ComplOpts {
    /// Shell target.
    #[clap(value_parser)]
    pub shell: Shell,
}

// ------

/// Options for the CSV export.
///
#[derive(Debug, Parser)]
pub struct ExportOpts {
    /// Output file (stdout by default).
    #[clap(short = 'o', long)]
    pub output: Option<PathBuf>,
    /// Log file.
    pub file: PathBuf,
}

// ------

/// Options for the fall-rate distribution.
///
#[derive(Debug, Parser)]
pub struct SpeedsOpts {
    /// Calibration table (HCL); built-in ISA table by default.
    #[clap(short = 'c', long)]
    pub calibration: Option<PathBuf>,
    /// JSON output instead of a table.
    #[clap(long)]
    pub json: bool,
    /// Log file.
    pub file: PathBuf,
}

// ------

/// Options for the validate-only scan.
///
#[derive(Debug, Parser)]
pub struct ValidateOpts {
    /// JSON output.
    #[clap(long)]
    pub json: bool,
    /// Log file.
    pub file: PathBuf,
}
