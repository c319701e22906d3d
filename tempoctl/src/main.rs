use std::io;

use clap::{crate_authors, crate_description, crate_version, CommandFactory, Parser};
use clap_complete::generate;
use eyre::Result;
use tracing::trace;

use tempo_common::init_logging;
use tempoctl::{analyze_log, export_csv, show_speeds, validate_file, Opts, SubCommand};

/// Binary name
pub const NAME: &str = env!("CARGO_BIN_NAME");
/// Binary version
pub const VERSION: &str = crate_version!();
/// Authors
pub const AUTHORS: &str = crate_authors!();

fn main() -> Result<()> {
    let opts = Opts::parse();

    // Initialise logging.
    //
    init_logging(NAME, opts.debug, None)?;

    // Banner
    //
    banner();

    if opts.version {
        println!("{}", full_version());
        return Ok(());
    }

    match &opts.subcmd {
        Some(subcmd) => handle_subcmd(subcmd),
        None => {
            Opts::command().print_help()?;
            Ok(())
        }
    }
}

pub fn handle_subcmd(subcmd: &SubCommand) -> Result<()> {
    match subcmd {
        // Handle `analyze FILE`
        //
        SubCommand::Analyze(aopts) => {
            trace!("analyze");

            analyze_log(aopts)
        }

        // Handle `completion SHELL`
        //
        SubCommand::Completion(copts) => {
            trace!("completion");

            let generator = copts.shell;
            generate(generator, &mut Opts::command(), NAME, &mut io::stdout());
            Ok(())
        }

        // Handle `export FILE`
        //
        SubCommand::Export(eopts) => {
            trace!("export");

            export_csv(eopts)
        }

        // Handle `speeds FILE`
        //
        SubCommand::Speeds(sopts) => {
            trace!("speeds");

            show_speeds(sopts)
        }

        // Handle `validate FILE`
        //
        SubCommand::Validate(vopts) => {
            trace!("validate");

            validate_file(vopts)
        }
    }
}

/// Short banner on stderr so piped output stays clean.
///
fn banner() {
    eprintln!("{}/{} by {}\n{}", NAME, VERSION, AUTHORS, crate_description!());
}

/// Versions of every crate in the workspace.
///
fn full_version() -> String {
    format!(
        "{}/{}\n{}\n{}\n{}",
        NAME,
        VERSION,
        tempo_common::version(),
        tempo_sentences::version(),
        tempo_analysis::version()
    )
}
