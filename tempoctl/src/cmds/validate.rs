//! Validate-only scan over a log file.
//!

use std::fs;

use eyre::{eyre, Result};
use tracing::trace;

use tempo_analysis::validate_log;

use crate::cli::ValidateOpts;

#[tracing::instrument]
pub fn validate_file(opts: &ValidateOpts) -> Result<()> {
    trace!("enter");

    let data = fs::read(&opts.file)?;
    let v = validate_log(&data);

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&v)?);
    } else {
        println!("{}: {}", opts.file.display(), v.message);
        if let Some(d) = v.start_date {
            println!("Start date: {}", d);
        }
        if let Some(p) = v.start_location {
            println!(
                "Start location: {:.5}, {:.5} ({:.0} m MSL)",
                p.latitude, p.longitude, p.altitude
            );
        }
    }

    if v.valid {
        Ok(())
    } else {
        Err(eyre!("invalid log: {}", v.message))
    }
}
