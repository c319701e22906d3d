//! Fall-rate distribution over the freefall window.
//!

use std::fs;

use eyre::{eyre, Result};
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::trace;

use tempo_analysis::{
    analyze_buffer, analyze_jump, bin_speeds, CalibrationTable, SpeedDistribution, BIN_MIN_MPH,
};

use crate::cli::SpeedsOpts;

#[tracing::instrument]
pub fn show_speeds(opts: &SpeedsOpts) -> Result<()> {
    trace!("enter");

    let data = fs::read(&opts.file)?;
    let result = analyze_buffer(&data);
    let Some(track) = result.track else {
        return Err(eyre!("{}: {}", opts.file.display(), result.message));
    };
    let events = analyze_jump(&track);

    let fname = opts
        .calibration
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned());
    let table = CalibrationTable::load(fname)?;

    let Some(dist) = bin_speeds(&track, &events, &table) else {
        return Err(eyre!("no freefall window detected"));
    };

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&dist)?);
        return Ok(());
    }
    println!("{}", distribution_table(&dist));
    Ok(())
}

fn stats_line(label: &str, h: &tempo_analysis::SpeedHistogram) -> String {
    match (h.mean_mph(), h.min_mph(), h.max_mph()) {
        (Some(mean), Some(min), Some(max)) => format!(
            "{}: mean {:.1} mph, range {}..{} mph over {:.1} s",
            label,
            mean,
            min,
            max,
            h.total_sec()
        ),
        _ => format!("{}: no samples in range", label),
    }
}

fn distribution_table(dist: &SpeedDistribution) -> String {
    let mut builder = Builder::default();
    builder.push_record(vec!["mph", "raw s", "calibrated s"]);

    for (i, (&r, &c)) in dist
        .raw
        .seconds
        .iter()
        .zip(dist.calibrated.seconds.iter())
        .enumerate()
    {
        if r > 0.0 || c > 0.0 {
            builder.push_record(vec![
                format!("{}", BIN_MIN_MPH + i as i64),
                format!("{:.1}", r),
                format!("{:.1}", c),
            ]);
        }
    }

    let table = builder.build().with(Style::modern()).to_string();
    format!(
        "Analysis window [{:.1} s, {:.1} s]\n{}\n{}\n{}",
        dist.window_start_sec,
        dist.window_end_sec,
        table,
        stats_line("Raw", &dist.raw),
        stats_line("Calibrated", &dist.calibrated),
    )
}
