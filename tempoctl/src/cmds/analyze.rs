//! Full analysis pass: parse, fuse, detect, summarize.
//!

use std::fs;

use eyre::Result;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::trace;

use tempo_analysis::{analyze_buffer, analyze_jump, JumpEvents, TrackSeries};

use crate::cli::AnalyzeOpts;

#[tracing::instrument]
pub fn analyze_log(opts: &AnalyzeOpts) -> Result<()> {
    trace!("enter");

    let data = fs::read(&opts.file)?;
    let result = analyze_buffer(&data);
    let Some(track) = result.track else {
        eprintln!("{}: {}", opts.file.display(), result.message);
        return Ok(());
    };
    let events = analyze_jump(&track);

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }
    println!("{}", summary_table(&track, &events));
    Ok(())
}

fn offset_cell(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.1} s", v),
        None => "not detected".to_string(),
    }
}

fn summary_table(track: &TrackSeries, events: &JumpEvents) -> String {
    let mut builder = Builder::default();
    builder.push_record(vec!["What", "Value"]);

    builder.push_record(vec!["Entries".to_string(), format!("{}", track.entries.len())]);
    builder.push_record(vec![
        "Duration".to_string(),
        format!("{:.1} s", track.duration_sec),
    ]);
    builder.push_record(vec![
        "Sample rate".to_string(),
        format!("{:.2} Hz", track.sample_rate_hz),
    ]);
    if let Some(fw) = &track.firmware {
        builder.push_record(vec!["Firmware".to_string(), fw.clone()]);
    }
    if let Some(sfc) = track.surface_elevation_ft {
        builder.push_record(vec!["Surface".to_string(), format!("{:.0} ft", sfc)]);
    }

    let exit = match (events.exit_offset_sec, events.exit_altitude_ft) {
        (Some(t), Some(a)) => format!("{:.1} s at {:.0} ft", t, a),
        _ => "not detected".to_string(),
    };
    builder.push_record(vec!["Exit".to_string(), exit]);
    let deploy = match (events.deployment_offset_sec, events.deploy_altitude_ft) {
        (Some(t), Some(a)) => format!("{:.1} s at {:.0} ft", t, a),
        _ => "not detected".to_string(),
    };
    builder.push_record(vec!["Deployment".to_string(), deploy]);
    builder.push_record(vec![
        "Activation".to_string(),
        offset_cell(events.activation_offset_sec),
    ]);
    builder.push_record(vec![
        "Landing".to_string(),
        offset_cell(events.landing_offset_sec),
    ]);
    let max = match events.max_descent_rate_fpm {
        Some(v) => format!("{:.0} ft/min", v),
        None => "not detected".to_string(),
    };
    builder.push_record(vec!["Peak descent rate".to_string(), max]);

    builder.build().with(Style::modern()).to_string()
}
