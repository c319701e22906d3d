//! CSV export of the fused time series.
//!

use std::fs;

use csv::WriterBuilder;
use eyre::{eyre, Result};
use serde::Serialize;
use tracing::trace;

use tempo_analysis::analyze_buffer;

use crate::cli::ExportOpts;

/// One flattened CSV record per fix entry.
///
#[derive(Debug, Serialize)]
struct TrackRecord {
    offset_sec: f64,
    timestamp: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    gnss_alt_m: Option<f64>,
    baro_alt_ft: Option<f64>,
    vspeed_fpm: Option<f64>,
    track_deg: Option<f64>,
    speed_kn: Option<f64>,
}

#[tracing::instrument]
pub fn export_csv(opts: &ExportOpts) -> Result<()> {
    trace!("enter");

    let data = fs::read(&opts.file)?;
    let result = analyze_buffer(&data);
    let Some(track) = result.track else {
        return Err(eyre!("{}: {}", opts.file.display(), result.message));
    };

    // Prepare the writer
    //
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(vec![]);

    for e in &track.entries {
        wtr.serialize(TrackRecord {
            offset_sec: e.time_offset,
            timestamp: e.timestamp.map(|t| t.to_rfc3339()).unwrap_or_default(),
            latitude: e.position.map(|p| p.latitude),
            longitude: e.position.map(|p| p.longitude),
            gnss_alt_m: e.position.map(|p| p.altitude),
            baro_alt_ft: e.baro_alt_ft.is_finite().then_some(e.baro_alt_ft),
            vspeed_fpm: e.rate_of_descent_fpm.map(|r| -r),
            track_deg: e.track_deg,
            speed_kn: e.speed_kn,
        })?;
    }
    wtr.flush()?;

    let out = String::from_utf8(wtr.into_inner()?)?;
    match &opts.output {
        Some(p) => fs::write(p, out)?,
        None => print!("{}", out),
    }
    Ok(())
}
