//! Fall-rate distribution over the freefall analysis window.
//!
//! Buckets elapsed time at each 1-mph fall rate, raw and altitude-
//! calibrated. The calibration table normalizes a raw rate to its
//! reference-altitude equivalent, compensating for air-density change.
//!

use std::fs;

use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use tempo_common::fpm_to_mph;

use crate::events::JumpEvents;
use crate::track::TrackSeries;

/// Guard band after exit, seconds — skips the still-accelerating edge.
const WINDOW_AFTER_EXIT_SEC: f64 = 12.0;
/// Guard band before deployment, seconds.
const WINDOW_BEFORE_DEPLOY_SEC: f64 = 2.0;
/// Histogram range, mph.
pub const BIN_MIN_MPH: i64 = 90;
pub const BIN_MAX_MPH: i64 = 200;

/// Current calibration file version
const CALIBRATION_FILE_VER: usize = 1;

/// One calibration row: factor applying at this pressure altitude.
///
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct CalibrationRow {
    /// Altitude in ft
    pub altitude: f64,
    /// Unitless multiplier
    pub factor: f64,
}

/// On-disk structure for the calibration file
///
#[derive(Debug, Deserialize)]
struct CalibrationFile {
    /// Version number for safety
    version: usize,
    /// Rows, strictly decreasing in altitude
    rows: Vec<CalibrationRow>,
}

/// Ordered calibration rows, altitude strictly decreasing, saturating at
/// the extremes.
///
#[derive(Clone, Debug)]
pub struct CalibrationTable {
    rows: Vec<CalibrationRow>,
}

impl CalibrationTable {
    /// Load a calibration table, from a file if specified, from the
    /// built-in ISA table otherwise.
    ///
    #[tracing::instrument]
    pub fn load(fname: Option<String>) -> Result<Self> {
        trace!("enter");

        let data = if let Some(fname) = fname {
            fs::read_to_string(fname)?
        } else {
            include_str!("calibration.hcl").to_owned()
        };

        let file: CalibrationFile = hcl::from_str(&data)?;
        if file.version != CALIBRATION_FILE_VER {
            return Err(eyre!("Bad calibration file version, aborting…"));
        }
        if file.rows.is_empty() {
            return Err(eyre!("Empty calibration table"));
        }
        if !file.rows.windows(2).all(|w| w[0].altitude > w[1].altitude) {
            return Err(eyre!("Calibration rows must strictly decrease in altitude"));
        }
        Ok(CalibrationTable { rows: file.rows })
    }

    /// Factor at an altitude: linear between rows, the extreme row's value
    /// beyond them — saturation, never extrapolation.
    ///
    pub fn factor_at(&self, altitude_ft: f64) -> f64 {
        let rows = &self.rows;
        let last = rows.len() - 1;
        if altitude_ft >= rows[0].altitude {
            return rows[0].factor;
        }
        if altitude_ft <= rows[last].altitude {
            return rows[last].factor;
        }
        for w in rows.windows(2) {
            if altitude_ft >= w[1].altitude {
                let t = (altitude_ft - w[1].altitude) / (w[0].altitude - w[1].altitude);
                return w[1].factor + t * (w[0].factor - w[1].factor);
            }
        }
        rows[last].factor
    }
}

/// Elapsed seconds per 1-mph bin over [`BIN_MIN_MPH`, `BIN_MAX_MPH`].
///
#[derive(Clone, Debug, Serialize)]
pub struct SpeedHistogram {
    /// Index 0 is the [`BIN_MIN_MPH`] bin
    pub seconds: Vec<f64>,
}

impl Default for SpeedHistogram {
    fn default() -> Self {
        SpeedHistogram {
            seconds: vec![0.0; (BIN_MAX_MPH - BIN_MIN_MPH + 1) as usize],
        }
    }
}

impl SpeedHistogram {
    /// Accumulate `dt` seconds at `mph`; out-of-range rates are skipped.
    ///
    fn add(&mut self, mph: i64, dt: f64) {
        if (BIN_MIN_MPH..=BIN_MAX_MPH).contains(&mph) {
            self.seconds[(mph - BIN_MIN_MPH) as usize] += dt;
        } else {
            trace!("{} mph outside histogram range, skipped", mph);
        }
    }

    pub fn total_sec(&self) -> f64 {
        self.seconds.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_sec() == 0.0
    }

    /// Time-weighted mean fall rate, mph.
    ///
    pub fn mean_mph(&self) -> Option<f64> {
        let total = self.total_sec();
        if total == 0.0 {
            return None;
        }
        let weighted: f64 = self
            .seconds
            .iter()
            .enumerate()
            .map(|(i, &s)| (BIN_MIN_MPH + i as i64) as f64 * s)
            .sum();
        Some(weighted / total)
    }

    /// Lowest occupied bin, mph.
    ///
    pub fn min_mph(&self) -> Option<i64> {
        self.seconds
            .iter()
            .position(|&s| s > 0.0)
            .map(|i| BIN_MIN_MPH + i as i64)
    }

    /// Highest occupied bin, mph.
    ///
    pub fn max_mph(&self) -> Option<i64> {
        self.seconds
            .iter()
            .rposition(|&s| s > 0.0)
            .map(|i| BIN_MIN_MPH + i as i64)
    }
}

/// The raw and calibrated distributions plus the resolved window bounds.
///
#[derive(Clone, Debug, Serialize)]
pub struct SpeedDistribution {
    pub raw: SpeedHistogram,
    pub calibrated: SpeedHistogram,
    pub window_start_sec: f64,
    pub window_end_sec: f64,
}

/// Bucket elapsed time per fall rate inside [exit+12 s, deployment−2 s].
///
/// `None` when either bound is undetected. The first entry in the window
/// contributes zero elapsed time; entries without a known rate of descent
/// are not processed and do not advance the Δt chain.
///
#[tracing::instrument(skip(track, events, table))]
pub fn bin_speeds(
    track: &TrackSeries,
    events: &JumpEvents,
    table: &CalibrationTable,
) -> Option<SpeedDistribution> {
    let exit = events.exit_offset_sec?;
    let deploy = events.deployment_offset_sec?;
    let window_start = exit + WINDOW_AFTER_EXIT_SEC;
    let window_end = deploy - WINDOW_BEFORE_DEPLOY_SEC;

    let mut raw = SpeedHistogram::default();
    let mut calibrated = SpeedHistogram::default();
    let mut prev_offset: Option<f64> = None;

    for (i, e) in track.entries.iter().enumerate() {
        if e.time_offset < window_start || e.time_offset > window_end {
            continue;
        }
        let Some(rod) = e.rate_of_descent_fpm else {
            continue;
        };

        let raw_mph = fpm_to_mph(rod).round() as i64;
        let altitude = track.altitude_ft.get(i).copied().filter(|a| a.is_finite());
        let factor = altitude.map(|a| table.factor_at(a)).unwrap_or(1.0);
        let cal_mph = (raw_mph as f64 * factor).round() as i64;

        let dt = prev_offset.map(|p| e.time_offset - p).unwrap_or(0.0);
        raw.add(raw_mph, dt);
        calibrated.add(cal_mph, dt);
        prev_offset = Some(e.time_offset);
    }

    debug!(
        "window [{:.1}, {:.1}]: {:.1}s raw, {:.1}s calibrated",
        window_start,
        window_end,
        raw.total_sec(),
        calibrated.total_sec()
    );

    Some(SpeedDistribution {
        raw,
        calibrated,
        window_start_sec: window_start,
        window_end_sec: window_end,
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use tempo_sentences::FixEntry;

    use super::*;

    fn entry(seq: usize, offset: f64, rod_fpm: Option<f64>) -> FixEntry {
        FixEntry {
            seq,
            time_offset: offset,
            timestamp: None,
            position: None,
            track_deg: None,
            speed_kn: None,
            baro_alt_ft: f64::NAN,
            pressure_hpa: None,
            rate_of_descent_fpm: rod_fpm,
            accel_mean: None,
            accel_peak: None,
            rotation_mean: None,
            rotation_peak: None,
        }
    }

    fn track_from(entries: Vec<FixEntry>, altitude_ft: Vec<f64>) -> TrackSeries {
        let offsets: Vec<f64> = entries.iter().map(|e| e.time_offset).collect();
        let vspeed: Vec<f64> = entries
            .iter()
            .map(|e| e.rate_of_descent_fpm.map(|r| -r).unwrap_or(0.0))
            .collect();
        let n = entries.len();
        let duration = if n > 1 { offsets[n - 1] - offsets[0] } else { 0.0 };
        TrackSeries {
            positions: vec![None; n],
            duration_sec: duration,
            sample_rate_hz: if duration > 0.0 { n as f64 / duration } else { 0.0 },
            surface_elevation_ft: None,
            date: None,
            firmware: None,
            entries,
            offsets,
            altitude_ft,
            vspeed_fpm: vspeed,
        }
    }

    fn events(exit: f64, deploy: f64) -> JumpEvents {
        JumpEvents {
            exit_offset_sec: Some(exit),
            deployment_offset_sec: Some(deploy),
            ..JumpEvents::default()
        }
    }

    #[rstest]
    #[case(10000.0, 1.164)]
    #[case(20000.0, 1.370)]
    #[case(0.0, 1.000)]
    fn test_factor_exact_at_rows(#[case] alt: f64, #[case] factor: f64) {
        let table = CalibrationTable::load(None).unwrap();
        assert_eq!(factor, table.factor_at(alt));
    }

    #[test]
    fn test_factor_saturates() {
        let table = CalibrationTable::load(None).unwrap();
        assert_eq!(1.370, table.factor_at(35000.0));
        assert_eq!(1.000, table.factor_at(-250.0));
    }

    #[test]
    fn test_factor_interpolates_between_rows() {
        let table = CalibrationTable::load(None).unwrap();
        let f = table.factor_at(11000.0);
        assert!((f - (1.164 + 1.201) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_ten_second_run_at_120mph() {
        // 120 mph = 10560 ft/min; entries every second, window [12, 22]
        let entries: Vec<FixEntry> = (0..=30)
            .map(|i| entry(i, i as f64, Some(10560.0)))
            .collect();
        let n = entries.len();
        let track = track_from(entries, vec![0.0; n]);
        let dist = bin_speeds(&track, &events(0.0, 24.0), &CalibrationTable::load(None).unwrap())
            .unwrap();

        let bin_120 = dist.raw.seconds[(120 - BIN_MIN_MPH) as usize];
        assert!((bin_120 - 10.0).abs() < 1e-9);
        assert!((dist.raw.total_sec() - 10.0).abs() < 1e-9);
        // At surface altitude the factor is 1: both histograms agree
        assert_eq!(Some(120), dist.raw.min_mph());
        assert_eq!(Some(120), dist.raw.max_mph());
        assert_eq!(Some(120.0), dist.raw.mean_mph());
        assert!((dist.calibrated.total_sec() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_window_entry_contributes_nothing() {
        let entries: Vec<FixEntry> = (0..=30)
            .map(|i| entry(i, i as f64, Some(10560.0)))
            .collect();
        let n = entries.len();
        let track = track_from(entries, vec![0.0; n]);
        // Window [12, 14]: entries at 12, 13, 14 -> 2 s, not 3
        let dist = bin_speeds(&track, &events(0.0, 16.0), &CalibrationTable::load(None).unwrap())
            .unwrap();
        assert!((dist.raw.total_sec() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_rates_skipped_not_fatal() {
        // 60 mph is below the histogram floor; pass still completes
        let entries: Vec<FixEntry> = (0..=30)
            .map(|i| entry(i, i as f64, Some(5280.0)))
            .collect();
        let n = entries.len();
        let track = track_from(entries, vec![0.0; n]);
        let dist = bin_speeds(&track, &events(0.0, 24.0), &CalibrationTable::load(None).unwrap())
            .unwrap();
        assert!(dist.raw.is_empty());
        assert!(dist.raw.mean_mph().is_none());
    }

    #[test]
    fn test_calibration_raises_rate_at_altitude() {
        let entries: Vec<FixEntry> = (0..=30)
            .map(|i| entry(i, i as f64, Some(10560.0)))
            .collect();
        let n = entries.len();
        // Whole run at 10000 ft: factor 1.164 -> 140 mph calibrated
        let track = track_from(entries, vec![10000.0; n]);
        let dist = bin_speeds(&track, &events(0.0, 24.0), &CalibrationTable::load(None).unwrap())
            .unwrap();
        assert_eq!(Some(120), dist.raw.min_mph());
        assert_eq!(Some(140), dist.calibrated.min_mph());
        assert_eq!(Some(140), dist.calibrated.max_mph());
    }

    #[test]
    fn test_no_window_without_events() {
        let track = track_from(vec![], vec![]);
        let table = CalibrationTable::load(None).unwrap();
        assert!(bin_speeds(&track, &JumpEvents::default(), &table).is_none());
    }
}
