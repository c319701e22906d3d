//! Log-to-series adapter and the cheap validate-only scan.
//!

use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, trace};

use tempo_common::{to_feet, GeodeticPosition};
use tempo_sentences::{FixEntry, LogData, LogReader};

/// Smallest buffer worth parsing, bytes.
pub const MIN_LOG_SIZE: usize = 100;
/// Largest accepted buffer, 16 MiB.
pub const MAX_LOG_SIZE: usize = 16 * 1024 * 1024;
/// Prefix scanned by [`validate_log`], 64 KiB.
const VALIDATE_PREFIX: usize = 64 * 1024;

/// The fused time series built from one log.
///
/// All vectors are aligned with `entries`; the altitude series is above
/// surface (barometric preferred, GNSS minus the surface reference as
/// fallback) and vertical speed is positive when climbing.
///
#[derive(Clone, Debug, Serialize)]
pub struct TrackSeries {
    pub entries: Vec<FixEntry>,
    /// Seconds from log start
    pub offsets: Vec<f64>,
    /// Fused altitude above surface, ft
    pub altitude_ft: Vec<f64>,
    /// Vertical speed, ft/min, positive = climbing
    pub vspeed_fpm: Vec<f64>,
    pub positions: Vec<Option<GeodeticPosition>>,
    pub duration_sec: f64,
    /// Approximate, count over duration
    pub sample_rate_hz: f64,
    pub surface_elevation_ft: Option<f64>,
    pub date: Option<NaiveDate>,
    pub firmware: Option<String>,
}

/// What a full-buffer pass always returns: either a series, or an explicit
/// "no valid data" with a reason. Never an error.
///
#[derive(Clone, Debug, Serialize)]
pub struct TrackResult {
    pub valid: bool,
    pub message: String,
    pub track: Option<TrackSeries>,
}

/// Outcome of the validate-only prefix scan.
///
#[derive(Clone, Debug, Serialize)]
pub struct LogValidation {
    pub valid: bool,
    pub message: String,
    pub start_date: Option<NaiveDate>,
    pub start_location: Option<GeodeticPosition>,
}

/// Fused altitude for one entry: barometric above-surface when the
/// back-fill resolved it, GNSS minus the surface reference otherwise.
///
pub fn fused_altitude_ft(e: &FixEntry, surface_ft: f64) -> f64 {
    if e.baro_alt_ft.is_finite() {
        e.baro_alt_ft
    } else if let Some(p) = e.position {
        to_feet(p.altitude) - surface_ft
    } else {
        f64::NAN
    }
}

impl TrackSeries {
    fn from_log(data: LogData) -> Option<Self> {
        if data.entries.is_empty() {
            return None;
        }
        let surface = data.surface_elevation_ft.unwrap_or(0.0);
        let offsets: Vec<f64> = data.entries.iter().map(|e| e.time_offset).collect();
        let altitude_ft = data
            .entries
            .iter()
            .map(|e| fused_altitude_ft(e, surface))
            .collect();
        let vspeed_fpm = data
            .entries
            .iter()
            .map(|e| e.rate_of_descent_fpm.map(|r| -r).unwrap_or(0.0))
            .collect();
        let positions = data.entries.iter().map(|e| e.position).collect();

        let duration_sec = offsets.last().unwrap() - offsets[0];
        let sample_rate_hz = if duration_sec > 0.0 {
            data.entries.len() as f64 / duration_sec
        } else {
            0.0
        };

        Some(TrackSeries {
            entries: data.entries,
            offsets,
            altitude_ft,
            vspeed_fpm,
            positions,
            duration_sec,
            sample_rate_hz,
            surface_elevation_ft: data.surface_elevation_ft,
            date: data.date,
            firmware: data.firmware,
        })
    }
}

/// Drive a private reader across the whole buffer and build the series.
///
/// The contract is "always return a result, never propagate a parse
/// failure": zero entries is a valid non-error outcome, and anything that
/// manages to panic inside the pass is caught here, exactly once.
///
#[tracing::instrument(skip(buf))]
pub fn analyze_buffer(buf: &[u8]) -> TrackResult {
    let parsed = catch_unwind(AssertUnwindSafe(|| {
        let text = String::from_utf8_lossy(buf);
        let mut reader = LogReader::new();
        for line in text.lines() {
            reader.feed_line(line);
        }
        reader.close()
    }));

    match parsed {
        Ok(data) => match TrackSeries::from_log(data) {
            Some(track) => {
                debug!(
                    "{} entries over {:.1}s at {:.2}Hz",
                    track.entries.len(),
                    track.duration_sec,
                    track.sample_rate_hz
                );
                TrackResult {
                    valid: true,
                    message: format!("{} entries", track.entries.len()),
                    track: Some(track),
                }
            }
            None => TrackResult {
                valid: false,
                message: "no valid data in log".to_string(),
                track: None,
            },
        },
        Err(e) => {
            let reason = e
                .downcast_ref::<String>()
                .map(String::as_str)
                .or_else(|| e.downcast_ref::<&str>().copied())
                .unwrap_or("unknown parse failure");
            TrackResult {
                valid: false,
                message: format!("no valid data: {}", reason),
                track: None,
            }
        }
    }
}

/// Cheap validation over a size-bounded prefix, run before any full parse.
///
/// Stops as soon as both a calendar date and a starting position are
/// known; otherwise reports the most specific failure available.
///
#[tracing::instrument(skip(buf))]
pub fn validate_log(buf: &[u8]) -> LogValidation {
    if buf.is_empty() {
        return invalid("empty buffer");
    }
    if buf.len() < MIN_LOG_SIZE {
        return invalid(&format!("buffer too small ({} bytes)", buf.len()));
    }
    if buf.len() > MAX_LOG_SIZE {
        return invalid(&format!("buffer too large ({} bytes)", buf.len()));
    }

    let prefix = &buf[..buf.len().min(VALIDATE_PREFIX)];
    let text = String::from_utf8_lossy(prefix);
    let mut reader = LogReader::new();
    for line in text.lines() {
        reader.feed_line(line);
        if reader.date().is_some() && reader.start_position().is_some() {
            break;
        }
    }

    let date = reader.date();
    let location = reader.start_position();
    trace!(
        "prefix scan: {} recognized, {} gnss",
        reader.recognized(),
        reader.gnss_seen()
    );

    match (date, location) {
        (Some(d), Some(p)) => LogValidation {
            valid: true,
            message: "valid log".to_string(),
            start_date: Some(d),
            start_location: Some(p),
        },
        (Some(d), None) => LogValidation {
            valid: true,
            message: "date found but no position yet".to_string(),
            start_date: Some(d),
            start_location: None,
        },
        (None, _) => {
            let message = if reader.recognized() == 0 {
                "no recognizable sentences"
            } else if reader.gnss_seen() == 0 && reader.firmware().is_some() {
                "version recognized but no GPS data"
            } else {
                "no date found"
            };
            invalid(message)
        }
    }
}

fn invalid(message: &str) -> LogValidation {
    LogValidation {
        valid: false,
        message: message.to_string(),
        start_date: None,
        start_location: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_sentences::nmea_checksum;

    fn line(body: &str) -> String {
        format!("${}*{:02X}\n", body, nmea_checksum(body))
    }

    fn minimal_log() -> String {
        let mut s = String::new();
        s.push_str(&line("PTMPVER,2.4.1,a7c9e2,3"));
        s.push_str(&line("PTMPSFC,1000"));
        s.push_str(&line(
            "GPRMC,120000.00,A,4807.038,N,01131.000,E,0.0,0.0,150624,,",
        ));
        for i in 1..=5 {
            s.push_str(&line(&format!(
                "GPGGA,1200{:02}.00,4807.038,N,01131.000,E,1,8,1.0,500.0,M,47.0,M,,",
                i
            )));
        }
        s
    }

    #[test]
    fn test_analyze_empty_is_structured_not_an_error() {
        let r = analyze_buffer(b"");
        assert!(!r.valid);
        assert!(r.track.is_none());
        assert!(!r.message.is_empty());
    }

    #[test]
    fn test_analyze_garbage_is_structured() {
        let r = analyze_buffer(b"complete\ngarbage\nlines\n");
        assert!(!r.valid);
        assert_eq!("no valid data in log", r.message);
    }

    #[test]
    fn test_analyze_minimal_log() {
        let log = minimal_log();
        let r = analyze_buffer(log.as_bytes());
        assert!(r.valid);
        let t = r.track.unwrap();
        assert_eq!(5, t.entries.len());
        assert_eq!(4.0, t.duration_sec);
        assert!((t.sample_rate_hz - 1.25).abs() < 1e-9);
        // No barometric data: GNSS minus surface
        assert!((t.altitude_ft[0] - (500.0 * 3.28084 - 1000.0)).abs() < 1e-6);
    }

    #[test]
    fn test_offsets_non_decreasing() {
        let log = minimal_log();
        let t = analyze_buffer(log.as_bytes()).track.unwrap();
        assert!(t.offsets.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_validate_rejects_sizes() {
        assert!(!validate_log(b"").valid);
        assert!(!validate_log(b"tiny").valid);
        let huge = vec![b'x'; MAX_LOG_SIZE + 1];
        assert!(!validate_log(&huge).valid);
    }

    #[test]
    fn test_validate_valid_log() {
        let log = minimal_log();
        let v = validate_log(log.as_bytes());
        assert!(v.valid);
        assert!(v.start_date.is_some());
        assert!(v.start_location.is_some());
    }

    #[test]
    fn test_validate_agrees_with_full_parse_on_any_sufficient_prefix() {
        let log = minimal_log();
        assert!(analyze_buffer(log.as_bytes()).valid);
        // Find where date + location first become known: after the first GGA.
        // Any prefix from there on must validate.
        let upto_first_gga = log
            .lines()
            .take(4)
            .map(|l| format!("{}\n", l))
            .collect::<String>();
        let mut prefix = upto_first_gga;
        while prefix.len() < MIN_LOG_SIZE {
            // Padding below the structural minimum is the caller's problem;
            // grow with harmless blank lines instead.
            prefix.push('\n');
        }
        for end in [prefix.len(), log.len()] {
            let v = validate_log(&log.as_bytes()[..end.min(log.len())]);
            assert!(v.valid, "prefix of {} bytes should validate", end);
        }
    }

    #[test]
    fn test_validate_version_but_no_gps() {
        let mut log = line("PTMPVER,2.4.1,a7c9e2,3");
        for _ in 0..20 {
            log.push_str("$PTMPENV,1000,1013.2,350.0,3.91\n");
        }
        let v = validate_log(log.as_bytes());
        assert!(!v.valid);
        assert_eq!("version recognized but no GPS data", v.message);
    }

    #[test]
    fn test_validate_no_date() {
        // GNSS sentences present but the receiver never got a date fix
        let mut log = String::new();
        log.push_str(&line("PTMPVER,2.4.1,a7c9e2,3"));
        for _ in 0..10 {
            log.push_str(&line("GPRMC,120000.00,V,,,,,,,,,"));
        }
        let v = validate_log(log.as_bytes());
        assert!(!v.valid);
        assert_eq!("no date found", v.message);
    }

    #[test]
    fn test_validate_no_sentences() {
        let log = "x".repeat(200);
        let v = validate_log(log.as_bytes());
        assert!(!v.valid);
        assert_eq!("no recognizable sentences", v.message);
    }
}
