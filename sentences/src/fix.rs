//! The emitted fix entries and the barometric sample series.
//!

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use tempo_common::{GeodeticPosition, Vector3};

use crate::sentence::QuatSample;

/// One finalized entry, emitted per primary position sentence.
///
/// Entries only exist once both time and position are known; a fix sentence
/// arriving earlier is dropped, never emitted with placeholder values. The
/// `baro_alt_ft` field is the only one touched after finalization, by the
/// single close-time back-fill; NaN there means "outside the interpolation
/// domain".
///
#[derive(Clone, Debug, Serialize)]
pub struct FixEntry {
    /// Monotonic sequence number
    pub seq: usize,
    /// Seconds from log start, non-decreasing across the emitted sequence
    pub time_offset: f64,
    /// Corrected absolute timestamp (tracked date + sentence time-of-day)
    pub timestamp: Option<DateTime<Utc>>,
    pub position: Option<GeodeticPosition>,
    /// True ground track in degrees
    pub track_deg: Option<f64>,
    /// Ground speed in knots
    pub speed_kn: Option<f64>,
    /// Barometric altitude above surface, ft. NaN until back-filled or when
    /// the entry falls outside the barometric sample domain.
    pub baro_alt_ft: f64,
    /// Most recent static pressure, hPa
    pub pressure_hpa: Option<f64>,
    /// Derived from consecutive GNSS altitudes, ft/min, positive descending
    pub rate_of_descent_fpm: Option<f64>,
    /// Mean acceleration since the previous entry, m/s²
    pub accel_mean: Option<Vector3>,
    /// Peak-magnitude acceleration sample since the previous entry
    pub accel_peak: Option<Vector3>,
    /// Mean rotation since the previous entry, rad/s
    pub rotation_mean: Option<Vector3>,
    /// Peak-magnitude rotation sample since the previous entry
    pub rotation_peak: Option<Vector3>,
}

/// The barometric sample series: two parallel monotonically-increasing
/// sequences, grown incrementally as environment sentences arrive.
///
#[derive(Clone, Debug, Default, Serialize)]
pub struct BaroSeries {
    /// Offset seconds from log start
    pub offsets: Vec<f64>,
    /// Filtered altitude above surface, ft
    pub altitudes: Vec<f64>,
}

impl BaroSeries {
    /// Append one sample; out-of-order samples are dropped so the series
    /// stays a valid interpolation domain.
    ///
    pub fn push(&mut self, offset_sec: f64, altitude_ft: f64) {
        if let Some(&last) = self.offsets.last() {
            if offset_sec < last {
                return;
            }
        }
        self.offsets.push(offset_sec);
        self.altitudes.push(altitude_ft);
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Everything a closed reader hands back: the fix entries, the barometric
/// series they were back-filled from, and the log-level metadata.
///
#[derive(Clone, Debug, Default, Serialize)]
pub struct LogData {
    pub entries: Vec<FixEntry>,
    pub baro: BaroSeries,
    /// Calendar date established by the first valid RMC
    pub date: Option<NaiveDate>,
    /// Absolute start timestamp
    pub start: Option<DateTime<Utc>>,
    /// Surface elevation at the recording site, ft
    pub surface_elevation_ft: Option<f64>,
    /// Firmware version string
    pub firmware: Option<String>,
    /// Last reported battery voltage
    pub battery_v: Option<f64>,
    /// Most recent orientation sample
    pub orientation: Option<QuatSample>,
}
