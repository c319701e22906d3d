//! The stateful sentence reader.
//!
//! One reader per log. Lines go in one at a time in arrival order; the
//! reader classifies, accumulates, and emits a finalized [`FixEntry`] per
//! primary position sentence. Closing performs the one-time barometric
//! back-fill and hands everything back as a [`LogData`].
//!
//! The reader never fails outward: malformed lines are absorbed and logged,
//! parsing continues. All accumulators live in named fields here and are
//! reset entirely within the transition that owns them.
//!

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, trace};

use tempo_common::{interp1, to_feet, GeodeticPosition, Vector3};

use crate::fix::{BaroSeries, FixEntry, LogData};
use crate::sentence::{EnvSample, GgaData, ImuSample, QuatSample, RmcData, Sentence};

/// Reader states. Forward-only; `End` is terminal and entered only by an
/// explicit [`LogReader::close`].
///
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReaderState {
    #[default]
    Start,
    SeekingRmc,
    Normal,
    End,
}

/// Length of the moving-average filter applied to environment altitudes.
const ALT_FILTER_LEN: usize = 5;

/// Fixed-length moving average over the raw barometric altitude.
///
#[derive(Clone, Debug, Default)]
struct AltFilter {
    window: Vec<f64>,
    next: usize,
}

impl AltFilter {
    fn push(&mut self, v: f64) -> f64 {
        if self.window.len() < ALT_FILTER_LEN {
            self.window.push(v);
        } else {
            self.window[self.next] = v;
            self.next = (self.next + 1) % ALT_FILTER_LEN;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }
}

/// Running inertial sums plus the peak-magnitude samples since the last fix.
///
#[derive(Clone, Debug, Default)]
struct InertialAccum {
    ax: f64,
    ay: f64,
    az: f64,
    gx: f64,
    gy: f64,
    gz: f64,
    count: u32,
    accel_peak: Option<Vector3>,
    rotation_peak: Option<Vector3>,
}

impl InertialAccum {
    fn absorb(&mut self, s: &ImuSample) {
        self.ax += s.accel.x;
        self.ay += s.accel.y;
        self.az += s.accel.z;
        self.gx += s.rotation.x;
        self.gy += s.rotation.y;
        self.gz += s.rotation.z;
        self.count += 1;

        match self.accel_peak {
            Some(p) if p.magnitude() >= s.accel.magnitude() => (),
            _ => self.accel_peak = Some(s.accel),
        }
        match self.rotation_peak {
            Some(p) if p.magnitude() >= s.rotation.magnitude() => (),
            _ => self.rotation_peak = Some(s.rotation),
        }
    }

    /// Mean and peak samples over the interval, resetting the accumulator.
    ///
    #[allow(clippy::type_complexity)]
    fn take(
        &mut self,
    ) -> (
        Option<Vector3>,
        Option<Vector3>,
        Option<Vector3>,
        Option<Vector3>,
    ) {
        let out = if self.count == 0 {
            (None, None, None, None)
        } else {
            let n = self.count as f64;
            (
                Some(Vector3::new(self.ax / n, self.ay / n, self.az / n)),
                self.accel_peak,
                Some(Vector3::new(self.gx / n, self.gy / n, self.gz / n)),
                self.rotation_peak,
            )
        };
        *self = Self::default();
        out
    }
}

/// Track and speed waiting for the next fix, from VTG sentences.
///
#[derive(Clone, Copy, Debug, Default)]
struct Pending {
    track_deg: Option<f64>,
    speed_kn: Option<f64>,
}

/// Affine device-millisecond → offset-seconds mapping established by a
/// time-hack, re-applied to every environment sample until superseded by
/// the next hack. This is the clock-fusion mechanism in miniature.
///
#[derive(Clone, Copy, Debug)]
struct MsCorrelation {
    device_ms: u64,
    offset_sec: f64,
}

impl MsCorrelation {
    fn offset_for(&self, ms: u64) -> f64 {
        self.offset_sec + (ms as f64 - self.device_ms as f64) / 1000.0
    }
}

/// The reader itself. See the module docs for the lifecycle.
///
#[derive(Debug, Default)]
pub struct LogReader {
    state: ReaderState,
    date: Option<NaiveDate>,
    start: Option<DateTime<Utc>>,
    entries: Vec<FixEntry>,
    baro: BaroSeries,
    pending: Pending,
    inertial: InertialAccum,
    alt_filter: AltFilter,
    correlation: Option<MsCorrelation>,
    expect_hack: bool,
    /// Previous GNSS (altitude ft, offset sec) pair for rate-of-descent
    last_gnss: Option<(f64, f64)>,
    last_pressure: Option<f64>,
    orientation: Option<QuatSample>,
    surface_elevation_ft: Option<f64>,
    firmware: Option<String>,
    battery_v: Option<f64>,
    recognized: usize,
    gnss_seen: usize,
}

impl LogReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Position of the first emitted entry, once one exists.
    ///
    pub fn start_position(&self) -> Option<GeodeticPosition> {
        self.entries.first().and_then(|e| e.position)
    }

    /// Count of lines recognized as sentences so far.
    ///
    pub fn recognized(&self) -> usize {
        self.recognized
    }

    /// Count of standard satellite-navigation sentences seen so far.
    ///
    pub fn gnss_seen(&self) -> usize {
        self.gnss_seen
    }

    pub fn firmware(&self) -> Option<&str> {
        self.firmware.as_deref()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Consume one line. Never fails; unparseable lines are absorbed.
    ///
    pub fn feed_line(&mut self, line: &str) {
        if self.state == ReaderState::End {
            return;
        }
        let s = match Sentence::parse(line) {
            Ok(s) => s,
            Err(e) => {
                trace!("absorbed: {}", e);
                return;
            }
        };
        self.recognized += 1;
        if matches!(&s, Sentence::Rmc(_) | Sentence::Vtg(_) | Sentence::Gga(_)) {
            self.gnss_seen += 1;
        }

        match self.state {
            ReaderState::Start => self.on_start(s),
            ReaderState::SeekingRmc => self.on_seeking(s),
            ReaderState::Normal => self.on_normal(s),
            ReaderState::End => (),
        }
    }

    /// Close the log: back-fill barometric altitude onto every entry from
    /// the complete series, then hand everything back. Terminal; further
    /// lines are ignored.
    ///
    #[tracing::instrument(skip(self))]
    pub fn close(&mut self) -> LogData {
        for e in self.entries.iter_mut() {
            e.baro_alt_ft = interp1(&self.baro.offsets, &self.baro.altitudes, e.time_offset);
        }
        self.state = ReaderState::End;
        debug!(
            "closed with {} entries, {} baro samples",
            self.entries.len(),
            self.baro.len()
        );
        LogData {
            entries: std::mem::take(&mut self.entries),
            baro: std::mem::take(&mut self.baro),
            date: self.date,
            start: self.start,
            surface_elevation_ft: self.surface_elevation_ft,
            firmware: self.firmware.take(),
            battery_v: self.battery_v,
            orientation: self.orientation,
        }
    }

    // ----- per-state handlers

    fn on_start(&mut self, s: Sentence) {
        match s {
            Sentence::Version(v) => {
                debug!("log format {} build {}", v.firmware, v.build);
                self.firmware = Some(v.firmware);
                self.state = ReaderState::SeekingRmc;
            }
            Sentence::Surface(elev) => self.surface_elevation_ft = Some(elev),
            _ => trace!("sentence before version info, dropped"),
        }
    }

    fn on_seeking(&mut self, s: Sentence) {
        match s {
            Sentence::Rmc(RmcData {
                valid: true,
                date: Some(date),
                tod,
                ..
            }) => {
                let start = date.and_time(tod).and_utc();
                self.date = Some(date);
                self.start = Some(start);
                self.pending = Pending::default();
                self.inertial = InertialAccum::default();
                self.expect_hack = false;
                debug!("log starts at {}", start);
                self.state = ReaderState::Normal;
            }
            Sentence::Surface(elev) => self.surface_elevation_ft = Some(elev),
            _ => trace!("waiting for first valid RMC"),
        }
    }

    fn on_normal(&mut self, s: Sentence) {
        match s {
            Sentence::Rmc(r) => self.refresh_date(&r),
            Sentence::Vtg(v) => {
                self.pending.track_deg = v.track_deg.or(self.pending.track_deg);
                self.pending.speed_kn = v.speed_kn.or(self.pending.speed_kn);
            }
            Sentence::Gga(g) => self.finalize_fix(&g),
            Sentence::Inertial(i) => self.inertial.absorb(&i),
            Sentence::Environment(e) => self.absorb_env(&e),
            Sentence::TimeHack(ms) => self.absorb_hack(ms),
            Sentence::Orientation(q) => self.orientation = Some(q),
            Sentence::Surface(elev) => self.surface_elevation_ft = Some(elev),
            Sentence::Version(v) => self.firmware = Some(v.firmware),
            Sentence::Diagnostic(t) => debug!("device: {}", t),
            Sentence::AltFix(_) => trace!("alternate fix, unused"),
            Sentence::StateNotice(n) => debug!("device state {} -> {}", n.from, n.to),
        }
    }

    /// The tracked date is established once and only ever moves forward, on
    /// an explicit later date in a valid RMC.
    ///
    fn refresh_date(&mut self, r: &RmcData) {
        if !r.valid {
            return;
        }
        if let (Some(d), Some(cur)) = (r.date, self.date) {
            if d > cur {
                debug!("day rollover {} -> {}", cur, d);
                self.date = Some(d);
            }
        }
    }

    fn absorb_env(&mut self, e: &EnvSample) {
        self.battery_v = Some(e.battery_v);
        self.last_pressure = Some(e.pressure_hpa);
        let filtered = self.alt_filter.push(e.altitude_ft);

        // Samples are only timestampable once a time-hack correlation
        // exists; earlier ones still warm the filter.
        if let Some(corr) = self.correlation {
            let offset = corr.offset_for(e.device_ms);
            let surface = self.surface_elevation_ft.unwrap_or(0.0);
            self.baro.push(offset, filtered - surface);
        }
    }

    /// A hack is honored only under the latch armed by the previous fix;
    /// the first one consumes it, extras are ignored until the next fix.
    /// Fragile against sentence reordering — the device guarantees order.
    ///
    fn absorb_hack(&mut self, ms: u64) {
        if !self.expect_hack {
            trace!("time-hack outside latch window, ignored");
            return;
        }
        self.expect_hack = false;
        if let Some(entry) = self.entries.last() {
            trace!("clock correlation {} ms -> {} s", ms, entry.time_offset);
            self.correlation = Some(MsCorrelation {
                device_ms: ms,
                offset_sec: entry.time_offset,
            });
        }
    }

    fn finalize_fix(&mut self, g: &GgaData) {
        // No established date: no emitted entry at all.
        let (Some(date), Some(start)) = (self.date, self.start) else {
            trace!("fix before date, dropped");
            return;
        };

        let ts = date.and_time(g.tod).and_utc();
        let offset = (ts - start).num_milliseconds() as f64 / 1000.0;

        // The emitted sequence never goes backwards.
        if let Some(last) = self.entries.last() {
            if offset < last.time_offset {
                debug!("fix at {}s behind {}s, dropped", offset, last.time_offset);
                return;
            }
        }

        // Both time and position must be known before an entry exists.
        let position = match (g.latitude, g.longitude) {
            (Some(lat), Some(lon)) if g.quality > 0 => GeodeticPosition {
                latitude: lat,
                longitude: lon,
                altitude: g.altitude_m.unwrap_or(0.0),
            },
            _ => {
                trace!("fix without position, dropped");
                return;
            }
        };

        let rate_of_descent_fpm = match g.altitude_m {
            Some(alt_m) => {
                let alt_ft = to_feet(alt_m);
                let rod = self.last_gnss.and_then(|(prev_alt, prev_off)| {
                    let dt = offset - prev_off;
                    (dt > 0.0).then(|| -(alt_ft - prev_alt) / dt * 60.0)
                });
                self.last_gnss = Some((alt_ft, offset));
                rod
            }
            None => None,
        };

        let (accel_mean, accel_peak, rotation_mean, rotation_peak) = self.inertial.take();

        self.entries.push(FixEntry {
            seq: self.entries.len(),
            time_offset: offset,
            timestamp: Some(ts),
            position: Some(position),
            track_deg: self.pending.track_deg,
            speed_kn: self.pending.speed_kn,
            baro_alt_ft: f64::NAN,
            pressure_hpa: self.last_pressure,
            rate_of_descent_fpm,
            accel_mean,
            accel_peak,
            rotation_mean,
            rotation_peak,
        });

        self.pending = Pending::default();
        self.expect_hack = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::nmea_checksum;

    fn line(body: &str) -> String {
        format!("${}*{:02X}", body, nmea_checksum(body))
    }

    fn gga(tod: &str, alt_m: f64) -> String {
        line(&format!(
            "GPGGA,{},4807.038,N,01131.000,E,1,8,1.0,{:.1},M,47.0,M,,",
            tod, alt_m
        ))
    }

    fn started_reader() -> LogReader {
        let mut r = LogReader::new();
        r.feed_line(&line("PTMPVER,2.4.1,a7c9e2,3"));
        r.feed_line(&line("GPRMC,120000.00,A,4807.038,N,01131.000,E,0.0,0.0,150624,,"));
        assert_eq!(ReaderState::Normal, r.state());
        r
    }

    #[test]
    fn test_empty_close() {
        let mut r = LogReader::new();
        let data = r.close();
        assert_eq!(ReaderState::End, r.state());
        assert!(data.entries.is_empty());
        assert!(data.baro.is_empty());
    }

    #[test]
    fn test_garbage_never_raises() {
        let mut r = LogReader::new();
        for junk in ["", "free text", "$", "$GPXTE,A,A", "\u{fffd}\u{fffd}", "   "] {
            r.feed_line(junk);
        }
        assert_eq!(ReaderState::Start, r.state());
        let data = r.close();
        assert!(data.entries.is_empty());
    }

    #[test]
    fn test_version_advances_to_seeking() {
        let mut r = LogReader::new();
        r.feed_line(&line("PTMPVER,2.4.1,a7c9e2,3"));
        assert_eq!(ReaderState::SeekingRmc, r.state());
        assert_eq!(Some("2.4.1"), r.firmware());
    }

    #[test]
    fn test_fix_without_date_emits_nothing() {
        let mut r = LogReader::new();
        r.feed_line(&line("PTMPVER,2.4.1,a7c9e2,3"));
        r.feed_line(&gga("120001.00", 1200.0));
        assert_eq!(0, r.entry_count());
    }

    #[test]
    fn test_fix_emission_and_offsets() {
        let mut r = started_reader();
        r.feed_line(&line("GPVTG,084.4,T,,M,022.4,N,041.5,K"));
        r.feed_line(&gga("120001.00", 1200.0));
        r.feed_line(&gga("120002.00", 1195.0));
        let data = r.close();

        assert_eq!(2, data.entries.len());
        let a = &data.entries[0];
        let b = &data.entries[1];
        assert_eq!(1.0, a.time_offset);
        assert_eq!(2.0, b.time_offset);
        assert_eq!(Some(84.4), a.track_deg);
        assert_eq!(Some(22.4), a.speed_kn);
        // VTG applies to the pending entry only
        assert_eq!(None, b.track_deg);
        assert!(a.rate_of_descent_fpm.is_none());
        // 5 m over 1 s, descending
        let rod = b.rate_of_descent_fpm.unwrap();
        assert!((rod - 5.0 * 3.28084 * 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_offsets_never_decrease() {
        let mut r = started_reader();
        r.feed_line(&gga("120010.00", 1200.0));
        // Device clock glitch: earlier time-of-day
        r.feed_line(&gga("120005.00", 1198.0));
        r.feed_line(&gga("120011.00", 1196.0));
        let data = r.close();
        let offsets: Vec<f64> = data.entries.iter().map(|e| e.time_offset).collect();
        assert_eq!(vec![10.0, 11.0], offsets);
    }

    #[test]
    fn test_positionless_fix_dropped() {
        let mut r = started_reader();
        r.feed_line(&line("GPGGA,120001.00,,,,,0,0,,,M,,M,,"));
        assert_eq!(0, r.entry_count());
    }

    #[test]
    fn test_day_rollover_keeps_monotonic_offsets() {
        let mut r = LogReader::new();
        r.feed_line(&line("PTMPVER,2.4.1,a7c9e2,3"));
        r.feed_line(&line("GPRMC,235958.00,A,4807.038,N,01131.000,E,0.0,0.0,150624,,"));
        r.feed_line(&gga("235959.00", 1000.0));
        r.feed_line(&line("GPRMC,000001.00,A,4807.038,N,01131.000,E,0.0,0.0,160624,,"));
        r.feed_line(&gga("000002.00", 998.0));
        let data = r.close();
        assert_eq!(2, data.entries.len());
        assert_eq!(1.0, data.entries[0].time_offset);
        // Across midnight: 23:59:58 -> 00:00:02 next day is 4 s
        assert_eq!(4.0, data.entries[1].time_offset);
    }

    #[test]
    fn test_inertial_mean_and_peak() {
        let mut r = started_reader();
        r.feed_line("$PTMPIMU,1000,1.0,0.0,0.0,0.1,0.0,0.0");
        r.feed_line("$PTMPIMU,1010,3.0,0.0,0.0,0.3,0.0,0.0");
        r.feed_line(&gga("120001.00", 1200.0));
        let data = r.close();
        let e = &data.entries[0];
        assert_eq!(2.0, e.accel_mean.unwrap().x);
        assert_eq!(3.0, e.accel_peak.unwrap().x);
        assert_eq!(0.3, e.rotation_peak.unwrap().x);
        // Accumulators reset after the fix
        assert!(data.entries.len() == 1);
    }

    #[test]
    fn test_hack_requires_latch() {
        let mut r = started_reader();
        // No fix yet, latch not armed: correlation must not form
        r.feed_line("$PTMPHCK,5000");
        r.feed_line("$PTMPENV,5100,1013.0,1000.0,3.9");
        r.feed_line(&gga("120001.00", 1200.0));
        let data = r.close();
        assert!(data.baro.is_empty());
    }

    #[test]
    fn test_env_timestamped_through_correlation() {
        let mut r = started_reader();
        r.feed_line(&gga("120010.00", 1200.0));
        r.feed_line("$PTMPHCK,50000");
        // Second hack without a new fix is ignored
        r.feed_line("$PTMPHCK,99999");
        r.feed_line("$PTMPENV,50500,1013.0,1000.0,3.9");
        r.feed_line("$PTMPENV,51000,1013.0,1000.0,3.9");
        let data = r.close();
        assert_eq!(2, data.baro.len());
        assert_eq!(10.5, data.baro.offsets[0]);
        assert_eq!(11.0, data.baro.offsets[1]);
        assert_eq!(Some(3.9), data.battery_v);
    }

    #[test]
    fn test_surface_elevation_subtracted_from_baro() {
        let mut r = LogReader::new();
        r.feed_line(&line("PTMPSFC,1000"));
        r.feed_line(&line("PTMPVER,2.4.1,a7c9e2,3"));
        r.feed_line(&line("GPRMC,120000.00,A,4807.038,N,01131.000,E,0.0,0.0,150624,,"));
        r.feed_line(&gga("120001.00", 1200.0));
        r.feed_line("$PTMPHCK,1000");
        r.feed_line("$PTMPENV,1500,1013.0,1500.0,3.9");
        let data = r.close();
        assert_eq!(Some(1000.0), data.surface_elevation_ft);
        assert_eq!(1, data.baro.len());
        assert_eq!(500.0, data.baro.altitudes[0]);
    }

    #[test]
    fn test_backfill_nan_outside_domain() {
        let mut r = started_reader();
        r.feed_line(&gga("120010.00", 1200.0));
        r.feed_line("$PTMPHCK,50000");
        r.feed_line("$PTMPENV,52000,1013.0,1000.0,3.9");
        r.feed_line("$PTMPENV,56000,1013.0,1020.0,3.9");
        r.feed_line(&gga("120014.00", 1195.0));
        r.feed_line(&gga("120030.00", 1190.0));
        let data = r.close();

        // First fix at 10 s precedes the baro domain [12 s, 16 s]
        assert!(data.entries[0].baro_alt_ft.is_nan());
        // Second fix at 14 s interpolates between the filtered samples
        assert!(!data.entries[1].baro_alt_ft.is_nan());
        // Third fix at 30 s is past the domain
        assert!(data.entries[2].baro_alt_ft.is_nan());
    }

    #[test]
    fn test_feed_after_close_is_ignored() {
        let mut r = started_reader();
        r.close();
        r.feed_line(&gga("120001.00", 1200.0));
        assert_eq!(ReaderState::End, r.state());
        assert_eq!(0, r.entry_count());
    }
}
