//! The closed sentence family emitted by the recorder.
//!
//! Standard satellite-navigation sentences (RMC, VTG, GGA under any talker)
//! plus the proprietary `PTMP` family. Envelope: `$TAG,field1,...*CC` with
//! CC the two-hex-digit XOR checksum over the content between `$` and `*`.
//!

use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use nom::bytes::complete::is_not;
use nom::character::complete::{char, hex_digit1};
use nom::combinator::opt;
use nom::sequence::preceded;
use nom::IResult;
use serde::Serialize;
use strum::EnumString;

use tempo_common::Vector3;

use crate::checksum::{nmea_checksum, repair_line};
use crate::error::SentenceError;

/// Every tag the reader recognizes. Standard sentences are matched on the
/// three letters after the talker prefix, proprietary ones on the full tag.
///
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display, EnumString)]
pub enum Tag {
    #[strum(serialize = "RMC")]
    Rmc,
    #[strum(serialize = "VTG")]
    Vtg,
    #[strum(serialize = "GGA")]
    Gga,
    /// Version/build info
    #[strum(serialize = "PTMPVER")]
    Ver,
    /// Surface elevation (ft)
    #[strum(serialize = "PTMPSFC")]
    Sfc,
    /// Environment sample (device-ms, pressure hPa, estimated altitude ft, battery V)
    #[strum(serialize = "PTMPENV")]
    Env,
    /// Raw inertial sample (device-ms, 3-axis accel m/s², 3-axis rotation rad/s)
    #[strum(serialize = "PTMPIMU")]
    Imu,
    /// Orientation quaternion
    #[strum(serialize = "PTMPQUA")]
    Qua,
    /// Millisecond time-hack
    #[strum(serialize = "PTMPHCK")]
    Hck,
    /// Free-text diagnostic
    #[strum(serialize = "PTMPDBG")]
    Dbg,
    /// Alternate fix
    #[strum(serialize = "PTMPFIX")]
    Fix,
    /// State-transition notice
    #[strum(serialize = "PTMPSTA")]
    Sta,
}

/// RMC — validity, time-of-day, date, plus ground speed/track.
///
#[derive(Clone, Debug, PartialEq)]
pub struct RmcData {
    pub tod: NaiveTime,
    /// Receiver reports the fix as valid (`A` status)
    pub valid: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_kn: Option<f64>,
    pub track_deg: Option<f64>,
    pub date: Option<NaiveDate>,
}

/// VTG — ground track and speed.
///
#[derive(Clone, Debug, PartialEq)]
pub struct VtgData {
    pub track_deg: Option<f64>,
    pub speed_kn: Option<f64>,
}

/// GGA — the primary position fix.
///
#[derive(Clone, Debug, PartialEq)]
pub struct GgaData {
    pub tod: NaiveTime,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// 0 = no fix
    pub quality: u8,
    pub sats: Option<u8>,
    pub hdop: Option<f64>,
    /// Antenna altitude MSL in meters
    pub altitude_m: Option<f64>,
}

/// Firmware version/build info, first sentence of every log.
///
#[derive(Clone, Debug, PartialEq)]
pub struct VersionInfo {
    pub firmware: String,
    pub build: String,
    pub protocol: String,
}

/// One barometric/environment sample, timestamped on the device clock.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvSample {
    pub device_ms: u64,
    pub pressure_hpa: f64,
    pub altitude_ft: f64,
    pub battery_v: f64,
}

/// One raw inertial sample, timestamped on the device clock.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImuSample {
    pub device_ms: u64,
    /// m/s²
    pub accel: Vector3,
    /// rad/s
    pub rotation: Vector3,
}

/// Orientation quaternion sample.
///
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct QuatSample {
    pub device_ms: u64,
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Alternate fix, redundant position source on the device clock.
///
#[derive(Clone, Debug, PartialEq)]
pub struct AltFixData {
    pub device_ms: u64,
    pub tod: NaiveTime,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_m: Option<f64>,
    pub quality: u8,
    pub hdop: Option<f64>,
    pub vdop: Option<f64>,
}

/// Firmware state-transition notice.
///
#[derive(Clone, Debug, PartialEq)]
pub struct StateNotice {
    pub from: String,
    pub to: String,
}

/// One parsed sentence. The enum is closed on purpose: dispatch everywhere
/// is an exhaustive match, never a string-keyed table.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Sentence {
    Rmc(RmcData),
    Vtg(VtgData),
    Gga(GgaData),
    Version(VersionInfo),
    /// Surface elevation in ft
    Surface(f64),
    Environment(EnvSample),
    Inertial(ImuSample),
    Orientation(QuatSample),
    /// Device millisecond count at the hack
    TimeHack(u64),
    Diagnostic(String),
    AltFix(AltFixData),
    StateNotice(StateNotice),
}

/// `$` + body + optional `*CC`.
///
fn parse_frame(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    let (input, _) = char('$')(input)?;
    let (input, body) = is_not("*")(input)?;
    let (input, cksum) = opt(preceded(char('*'), hex_digit1))(input)?;
    Ok((input, (body, cksum)))
}

fn classify(tag: &str) -> Option<Tag> {
    // The proprietary family matches on the full tag.
    //
    if tag.starts_with("PTMP") {
        return Tag::from_str(tag).ok();
    }
    // Standard sentences carry a two-letter talker prefix (GP, GN, ...).
    //
    if tag.len() == 5 {
        return Tag::from_str(&tag[2..]).ok();
    }
    None
}

// ----- field helpers

fn bad(tag: Tag, field: &'static str, value: &str) -> SentenceError {
    SentenceError::BadField {
        tag: tag.to_string(),
        field,
        value: value.to_string(),
    }
}

fn req<T: FromStr>(tag: Tag, field: &'static str, s: &str) -> Result<T, SentenceError> {
    s.parse::<T>().map_err(|_| bad(tag, field, s))
}

fn optional<T: FromStr>(
    tag: Tag,
    field: &'static str,
    s: &str,
) -> Result<Option<T>, SentenceError> {
    if s.is_empty() {
        Ok(None)
    } else {
        s.parse::<T>().map(Some).map_err(|_| bad(tag, field, s))
    }
}

/// `hhmmss.sss` time-of-day.
///
fn parse_tod(tag: Tag, s: &str) -> Result<NaiveTime, SentenceError> {
    NaiveTime::parse_from_str(s, "%H%M%S%.f").map_err(|_| bad(tag, "time", s))
}

/// `ddmmyy` calendar date.
///
fn parse_date(tag: Tag, s: &str) -> Result<Option<NaiveDate>, SentenceError> {
    if s.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(s, "%d%m%y")
        .map(Some)
        .map_err(|_| bad(tag, "date", s))
}

/// NMEA `(d)ddmm.mmmm` angle plus hemisphere letter.
///
fn parse_angle(
    tag: Tag,
    field: &'static str,
    s: &str,
    hemi: &str,
) -> Result<Option<f64>, SentenceError> {
    if s.is_empty() || hemi.is_empty() {
        return Ok(None);
    }
    let dot = s.find('.').unwrap_or(s.len());
    if dot < 3 {
        return Err(bad(tag, field, s));
    }
    let (deg_str, min_str) = s.split_at(dot - 2);
    let deg: f64 = deg_str.parse().map_err(|_| bad(tag, field, s))?;
    let minutes: f64 = min_str.parse().map_err(|_| bad(tag, field, s))?;
    let v = deg + minutes / 60.0;
    match hemi {
        "N" | "E" => Ok(Some(v)),
        "S" | "W" => Ok(Some(-v)),
        _ => Err(bad(tag, field, hemi)),
    }
}

impl Sentence {
    /// Parse one raw line into a sentence.
    ///
    /// Applies the checksum repair first, then the envelope, then the
    /// per-tag field grammar. The caller decides what to do with the error;
    /// the reader absorbs and logs it.
    ///
    pub fn parse(line: &str) -> Result<Sentence, SentenceError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(SentenceError::Empty);
        }
        let repaired = repair_line(line);

        let (_, (body, cksum)) =
            parse_frame(&repaired).map_err(|_| SentenceError::BadFraming)?;

        let computed = nmea_checksum(body);
        if let Some(found) = cksum {
            let found_val =
                u8::from_str_radix(found, 16).map_err(|_| SentenceError::BadChecksum {
                    computed,
                    found: found.to_string(),
                })?;
            if found_val != computed {
                return Err(SentenceError::BadChecksum {
                    computed,
                    found: found.to_string(),
                });
            }
        }

        let mut it = body.split(',');
        let tag_str = it.next().unwrap_or("");
        let fields: Vec<&str> = it.collect();
        let tag =
            classify(tag_str).ok_or_else(|| SentenceError::UnknownTag(tag_str.to_string()))?;

        match tag {
            Tag::Rmc => Self::parse_rmc(tag, &fields),
            Tag::Vtg => Self::parse_vtg(tag, &fields),
            Tag::Gga => Self::parse_gga(tag, &fields),
            Tag::Ver => Self::parse_ver(tag, &fields),
            Tag::Sfc => Self::parse_sfc(tag, &fields),
            Tag::Env => Self::parse_env(tag, &fields),
            Tag::Imu => Self::parse_imu(tag, &fields),
            Tag::Qua => Self::parse_qua(tag, &fields),
            Tag::Hck => Self::parse_hck(tag, &fields),
            Tag::Dbg => Ok(Sentence::Diagnostic(fields.join(","))),
            Tag::Fix => Self::parse_fix(tag, &fields),
            Tag::Sta => Self::parse_sta(tag, &fields),
        }
    }

    fn need(tag: Tag, fields: &[&str], n: usize) -> Result<(), SentenceError> {
        if fields.len() < n {
            Err(SentenceError::TooShort(tag.to_string()))
        } else {
            Ok(())
        }
    }

    fn parse_rmc(tag: Tag, f: &[&str]) -> Result<Sentence, SentenceError> {
        Self::need(tag, f, 9)?;
        Ok(Sentence::Rmc(RmcData {
            tod: parse_tod(tag, f[0])?,
            valid: f[1] == "A",
            latitude: parse_angle(tag, "latitude", f[2], f[3])?,
            longitude: parse_angle(tag, "longitude", f[4], f[5])?,
            speed_kn: optional(tag, "speed", f[6])?,
            track_deg: optional(tag, "track", f[7])?,
            date: parse_date(tag, f[8])?,
        }))
    }

    fn parse_vtg(tag: Tag, f: &[&str]) -> Result<Sentence, SentenceError> {
        Self::need(tag, f, 5)?;
        Ok(Sentence::Vtg(VtgData {
            track_deg: optional(tag, "track", f[0])?,
            speed_kn: optional(tag, "speed", f[4])?,
        }))
    }

    fn parse_gga(tag: Tag, f: &[&str]) -> Result<Sentence, SentenceError> {
        Self::need(tag, f, 9)?;
        Ok(Sentence::Gga(GgaData {
            tod: parse_tod(tag, f[0])?,
            latitude: parse_angle(tag, "latitude", f[1], f[2])?,
            longitude: parse_angle(tag, "longitude", f[3], f[4])?,
            quality: req(tag, "quality", f[5])?,
            sats: optional(tag, "sats", f[6])?,
            hdop: optional(tag, "hdop", f[7])?,
            altitude_m: optional(tag, "altitude", f[8])?,
        }))
    }

    fn parse_ver(tag: Tag, f: &[&str]) -> Result<Sentence, SentenceError> {
        Self::need(tag, f, 3)?;
        Ok(Sentence::Version(VersionInfo {
            firmware: f[0].to_string(),
            build: f[1].to_string(),
            protocol: f[2].to_string(),
        }))
    }

    fn parse_sfc(tag: Tag, f: &[&str]) -> Result<Sentence, SentenceError> {
        Self::need(tag, f, 1)?;
        Ok(Sentence::Surface(req(tag, "elevation", f[0])?))
    }

    fn parse_env(tag: Tag, f: &[&str]) -> Result<Sentence, SentenceError> {
        Self::need(tag, f, 4)?;
        Ok(Sentence::Environment(EnvSample {
            device_ms: req(tag, "device_ms", f[0])?,
            pressure_hpa: req(tag, "pressure", f[1])?,
            altitude_ft: req(tag, "altitude", f[2])?,
            battery_v: req(tag, "battery", f[3])?,
        }))
    }

    fn parse_imu(tag: Tag, f: &[&str]) -> Result<Sentence, SentenceError> {
        Self::need(tag, f, 7)?;
        Ok(Sentence::Inertial(ImuSample {
            device_ms: req(tag, "device_ms", f[0])?,
            accel: Vector3::new(
                req(tag, "ax", f[1])?,
                req(tag, "ay", f[2])?,
                req(tag, "az", f[3])?,
            ),
            rotation: Vector3::new(
                req(tag, "gx", f[4])?,
                req(tag, "gy", f[5])?,
                req(tag, "gz", f[6])?,
            ),
        }))
    }

    fn parse_qua(tag: Tag, f: &[&str]) -> Result<Sentence, SentenceError> {
        Self::need(tag, f, 5)?;
        Ok(Sentence::Orientation(QuatSample {
            device_ms: req(tag, "device_ms", f[0])?,
            w: req(tag, "w", f[1])?,
            x: req(tag, "x", f[2])?,
            y: req(tag, "y", f[3])?,
            z: req(tag, "z", f[4])?,
        }))
    }

    fn parse_hck(tag: Tag, f: &[&str]) -> Result<Sentence, SentenceError> {
        Self::need(tag, f, 1)?;
        Ok(Sentence::TimeHack(req(tag, "device_ms", f[0])?))
    }

    fn parse_fix(tag: Tag, f: &[&str]) -> Result<Sentence, SentenceError> {
        Self::need(tag, f, 10)?;
        Ok(Sentence::AltFix(AltFixData {
            device_ms: req(tag, "device_ms", f[0])?,
            tod: parse_tod(tag, f[1])?,
            latitude: parse_angle(tag, "latitude", f[2], f[3])?,
            longitude: parse_angle(tag, "longitude", f[4], f[5])?,
            altitude_m: optional(tag, "altitude", f[6])?,
            quality: req(tag, "quality", f[7])?,
            hdop: optional(tag, "hdop", f[8])?,
            vdop: optional(tag, "vdop", f[9])?,
        }))
    }

    fn parse_sta(tag: Tag, f: &[&str]) -> Result<Sentence, SentenceError> {
        Self::need(tag, f, 2)?;
        Ok(Sentence::StateNotice(StateNotice {
            from: f[0].to_string(),
            to: f[1].to_string(),
        }))
    }
}
