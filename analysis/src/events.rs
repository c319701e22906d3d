//! Jump-phase event detection.
//!
//! Three independent threshold/window rules over the fused series locate
//! exit, deployment/activation and landing. Every result is optional:
//! "not detected" is always distinct from a legitimate zero.
//!

use serde::Serialize;
use tracing::{debug, trace};

use tempo_common::{to_feet, STD_G};

use crate::track::TrackSeries;

/// Sustained vertical speed marking freefall after exit, ft/min.
const EXIT_VSPEED_FPM: f64 = -2000.0;
/// Vertical speed below which deployment scanning arms, ft/min.
const FREEFALL_VSPEED_FPM: f64 = -5000.0;
/// Deceleration marking a deployment, in g.
const DEPLOY_DECEL_G: f64 = 0.25;
/// Vertical speed above which the canopy is flying, ft/min.
const ACTIVATION_VSPEED_FPM: f64 = -2000.0;
/// Altitude below which landing detection runs, ft above surface.
const LANDING_ALT_FT: f64 = 500.0;
/// Settled vertical-speed band for landing, ft/min.
const LANDING_BAND_FPM: f64 = 100.0;
/// Settled window for landing, seconds.
const LANDING_WINDOW_SEC: f64 = 10.0;

/// The detected jump phases. Absent fields mean "not detected", never zero.
///
#[derive(Clone, Debug, Default, Serialize)]
pub struct JumpEvents {
    pub exit_offset_sec: Option<f64>,
    pub exit_altitude_ft: Option<f64>,
    pub deployment_offset_sec: Option<f64>,
    pub deploy_altitude_ft: Option<f64>,
    pub activation_offset_sec: Option<f64>,
    pub landing_offset_sec: Option<f64>,
    /// Maximum descent-rate magnitude strictly between exit and deployment
    pub max_descent_rate_fpm: Option<f64>,
}

/// Exit point: offset plus the nearest altitude sample.
///
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ExitPoint {
    pub offset_sec: f64,
    pub altitude_ft: f64,
}

/// Deployment point, with the later activation offset when one exists.
///
#[derive(Clone, Copy, Debug, Serialize)]
pub struct DeploymentPoint {
    pub offset_sec: f64,
    pub altitude_ft: f64,
    pub activation_offset_sec: Option<f64>,
}

/// First sample opening a contiguous ≈1 s window of vertical speed at or
/// below the freefall threshold.
///
#[tracing::instrument(skip(track))]
pub fn detect_exit(track: &TrackSeries) -> Option<ExitPoint> {
    let v = &track.vspeed_fpm;
    let win = (track.sample_rate_hz.round() as usize).max(1);
    if v.len() < win {
        return None;
    }
    for i in 0..=v.len() - win {
        if v[i..i + win].iter().all(|&s| s <= EXIT_VSPEED_FPM) {
            trace!("exit window opens at sample {}", i);
            return Some(ExitPoint {
                offset_sec: track.offsets[i],
                altitude_ft: track.altitude_ft[i],
            });
        }
    }
    None
}

/// Deployment: once freefall is established (below −5000 ft/min), the first
/// position whose rolling-window deceleration exceeds 0.25 g. Activation is
/// the first later sample back above −2000 ft/min.
///
#[tracing::instrument(skip(track))]
pub fn detect_deployment(track: &TrackSeries) -> Option<DeploymentPoint> {
    let v = &track.vspeed_fpm;
    let t = &track.offsets;

    let armed = v.iter().position(|&s| s < FREEFALL_VSPEED_FPM)?;
    let w = ((track.sample_rate_hz * 0.1).round() as usize).max(1);
    // 0.25 g in ft/min²
    let threshold = to_feet(DEPLOY_DECEL_G * STD_G) * 3600.0;

    let mut deploy: Option<usize> = None;
    for i in (armed + w)..v.len() {
        let dt_min = (t[i] - t[i - w]) / 60.0;
        if dt_min <= 0.0 {
            continue;
        }
        let decel = (v[i] - v[i - w]) / dt_min;
        if decel > threshold {
            debug!("deceleration {:.0} ft/min² at sample {}", decel, i);
            deploy = Some(i);
            break;
        }
    }
    let deploy = deploy?;

    let activation = (deploy..v.len())
        .find(|&j| v[j] > ACTIVATION_VSPEED_FPM)
        .map(|j| t[j]);

    Some(DeploymentPoint {
        offset_sec: t[deploy],
        altitude_ft: track.altitude_ft[deploy],
        activation_offset_sec: activation,
    })
}

/// Landing: first position below 500 ft with a full contiguous 10 s window
/// of settled vertical speed. Fallback, only when the primary rule finds
/// nothing: first altitude at or below zero.
///
#[tracing::instrument(skip(track))]
pub fn detect_landing(track: &TrackSeries) -> Option<f64> {
    let v = &track.vspeed_fpm;
    let a = &track.altitude_ft;
    let win = ((LANDING_WINDOW_SEC * track.sample_rate_hz).round() as usize).max(1);

    for i in 0..v.len() {
        if a[i] < LANDING_ALT_FT
            && i + win <= v.len()
            && v[i..i + win].iter().all(|&s| s.abs() <= LANDING_BAND_FPM)
        {
            return Some(track.offsets[i]);
        }
    }

    a.iter()
        .position(|&alt| alt <= 0.0)
        .map(|i| track.offsets[i])
}

/// Compose the three detectors, plus the maximum descent rate strictly
/// between exit and deployment (omitted, not zeroed, when either is).
///
#[tracing::instrument(skip(track))]
pub fn analyze_jump(track: &TrackSeries) -> JumpEvents {
    let mut events = JumpEvents::default();

    if let Some(exit) = detect_exit(track) {
        events.exit_offset_sec = Some(exit.offset_sec);
        events.exit_altitude_ft = Some(exit.altitude_ft);
    }
    if let Some(deploy) = detect_deployment(track) {
        events.deployment_offset_sec = Some(deploy.offset_sec);
        events.deploy_altitude_ft = Some(deploy.altitude_ft);
        events.activation_offset_sec = deploy.activation_offset_sec;
    }
    events.landing_offset_sec = detect_landing(track);

    if let (Some(exit), Some(deploy)) =
        (events.exit_offset_sec, events.deployment_offset_sec)
    {
        let max = track
            .offsets
            .iter()
            .zip(&track.vspeed_fpm)
            .filter(|(&t, _)| t > exit && t < deploy)
            .map(|(_, &v)| -v)
            .fold(f64::NEG_INFINITY, f64::max);
        if max.is_finite() {
            events.max_descent_rate_fpm = Some(max);
        }
    }

    events
}
