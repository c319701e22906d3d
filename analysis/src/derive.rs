//! Per-pair derived values: glide, speed decomposition, touchdown estimate.
//!

use serde::Serialize;
use tracing::trace;

use tempo_common::{knots_to_ms, ms_to_fpm, ms_to_mph, to_meters, GeodeticPosition};
use tempo_sentences::FixEntry;

use crate::geodesy::ellipsoidal_traverse;

/// AGL below which a touchdown point is estimated, meters.
const TOUCHDOWN_AGL_M: f64 = 1000.0;

/// Values derived from one consecutive pair of fix entries.
///
#[derive(Clone, Copy, Debug, Serialize)]
pub struct DerivedPoint {
    pub offset_sec: f64,
    /// 0° = flat, 90° = straight down
    pub glide_angle_deg: f64,
    pub ground_speed_mph: f64,
    /// Positive = climbing
    pub vertical_speed_fpm: f64,
    /// 3-D ground-relative speed
    pub total_speed_mph: f64,
    pub agl_m: f64,
    /// No-flare touchdown estimate. The altitude carries the assumed
    /// surface elevation — a visualization aid, not a verified value.
    pub touchdown: Option<GeodeticPosition>,
}

/// Project derived values over each consecutive entry pair carrying
/// position, ground speed and track.
///
#[tracing::instrument(skip(entries))]
pub fn project_derived(entries: &[FixEntry], surface_elevation_ft: f64) -> Vec<DerivedPoint> {
    let surface_m = to_meters(surface_elevation_ft);
    let mut out = Vec::with_capacity(entries.len());

    for pair in entries.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let (Some(pa), Some(pb)) = (a.position, b.position) else {
            continue;
        };
        let (Some(speed_kn), Some(track_deg)) = (b.speed_kn, b.track_deg) else {
            continue;
        };
        let dt = b.time_offset - a.time_offset;
        if dt <= 0.0 {
            continue;
        }

        // Vertical rate from GNSS altitude deltas, m/s, positive climbing
        let vertical_ms = (pb.altitude - pa.altitude) / dt;
        let ground_ms = knots_to_ms(speed_kn);
        let total_ms = (ground_ms * ground_ms + vertical_ms * vertical_ms).sqrt();
        let glide_angle_deg = (-vertical_ms).atan2(ground_ms).to_degrees();
        let agl_m = pb.altitude - surface_m;

        let touchdown = if agl_m > 0.0 && agl_m < TOUCHDOWN_AGL_M && vertical_ms < 0.0 {
            let time_to_ground = agl_m / -vertical_ms;
            let distance = ground_ms * time_to_ground;
            trace!("touchdown estimate {:.0} m ahead", distance);
            let (lat, lon) =
                ellipsoidal_traverse(pb.latitude, pb.longitude, track_deg, distance);
            Some(GeodeticPosition {
                latitude: lat,
                longitude: lon,
                altitude: surface_m,
            })
        } else {
            None
        };

        out.push(DerivedPoint {
            offset_sec: b.time_offset,
            glide_angle_deg,
            ground_speed_mph: ms_to_mph(ground_ms),
            vertical_speed_fpm: ms_to_fpm(vertical_ms),
            total_speed_mph: ms_to_mph(total_ms),
            agl_m,
            touchdown,
        });
    }
    out
}
