//! Direct geodesic problem on the WGS-84 ellipsoid.
//!

/// WGS-84 semi-major axis, meters.
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS-84 semi-minor axis, meters.
pub const WGS84_B: f64 = 6_356_752.3142;

/// Destination point from a start point, forward azimuth and distance.
///
/// Closed-form second-order series expansion — a single correction pass
/// over the arc length instead of an iterative solver. Accurate at
/// canopy-glide distances, hundreds of meters; do not use it for
/// continental legs.
///
/// Returns (latitude, longitude) in degrees.
///
pub fn ellipsoidal_traverse(
    lat_deg: f64,
    lon_deg: f64,
    azimuth_deg: f64,
    distance_m: f64,
) -> (f64, f64) {
    let f = (WGS84_A - WGS84_B) / WGS84_A;

    let phi1 = lat_deg.to_radians();
    let alpha1 = azimuth_deg.to_radians();
    let (sin_a1, cos_a1) = alpha1.sin_cos();

    let tan_u1 = (1.0 - f) * phi1.tan();
    let u1 = tan_u1.atan();
    let (sin_u1, cos_u1) = u1.sin_cos();

    let sigma1 = tan_u1.atan2(cos_a1);
    let sin_alpha = cos_u1 * sin_a1;
    let cos2_alpha = 1.0 - sin_alpha * sin_alpha;
    let u2 = cos2_alpha * (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);

    let a_coef = 1.0 + u2 / 16384.0 * (4096.0 + u2 * (-768.0 + u2 * (320.0 - 175.0 * u2)));
    let b_coef = u2 / 1024.0 * (256.0 + u2 * (-128.0 + u2 * (74.0 - 47.0 * u2)));

    // First guess of the arc length, then one second-order correction
    let sigma0 = distance_m / (WGS84_B * a_coef);
    let two_sigma_m = 2.0 * sigma1 + sigma0;
    let delta = b_coef
        * sigma0.sin()
        * (two_sigma_m.cos()
            + b_coef / 4.0
                * sigma0.cos()
                * (-1.0 + 2.0 * two_sigma_m.cos() * two_sigma_m.cos()));
    let sigma = sigma0 + delta;

    let (sin_s, cos_s) = sigma.sin_cos();
    let cos_2sm = (2.0 * sigma1 + sigma).cos();

    let tmp = sin_u1 * sin_s - cos_u1 * cos_s * cos_a1;
    let phi2 = (sin_u1 * cos_s + cos_u1 * sin_s * cos_a1)
        .atan2((1.0 - f) * (sin_alpha * sin_alpha + tmp * tmp).sqrt());

    let lambda = (sin_s * sin_a1).atan2(cos_u1 * cos_s - sin_u1 * sin_s * cos_a1);
    let c = f / 16.0 * cos2_alpha * (4.0 + f * (4.0 - 3.0 * cos2_alpha));
    let dl = lambda
        - (1.0 - c)
            * f
            * sin_alpha
            * (sigma + c * sin_s * (cos_2sm + c * cos_s * (-1.0 + 2.0 * cos_2sm * cos_2sm)));

    (phi2.to_degrees(), lon_deg + dl.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[inline]
    fn shorten(v: f64) -> String {
        format!("{:.5}", v)
    }

    #[test]
    fn test_traverse_zero_distance() {
        let (lat, lon) = ellipsoidal_traverse(48.1173, 11.5167, 84.4, 0.0);
        assert_eq!(shorten(48.1173), shorten(lat));
        assert_eq!(shorten(11.5167), shorten(lon));
    }

    #[test]
    fn test_traverse_north_at_equator() {
        // 1000 m along the meridian: meridional radius a(1-e²) = 6335439 m
        let (lat, lon) = ellipsoidal_traverse(0.0, 0.0, 0.0, 1000.0);
        assert!((lat - 0.0090437).abs() < 1e-5);
        assert!(lon.abs() < 1e-9);
    }

    #[test]
    fn test_traverse_east_at_equator() {
        // 1000 m along the equator: radius a = 6378137 m
        let (lat, lon) = ellipsoidal_traverse(0.0, 0.0, 90.0, 1000.0);
        assert!((lon - 0.0089832).abs() < 1e-5);
        assert!(lat.abs() < 1e-6);
    }

    #[test]
    fn test_traverse_southwest_mid_latitude() {
        let (lat, lon) = ellipsoidal_traverse(48.0, 11.0, 225.0, 500.0);
        assert!(lat < 48.0);
        assert!(lon < 11.0);
        // Both displacements on the order of 350 m
        assert!((48.0 - lat) * 111_000.0 > 300.0);
        assert!((48.0 - lat) * 111_000.0 < 400.0);
    }
}
