//! Inverse transverse Mercator for UTM zone 30N on the WGS84 ellipsoid.
//!
//! Traffic location files published before 2019 only carry projected coordinates.
//! The series expansion follows Snyder, *Map Projections: A Working Manual* (1987),
//! eq. 8-18 to 8-25, accurate to well below a metre inside the zone.

use crate::geo::distance::LatLon;

const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;
const SCALE_FACTOR: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const CENTRAL_MERIDIAN_DEG: f64 = -3.0;

/// Converts UTM zone 30N easting/northing (metres) to latitude/longitude in degrees.
///
/// Returns `None` when the input or the result is not finite.
///
/// ```
/// use madrid_air_quality::utm30n_to_wgs84;
///
/// let sol = utm30n_to_wgs84(440_291.27, 4_474_254.64).unwrap();
/// assert!((sol.latitude() - 40.4168).abs() < 1e-3);
/// assert!((sol.longitude() + 3.7038).abs() < 1e-3);
/// ```
pub fn utm30n_to_wgs84(easting: f64, northing: f64) -> Option<LatLon> {
    if !easting.is_finite() || !northing.is_finite() {
        return None;
    }
    let a = SEMI_MAJOR_AXIS;
    let e2 = FLATTENING * (2.0 - FLATTENING);
    let ep2 = e2 / (1.0 - e2);

    let x = easting - FALSE_EASTING;
    let m = northing / SCALE_FACTOR;
    let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));

    let root = (1.0 - e2).sqrt();
    let e1 = (1.0 - root) / (1.0 + root);
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin_phi, cos_phi) = phi1.sin_cos();
    let tan_phi = phi1.tan();
    let c1 = ep2 * cos_phi * cos_phi;
    let t1 = tan_phi * tan_phi;
    let w = 1.0 - e2 * sin_phi * sin_phi;
    let n1 = a / w.sqrt();
    let r1 = a * (1.0 - e2) / w.powf(1.5);
    let d = x / (n1 * SCALE_FACTOR);

    let latitude = phi1
        - (n1 * tan_phi / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let longitude = CENTRAL_MERIDIAN_DEG.to_radians()
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / cos_phi;

    let result = LatLon(latitude.to_degrees(), longitude.to_degrees());
    (result.0.is_finite() && result.1.is_finite()).then_some(result)
}
