//! Low-precision solar ephemeris (about a minute of accuracy in rise/set).

use std::f64::consts::PI;

use super::coords::{ecliptic_to_equatorial, Equatorial};

/// Apparent altitude of the sun's upper limb at rise/set, degrees
pub const RISE_SET_ALTITUDE: f64 = -0.833;

const ASTRONOMICAL_UNIT_KM: f64 = 149_597_870.7;
const PERIHELION: f64 = 102.9372 * PI / 180.0;

fn mean_anomaly(days: f64) -> f64 {
    (357.5291 + 0.985_600_28 * days).to_radians()
}

fn ecliptic_longitude(m: f64) -> f64 {
    let center = (1.9148 * m.sin() + 0.02 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin()).to_radians();
    m + center + PERIHELION + PI
}

/// Geocentric equatorial position of the sun `days` after J2000.0
pub fn position(days: f64) -> Equatorial {
    let m = mean_anomaly(days);
    let longitude = ecliptic_longitude(m);
    let (right_ascension, declination) = ecliptic_to_equatorial(longitude, 0.0);
    let distance_au = 1.000_14 - 0.016_71 * m.cos() - 0.000_14 * (2.0 * m).cos();

    Equatorial {
        right_ascension,
        declination,
        distance_km: distance_au * ASTRONOMICAL_UNIT_KM,
    }
}
