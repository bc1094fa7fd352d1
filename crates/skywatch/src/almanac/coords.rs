//! Time scales and coordinate conversions shared by the sun and moon models.

use std::f64::consts::{PI, TAU};

use chrono::{DateTime, Utc};

/// Julian date of the Unix epoch
pub const J1970: f64 = 2_440_587.5;
/// Julian date of the J2000.0 epoch
pub const J2000: f64 = 2_451_545.0;

/// Mean obliquity of the ecliptic (J2000), radians
const OBLIQUITY: f64 = 23.4397 * PI / 180.0;

pub fn julian_date(t: DateTime<Utc>) -> f64 {
    t.timestamp_millis() as f64 / 86_400_000.0 + J1970
}

/// Days (fractional) since J2000.0
pub fn days_since_j2000(t: DateTime<Utc>) -> f64 {
    julian_date(t) - J2000
}

/// Geocentric equatorial position; angles in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equatorial {
    pub right_ascension: f64,
    pub declination: f64,
    pub distance_km: f64,
}

/// Position in the observer's sky, degrees.
///
/// Azimuth is measured clockwise from true north, altitude (elevation)
/// above the geometric horizon.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Horizontal {
    pub azimuth: f64,
    pub altitude: f64,
}

/// Ecliptic longitude/latitude (radians) to right ascension/declination
pub fn ecliptic_to_equatorial(longitude: f64, latitude: f64) -> (f64, f64) {
    let (sin_e, cos_e) = OBLIQUITY.sin_cos();
    let ra = (longitude.sin() * cos_e - latitude.tan() * sin_e).atan2(longitude.cos());
    let dec = (latitude.sin() * cos_e + latitude.cos() * sin_e * longitude.sin()).asin();
    (ra, dec)
}

/// Local sidereal time in radians for an east-positive longitude in radians
pub fn sidereal_time(days: f64, longitude: f64) -> f64 {
    (280.16 + 360.985_623_5 * days).to_radians() + longitude
}

/// Hour angle wrapped to [-PI, PI); negative before transit
pub fn hour_angle(days: f64, longitude: f64, right_ascension: f64) -> f64 {
    wrap_pi(sidereal_time(days, longitude) - right_ascension)
}

/// Project an equatorial position onto the observer's sky
pub fn to_horizontal(
    position: &Equatorial,
    days: f64,
    latitude: f64,
    longitude: f64,
) -> Horizontal {
    let h = hour_angle(days, longitude, position.right_ascension);
    let dec = position.declination;
    let (sin_phi, cos_phi) = latitude.sin_cos();

    let altitude = (sin_phi * dec.sin() + cos_phi * dec.cos() * h.cos())
        .clamp(-1.0, 1.0)
        .asin();
    // atan2 term is measured from south; shift to north-based
    let azimuth = h.sin().atan2(h.cos() * sin_phi - dec.tan() * cos_phi) + PI;

    Horizontal {
        azimuth: wrap_tau(azimuth).to_degrees(),
        altitude: altitude.to_degrees(),
    }
}

pub fn wrap_pi(angle: f64) -> f64 {
    (angle + PI).rem_euclid(TAU) - PI
}

pub fn wrap_tau(angle: f64) -> f64 {
    angle.rem_euclid(TAU)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn julian_date_of_known_epochs() {
        let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(julian_date(epoch), J1970);

        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert!(days_since_j2000(j2000).abs() < 1e-9);
    }

    #[test]
    fn wrap_pi_stays_in_range() {
        for angle in [-10.0, -PI, -1.0, 0.0, 1.0, PI, 7.0, 100.0] {
            let w = wrap_pi(angle);
            assert!((-PI..PI).contains(&w), "{} -> {}", angle, w);
            assert!(((angle - w) / TAU - ((angle - w) / TAU).round()).abs() < 1e-9);
        }
    }

    #[test]
    fn object_on_meridian_is_due_south_from_north_latitudes() {
        // Put an object exactly on the meridian by matching sidereal time
        let days = 100.0;
        let lst = sidereal_time(days, 0.0);
        let pos = Equatorial {
            right_ascension: lst,
            declination: 0.0,
            distance_km: 1.0,
        };
        let h = to_horizontal(&pos, days, 45f64.to_radians(), 0.0);
        assert!((h.azimuth - 180.0).abs() < 1e-6, "azimuth {}", h.azimuth);
        assert!((h.altitude - 45.0).abs() < 1e-6, "altitude {}", h.altitude);
    }

    #[test]
    fn rising_object_is_in_the_east() {
        let days = 100.0;
        let lst = sidereal_time(days, 0.0);
        // Six hours before transit, on the celestial equator
        let pos = Equatorial {
            right_ascension: lst + PI / 2.0,
            declination: 0.0,
            distance_km: 1.0,
        };
        let h = to_horizontal(&pos, days, 30f64.to_radians(), 0.0);
        assert!((h.azimuth - 90.0).abs() < 1e-6, "azimuth {}", h.azimuth);
        assert!(h.altitude.abs() < 1e-6);
    }
}
