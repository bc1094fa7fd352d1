//! Low-precision lunar ephemeris, illumination and phase.

use super::coords::{ecliptic_to_equatorial, Equatorial, J2000};

/// Geocentric altitude of the moon's upper limb at rise/set, degrees.
///
/// Parallax (~0.95°) outweighs refraction plus semi-diameter, so the
/// threshold sits slightly above the horizon.
pub const RISE_SET_ALTITUDE: f64 = 0.125;

/// Mean length of the lunar phase cycle, days
pub const SYNODIC_MONTH: f64 = 29.530_588_853;

/// Julian date of a reference new moon (2000-01-06 18:14 UTC)
const REFERENCE_NEW_MOON: f64 = 2_451_550.1;

/// Geocentric equatorial position of the moon `days` after J2000.0
pub fn position(days: f64) -> Equatorial {
    let mean_longitude = (218.316 + 13.176_396 * days).to_radians();
    let mean_anomaly = (134.963 + 13.064_993 * days).to_radians();
    let argument_of_latitude = (93.272 + 13.229_350 * days).to_radians();

    let longitude = mean_longitude + 6.289f64.to_radians() * mean_anomaly.sin();
    let latitude = 5.128f64.to_radians() * argument_of_latitude.sin();
    let (right_ascension, declination) = ecliptic_to_equatorial(longitude, latitude);

    Equatorial {
        right_ascension,
        declination,
        distance_km: 385_001.0 - 20_905.0 * mean_anomaly.cos(),
    }
}

/// Illuminated fraction of the disc (0..=1) from the sun-moon geometry
pub fn illuminated_fraction(sun: &Equatorial, moon: &Equatorial) -> f64 {
    let elongation = (sun.declination.sin() * moon.declination.sin()
        + sun.declination.cos()
            * moon.declination.cos()
            * (sun.right_ascension - moon.right_ascension).cos())
    .clamp(-1.0, 1.0)
    .acos();

    let incidence = (sun.distance_km * elongation.sin())
        .atan2(moon.distance_km - sun.distance_km * elongation.cos());

    (1.0 + incidence.cos()) / 2.0
}

/// Position in the synodic cycle as an angle in [0, 360): 0 new, 180 full
pub fn phase_angle(days: f64) -> f64 {
    let since_new = days + J2000 - REFERENCE_NEW_MOON;
    (since_new / SYNODIC_MONTH).rem_euclid(1.0) * 360.0
}

/// Discrete phase of the moon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoonPhase {
    New,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    Full,
    WaningGibbous,
    LastQuarter,
    WaningCrescent,
}

/// Upper bounds (exclusive) of each bucket, in cycle order
const PHASE_BOUNDS: [(f64, MoonPhase); 9] = [
    (11.25, MoonPhase::New),
    (78.75, MoonPhase::WaxingCrescent),
    (101.25, MoonPhase::FirstQuarter),
    (168.75, MoonPhase::WaxingGibbous),
    (191.25, MoonPhase::Full),
    (258.75, MoonPhase::WaningGibbous),
    (281.25, MoonPhase::LastQuarter),
    (348.75, MoonPhase::WaningCrescent),
    (360.0, MoonPhase::New),
];

impl MoonPhase {
    /// Bucket a phase angle in degrees; any finite angle is normalised first
    pub fn from_angle(degrees: f64) -> Self {
        let angle = degrees.rem_euclid(360.0);
        PHASE_BOUNDS
            .iter()
            .find(|(upper, _)| angle < *upper)
            .map(|(_, phase)| *phase)
            .unwrap_or(MoonPhase::New)
    }

    pub fn name(self) -> &'static str {
        match self {
            MoonPhase::New => "New Moon",
            MoonPhase::WaxingCrescent => "Waxing Crescent",
            MoonPhase::FirstQuarter => "First Quarter",
            MoonPhase::WaxingGibbous => "Waxing Gibbous",
            MoonPhase::Full => "Full Moon",
            MoonPhase::WaningGibbous => "Waning Gibbous",
            MoonPhase::LastQuarter => "Last Quarter",
            MoonPhase::WaningCrescent => "Waning Crescent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::almanac::coords::days_since_j2000;
    use crate::almanac::sun;
    use chrono::{TimeZone, Utc};

    #[test]
    fn phase_buckets_at_boundaries() {
        let cases = [
            (0.0, MoonPhase::New),
            (11.2499, MoonPhase::New),
            (11.25, MoonPhase::WaxingCrescent),
            (78.7499, MoonPhase::WaxingCrescent),
            (78.75, MoonPhase::FirstQuarter),
            (101.25, MoonPhase::WaxingGibbous),
            (168.75, MoonPhase::Full),
            (191.2499, MoonPhase::Full),
            (191.25, MoonPhase::WaningGibbous),
            (258.75, MoonPhase::LastQuarter),
            (281.25, MoonPhase::WaningCrescent),
            (348.7499, MoonPhase::WaningCrescent),
            (348.75, MoonPhase::New),
            (359.9999, MoonPhase::New),
            (360.0, MoonPhase::New),
            (-90.0, MoonPhase::LastQuarter),
        ];
        for (angle, expected) in cases {
            assert_eq!(MoonPhase::from_angle(angle), expected, "angle {}", angle);
        }
    }

    #[test]
    fn phase_buckets_cover_the_circle_without_gaps() {
        // Walk the circle in small steps: every angle lands in exactly one
        // bucket and buckets only change at the listed boundaries.
        let boundaries = [
            11.25, 78.75, 101.25, 168.75, 191.25, 258.75, 281.25, 348.75,
        ];
        let mut previous = MoonPhase::from_angle(0.0);
        let mut changes = Vec::new();
        let mut step = 0;
        while step < 36_000 {
            let angle = step as f64 / 100.0;
            let phase = MoonPhase::from_angle(angle);
            if phase != previous {
                changes.push(angle);
                previous = phase;
            }
            step += 1;
        }
        assert_eq!(changes.len(), boundaries.len());
        for (seen, expected) in changes.iter().zip(boundaries.iter()) {
            assert!((seen - expected).abs() < 1e-9, "{} vs {}", seen, expected);
        }
    }

    #[test]
    fn known_new_and_full_moons() {
        // New moon 2024-01-11 11:57 UTC, full moon 2024-01-25 17:54 UTC
        let new = days_since_j2000(Utc.with_ymd_and_hms(2024, 1, 11, 11, 57, 0).unwrap());
        let full = days_since_j2000(Utc.with_ymd_and_hms(2024, 1, 25, 17, 54, 0).unwrap());

        assert_eq!(MoonPhase::from_angle(phase_angle(new)), MoonPhase::New);
        assert_eq!(MoonPhase::from_angle(phase_angle(full)), MoonPhase::Full);

        let lit_new = illuminated_fraction(&sun::position(new), &position(new));
        let lit_full = illuminated_fraction(&sun::position(full), &position(full));
        assert!(lit_new < 0.05, "new moon illumination {}", lit_new);
        assert!(lit_full > 0.95, "full moon illumination {}", lit_full);
    }

    #[test]
    fn distance_within_orbit_bounds() {
        for day in 0..60 {
            let d = position(8_800.0 + day as f64).distance_km;
            assert!((356_000.0..=406_000.0).contains(&d), "distance {}", d);
        }
    }
}
