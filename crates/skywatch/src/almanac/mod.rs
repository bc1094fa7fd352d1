//! Sun and moon almanac for a fixed observer.
//!
//! Rise, set and transit times are searched within the observer's local
//! calendar day (local midnight to the next local midnight). A body that
//! stays above or below the horizon all day simply has no rise/set time.
//! Positions and moon phase are evaluated at the requested instant.

pub mod coords;
pub mod moon;
pub mod search;
pub mod sun;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

pub use coords::Horizontal;
pub use moon::MoonPhase;

/// Observer coordinates outside the valid range
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("latitude must be within [-90, 90], got {0}")]
    Latitude(f64),
    #[error("longitude must be within [-180, 180], got {0}")]
    Longitude(f64),
}

/// Fixed observer position; immutable for the life of the process
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverLocation {
    latitude: f64,
    longitude: f64,
    timezone: Tz,
}

impl ObserverLocation {
    /// Latitude/longitude in degrees (north and east positive)
    pub fn new(latitude: f64, longitude: f64, timezone: Tz) -> Result<Self, LocationError> {
        if !(latitude.is_finite() && (-90.0..=90.0).contains(&latitude)) {
            return Err(LocationError::Latitude(latitude));
        }
        if !(longitude.is_finite() && (-180.0..=180.0).contains(&longitude)) {
            return Err(LocationError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
            timezone,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// `[local midnight, next local midnight)` of the local day containing `now`
    pub fn local_day(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let date = now.with_timezone(&self.timezone).date_naive();
        let start = local_midnight(date, self.timezone);
        let end = date
            .succ_opt()
            .map(|next| local_midnight(next, self.timezone))
            .unwrap_or(start + Duration::hours(24));
        (start, end)
    }
}

/// First existing instant of `date` in `tz`; midnight can be skipped by a DST jump
fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    (0..24)
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .find_map(|time| tz.from_local_datetime(&date.and_time(time)).earliest())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

/// Everything the dashboard shows about the sky at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct AlmanacSnapshot {
    pub sunrise: Option<DateTime<Tz>>,
    pub sunset: Option<DateTime<Tz>>,
    pub solar_noon: Option<DateTime<Tz>>,
    pub moonrise: Option<DateTime<Tz>>,
    pub moonset: Option<DateTime<Tz>>,
    /// Sunset minus sunrise; `None` unless both happen and sunrise comes first
    pub day_length: Option<Duration>,
    pub sun: Horizontal,
    pub moon: Horizontal,
    /// Illuminated fraction of the moon, percent
    pub moon_illumination: f64,
    /// Position in the synodic cycle, degrees (0 new, 180 full)
    pub moon_phase_angle: f64,
    pub moon_phase: MoonPhase,
}

/// Computes almanac snapshots for one observer
#[derive(Debug, Clone)]
pub struct AlmanacCalculator {
    observer: ObserverLocation,
}

impl AlmanacCalculator {
    pub fn new(observer: ObserverLocation) -> Self {
        Self { observer }
    }

    pub fn observer(&self) -> &ObserverLocation {
        &self.observer
    }

    /// Compute a fresh snapshot for `now`
    pub fn get_almanac(&self, now: DateTime<Utc>) -> AlmanacSnapshot {
        let tz = self.observer.timezone;
        let (day_start, day_end) = self.observer.local_day(now);

        let sun_events = search::find_crossings(day_start, day_end, |t| {
            self.sun_at(t).altitude - sun::RISE_SET_ALTITUDE
        });
        let moon_events = search::find_crossings(day_start, day_end, |t| {
            self.moon_at(t).altitude - moon::RISE_SET_ALTITUDE
        });
        let solar_noon = search::find_transit(day_start, day_end, |t| {
            let days = coords::days_since_j2000(t);
            coords::hour_angle(
                days,
                self.observer.longitude.to_radians(),
                sun::position(days).right_ascension,
            )
        });

        let day_length = match (sun_events.rising, sun_events.setting) {
            (Some(rise), Some(set)) if set > rise => Some(set - rise),
            _ => None,
        };

        let days = coords::days_since_j2000(now);
        let sun_position = sun::position(days);
        let moon_position = moon::position(days);
        let phase_angle = moon::phase_angle(days);

        let local = |t: Option<DateTime<Utc>>| t.map(|t| t.with_timezone(&tz));
        AlmanacSnapshot {
            sunrise: local(sun_events.rising),
            sunset: local(sun_events.setting),
            solar_noon: local(solar_noon),
            moonrise: local(moon_events.rising),
            moonset: local(moon_events.setting),
            day_length,
            sun: self.horizontal(&sun_position, days),
            moon: self.horizontal(&moon_position, days),
            moon_illumination: moon::illuminated_fraction(&sun_position, &moon_position) * 100.0,
            moon_phase_angle: phase_angle,
            moon_phase: MoonPhase::from_angle(phase_angle),
        }
    }

    fn sun_at(&self, t: DateTime<Utc>) -> Horizontal {
        let days = coords::days_since_j2000(t);
        self.horizontal(&sun::position(days), days)
    }

    fn moon_at(&self, t: DateTime<Utc>) -> Horizontal {
        let days = coords::days_since_j2000(t);
        self.horizontal(&moon::position(days), days)
    }

    fn horizontal(&self, position: &coords::Equatorial, days: f64) -> Horizontal {
        coords::to_horizontal(
            position,
            days,
            self.observer.latitude.to_radians(),
            self.observer.longitude.to_radians(),
        )
    }
}
