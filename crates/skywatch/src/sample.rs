//! One pushed reading-set from the weather station.
//!
//! Every field is optional: stations differ in the sensors they carry and
//! a single push may omit any of them.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::error::ProtocolError;

/// Field names used by the dashboard
pub mod fields {
    pub const TEMPERATURE: &str = "tempf";
    pub const HUMIDITY: &str = "humidity";
    pub const FEELS_LIKE: &str = "feelsLike";
    pub const DEW_POINT: &str = "dewPoint";
    pub const UV: &str = "uv";
    pub const SOLAR_RADIATION: &str = "solarradiation";
    pub const INDOOR_TEMPERATURE: &str = "tempinf";
    pub const INDOOR_HUMIDITY: &str = "humidityin";
    pub const TEMPERATURE_2: &str = "temp2f";
    pub const HUMIDITY_2: &str = "humidity2";
    pub const PRESSURE: &str = "baromrelin";
    pub const WIND_SPEED: &str = "windspeedmph";
    pub const WIND_GUST: &str = "windgustmph";
    pub const MAX_DAILY_GUST: &str = "maxdailygust";
    pub const WIND_DIRECTION: &str = "winddir";
    pub const WIND_DIRECTION_AVG_10M: &str = "winddir_avg10m";
    pub const DAILY_RAIN: &str = "dailyrainin";
    pub const BATTERY: &str = "battout";

    /// Observation time in epoch milliseconds
    pub const DATE_UTC: &str = "dateutc";
    pub const MAC_ADDRESS: &str = "macAddress";
}

/// Timestamped, sparse mapping of reading name to value
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// When the push arrived at this client
    pub received_at: DateTime<Utc>,
    /// When the station says it observed the values
    pub observed_at: Option<DateTime<Utc>>,
    /// Device that produced the sample
    pub device: Option<String>,
    readings: BTreeMap<String, f64>,
}

impl Sample {
    pub fn new(received_at: DateTime<Utc>) -> Self {
        Self {
            received_at,
            observed_at: None,
            device: None,
            readings: BTreeMap::new(),
        }
    }

    /// Builder-style insert, mostly for tests and fixtures
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        if value.is_finite() {
            self.readings.insert(name.to_string(), value);
        }
    }

    /// Reading by name; `None` when this push did not carry it
    pub fn get(&self, name: &str) -> Option<f64> {
        self.readings.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.readings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn pressure(&self) -> Option<f64> {
        self.get(fields::PRESSURE)
    }

    /// Parse a `data` event payload.
    ///
    /// Numeric members become readings (numeric strings included); other
    /// members are ignored apart from the observation time and device id.
    pub fn from_payload(payload: &Value, received_at: DateTime<Utc>) -> Result<Self, ProtocolError> {
        let object = payload.as_object().ok_or_else(|| {
            ProtocolError::Payload(format!("data payload must be an object, got {}", kind(payload)))
        })?;

        let mut sample = Sample::new(received_at);
        for (name, value) in object {
            match name.as_str() {
                fields::DATE_UTC => {
                    sample.observed_at = value
                        .as_i64()
                        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
                }
                fields::MAC_ADDRESS => {
                    sample.device = value.as_str().map(String::from);
                }
                _ => {
                    if let Some(number) = numeric(value) {
                        sample.insert(name, number);
                    }
                }
            }
        }
        Ok(sample)
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// 16-point compass name for a bearing in degrees
pub fn compass_point(degrees: f64) -> &'static str {
    let index = ((degrees + 11.25) / 22.5).floor() as i64;
    COMPASS_POINTS[index.rem_euclid(16) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_ambient_payload() {
        let payload = json!({
            "dateutc": 1717243200000i64,
            "tempf": 72.3,
            "humidity": 45,
            "baromrelin": "29.921",
            "macAddress": "00:11:22:33:44:55",
            "date": "2024-06-01T12:00:00.000Z",
            "tz": "America/New_York"
        });

        let sample = Sample::from_payload(&payload, at()).unwrap();
        assert_eq!(sample.get(fields::TEMPERATURE), Some(72.3));
        assert_eq!(sample.get(fields::HUMIDITY), Some(45.0));
        assert_eq!(sample.pressure(), Some(29.921));
        assert_eq!(sample.device.as_deref(), Some("00:11:22:33:44:55"));
        assert_eq!(
            sample.observed_at,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
        );
        // "date" and "tz" are text and are not readings
        assert_eq!(sample.len(), 3);
        assert!(!sample.contains("tz"));
    }

    #[test]
    fn missing_fields_are_absent() {
        let sample = Sample::from_payload(&json!({"tempf": 50.0}), at()).unwrap();
        assert_eq!(sample.get(fields::WIND_SPEED), None);
        assert_eq!(sample.pressure(), None);
    }

    #[test]
    fn non_object_payload_is_protocol_error() {
        let err = Sample::from_payload(&json!([1, 2, 3]), at()).unwrap_err();
        assert!(matches!(err, ProtocolError::Payload(_)));
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn non_finite_values_are_dropped() {
        let sample = Sample::new(at()).with("tempf", f64::NAN);
        assert!(sample.is_empty());
    }

    #[test]
    fn compass_points_wrap() {
        assert_eq!(compass_point(0.0), "N");
        assert_eq!(compass_point(11.24), "N");
        assert_eq!(compass_point(11.25), "NNE");
        assert_eq!(compass_point(90.0), "E");
        assert_eq!(compass_point(225.0), "SW");
        assert_eq!(compass_point(348.75), "N");
        assert_eq!(compass_point(360.0), "N");
        assert_eq!(compass_point(-22.5), "NNW");
    }
}
