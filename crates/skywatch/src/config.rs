use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::almanac::ObserverLocation;

/// Default realtime endpoint for Ambient Weather stations
pub const DEFAULT_ENDPOINT: &str = "wss://rt2.ambientweather.net";

/// Environment variable holding one or more comma separated API keys
pub const ENV_API_KEY: &str = "SKYWATCH_API_KEY";
/// Environment variable holding the application key
pub const ENV_APPLICATION_KEY: &str = "SKYWATCH_APPLICATION_KEY";
/// Environment variable overriding the realtime endpoint
pub const ENV_ENDPOINT: &str = "SKYWATCH_ENDPOINT";

/// Root configuration for a dashboard session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Device API keys to subscribe to
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// Application key identifying this client to the provider
    #[serde(default)]
    pub application_key: String,

    /// Base URL of the realtime service
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Where the station is; drives the almanac
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Render tick in milliseconds
    #[serde(default = "default_render_interval_ms")]
    pub render_interval_ms: u64,

    /// Upper bound for the initial connect + handshake
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Upper bound for the unsubscribe/close sequence; defaults to one render tick
    #[serde(default)]
    pub shutdown_timeout_ms: Option<u64>,

    /// Pressure trend tuning
    #[serde(default)]
    pub trend: TrendConfig,
}

/// Observer position as written in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// IANA timezone name, e.g. `America/New_York`
    pub timezone: String,
}

/// Pressure trend analyzer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendConfig {
    #[serde(default = "default_window_hours")]
    pub window_hours: f64,
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_render_interval_ms() -> u64 {
    1000
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_window_hours() -> f64 {
    3.0
}

fn default_min_samples() -> usize {
    6
}

fn default_capacity() -> usize {
    500
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            timezone: "UTC".to_string(),
        }
    }
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            min_samples: default_min_samples(),
            capacity: default_capacity(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            application_key: String::new(),
            endpoint: default_endpoint(),
            observer: ObserverConfig::default(),
            render_interval_ms: default_render_interval_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            shutdown_timeout_ms: None,
            trend: TrendConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply `SKYWATCH_*` overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup (environment, tests)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(keys) = lookup(ENV_API_KEY) {
            let keys: Vec<String> = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
            if !keys.is_empty() {
                self.api_keys = keys;
            }
        }
        if let Some(key) = lookup(ENV_APPLICATION_KEY) {
            self.application_key = key.trim().to_string();
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.endpoint = endpoint.trim().to_string();
        }
    }

    /// Check everything the session relies on before connecting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_keys.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "at least one API key is required (set api_keys or {})",
                ENV_API_KEY
            )));
        }
        if self.application_key.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "application key is required (set application_key or {})",
                ENV_APPLICATION_KEY
            )));
        }
        // Goes into the query string as-is
        if !self.application_key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Invalid(
                "application key may only contain ASCII letters and digits".to_string(),
            ));
        }
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(ConfigError::Invalid(format!(
                "endpoint must be a ws:// or wss:// URL, got '{}'",
                self.endpoint
            )));
        }
        self.observer_location()?;
        if self.render_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "render_interval_ms must be positive".to_string(),
            ));
        }
        // Closing must not hold up the loop for more than one tick
        if let Some(timeout) = self.shutdown_timeout_ms {
            if timeout == 0 || timeout > self.render_interval_ms {
                return Err(ConfigError::Invalid(format!(
                    "shutdown_timeout_ms must be within 1..={} (one render tick), got {}",
                    self.render_interval_ms, timeout
                )));
            }
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_secs must be positive".to_string(),
            ));
        }
        if !(self.trend.window_hours.is_finite() && self.trend.window_hours > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "trend.window_hours must be positive, got {}",
                self.trend.window_hours
            )));
        }
        if self.trend.min_samples < 2 {
            return Err(ConfigError::Invalid(format!(
                "trend.min_samples must be at least 2, got {}",
                self.trend.min_samples
            )));
        }
        if self.trend.capacity < self.trend.min_samples {
            return Err(ConfigError::Invalid(format!(
                "trend.capacity ({}) must hold at least min_samples ({})",
                self.trend.capacity, self.trend.min_samples
            )));
        }
        Ok(())
    }

    /// Resolve the observer block into a validated location
    pub fn observer_location(&self) -> Result<ObserverLocation, ConfigError> {
        let o = &self.observer;
        let timezone = o
            .timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{}'", o.timezone)))?;
        ObserverLocation::new(o.latitude, o.longitude, timezone).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms.unwrap_or(self.render_interval_ms))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
