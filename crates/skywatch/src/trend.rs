//! Barometric pressure trend over a rolling time window.
//!
//! Readings land in a bounded, time-ordered history. Each trend query first
//! drops readings older than the window, then fits an ordinary least squares
//! line through what is left; the slope is the rate in units per hour.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use crate::config::TrendConfig;

/// Rates below this magnitude (units/hour) count as steady
pub const STEADY_THRESHOLD: f64 = 0.02;

/// Direction of pressure change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    InsufficientData,
    Steady,
    Rising,
    Falling,
}

impl Trend {
    pub fn label(self) -> &'static str {
        match self {
            Trend::InsufficientData => "collecting data",
            Trend::Steady => "steady",
            Trend::Rising => "rising",
            Trend::Falling => "falling",
        }
    }
}

/// Trend classification plus the fitted rate (units per hour)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendResult {
    pub trend: Trend,
    pub rate: f64,
}

impl TrendResult {
    pub const INSUFFICIENT: TrendResult = TrendResult {
        trend: Trend::InsufficientData,
        rate: 0.0,
    };

    /// Classify a fitted rate
    pub fn from_rate(rate: f64) -> Self {
        let trend = if rate.abs() < STEADY_THRESHOLD {
            Trend::Steady
        } else if rate > 0.0 {
            Trend::Rising
        } else {
            Trend::Falling
        };
        Self { trend, rate }
    }
}

/// Bounded, strictly time-ordered (timestamp, pressure) history
#[derive(Debug, Clone)]
pub struct PressureHistory {
    entries: VecDeque<(DateTime<Utc>, f64)>,
    capacity: usize,
}

impl PressureHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest one when full.
    ///
    /// Returns false (and stores nothing) when `timestamp` does not come
    /// strictly after the newest entry.
    pub fn push(&mut self, timestamp: DateTime<Utc>, pressure: f64) -> bool {
        if !pressure.is_finite() {
            return false;
        }
        if let Some((last, _)) = self.entries.back() {
            if timestamp <= *last {
                return false;
            }
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((timestamp, pressure));
        true
    }

    /// Drop every entry strictly older than `cutoff`
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) {
        while matches!(self.entries.front(), Some((t, _)) if *t < cutoff) {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &(DateTime<Utc>, f64)> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<(DateTime<Utc>, f64)> {
        self.entries.back().copied()
    }
}

/// Rolling-window regression over the pressure history
#[derive(Debug, Clone)]
pub struct PressureTrendAnalyzer {
    history: PressureHistory,
    window: Duration,
    min_samples: usize,
}

impl PressureTrendAnalyzer {
    pub fn new(window_hours: f64, min_samples: usize, capacity: usize) -> Self {
        let window_ms = (window_hours * 3_600_000.0).round() as i64;
        Self {
            history: PressureHistory::new(capacity),
            window: Duration::milliseconds(window_ms),
            min_samples,
        }
    }

    pub fn from_config(config: &TrendConfig) -> Self {
        Self::new(config.window_hours, config.min_samples, config.capacity)
    }

    /// Record a pressure reading taken at `timestamp`
    pub fn add_reading(&mut self, pressure: f64, timestamp: DateTime<Utc>) -> bool {
        let stored = self.history.push(timestamp, pressure);
        if !stored {
            log::debug!(
                "Ignoring pressure reading {} at {} (out of order or invalid)",
                pressure,
                timestamp
            );
        }
        stored
    }

    /// Prune to the window ending at `now` and classify what remains
    pub fn get_trend(&mut self, now: DateTime<Utc>) -> TrendResult {
        let cutoff = now - self.window;
        self.history.prune_before(cutoff);

        if self.history.len() < self.min_samples {
            return TrendResult::INSUFFICIENT;
        }

        let points: Vec<(f64, f64)> = self
            .history
            .iter()
            .map(|(t, p)| (hours_between(cutoff, *t), *p))
            .collect();

        TrendResult::from_rate(least_squares_slope(&points))
    }

    pub fn history(&self) -> &PressureHistory {
        &self.history
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 3_600_000.0
}

/// Slope of the OLS line through `points`; zero when x has no spread
fn least_squares_slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    if points.len() < 2 {
        return 0.0;
    }
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
        let dx = x - mean_x;
        (sxy + dx * (y - mean_y), sxx + dx * dx)
    });

    if sxx == 0.0 {
        0.0
    } else {
        sxy / sxx
    }
}
