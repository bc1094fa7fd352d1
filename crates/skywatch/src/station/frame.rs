//! Immutable snapshot handed to the rendering surface on every tick.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::almanac::AlmanacSnapshot;
use crate::sample::Sample;
use crate::trend::TrendResult;

use super::session::SessionState;

/// Whether the realtime link is currently up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connected => "Connected",
        }
    }
}

/// Inline, non-fatal problem shown at the bottom of the dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Last inbound payload could not be used; cleared by the next valid sample
    Protocol(String),
    /// Previous frame failed to draw; cleared by the next successful draw
    Render(String),
    /// Link dropped; stays until shutdown since there is no reconnect
    Disconnected(String),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::Protocol(msg) => format!("Protocol error: {}", msg),
            Notice::Render(msg) => format!("Render error: {}", msg),
            Notice::Disconnected(reason) => format!("Disconnected: {}", reason),
        }
    }
}

/// Everything one rendered frame shows, taken at a single instant
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayFrame {
    /// Wall clock in the observer's timezone
    pub timestamp: DateTime<Tz>,
    /// Latest sample; kept across disconnects
    pub sample: Option<Sample>,
    pub trend: TrendResult,
    pub almanac: AlmanacSnapshot,
    pub connection: ConnectionState,
    pub session: SessionState,
    pub notice: Option<Notice>,
}

impl DisplayFrame {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// Reading from the latest sample, if any
    pub fn reading(&self, name: &str) -> Option<f64> {
        self.sample.as_ref().and_then(|s| s.get(name))
    }
}
