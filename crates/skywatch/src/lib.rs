//! Skywatch: live terminal dashboard for a personal weather station.
//!
//! Samples pushed by the station's realtime feed are combined with a rolling
//! barometric trend and a sun/moon almanac into a frame that is redrawn on a
//! fixed tick.

pub mod almanac;
pub mod client;
pub mod config;
pub mod error;
pub mod sample;
pub mod station;
pub mod trend;
pub mod tui;

pub use config::Config;
pub use error::{ProtocolError, StationError};
pub use station::Station;
