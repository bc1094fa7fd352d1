//! Error types for the station session.

use thiserror::Error;

use crate::config::ConfigError;

/// Malformed or unexpected data from the realtime feed.
///
/// Never fatal: the controller shows it inline and keeps the last sample.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// Frame could not be split into packet type and body
    #[error("Malformed frame: {0}")]
    Frame(String),

    /// Packet type the client does not understand
    #[error("Unknown packet type '{0}'")]
    UnknownPacket(String),

    /// Packet body was not the JSON we expected
    #[error("Invalid payload: {0}")]
    Payload(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Payload(err.to_string())
    }
}

/// Errors that can end or degrade a station session.
#[derive(Debug, Error)]
pub enum StationError {
    /// Transport or handshake failure; fatal for the session
    #[error("Connection error: {0}")]
    Connection(String),

    /// Inbound data could not be understood
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Frame could not be composed or drawn
    #[error("Render error: {0}")]
    Render(String),

    /// Invalid or unreadable configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Terminal or other I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for StationError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        StationError::Connection(err.to_string())
    }
}
