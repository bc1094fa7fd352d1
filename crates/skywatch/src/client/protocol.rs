//! Socket.IO v4 over Engine.IO v4 text framing.
//!
//! Only the subset used by the realtime weather feed is supported: the
//! default namespace, text frames, events without acknowledgements.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ProtocolError;

/// Engine.IO protocol revision requested in the URL
pub const ENGINE_IO_VERSION: u8 = 4;

/// Socket.IO connect request for the default namespace
pub const CONNECT: &str = "40";
/// Socket.IO disconnect for the default namespace
pub const DISCONNECT: &str = "41";
/// Engine.IO heartbeat reply
pub const PONG: &str = "3";

pub const EVENT_SUBSCRIBE: &str = "subscribe";
pub const EVENT_UNSUBSCRIBE: &str = "unsubscribe";
pub const EVENT_DATA: &str = "data";
pub const EVENT_SUBSCRIBED: &str = "subscribed";

/// Parameters from the Engine.IO `open` packet
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

impl Handshake {
    /// Silence longer than this means the server is gone
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

/// One decoded Engine.IO frame
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Noop,
}

/// Socket.IO packet carried inside an Engine.IO message
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// Namespace connect acknowledged
    Connect,
    Disconnect,
    Event { name: String, payload: Value },
    /// Server refused the namespace connect
    ConnectError(String),
}

/// Realtime endpoint URL for an application key
pub fn endpoint_url(base: &str, application_key: &str) -> String {
    format!(
        "{}/socket.io/?api=1&applicationKey={}&EIO={}&transport=websocket",
        base.trim_end_matches('/'),
        application_key,
        ENGINE_IO_VERSION
    )
}

/// Endpoint URL with the application key masked, for logs
pub fn redacted_url(base: &str) -> String {
    endpoint_url(base, "***")
}

/// Decode one text frame
pub fn decode(frame: &str) -> Result<Packet, ProtocolError> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ProtocolError::Frame("empty frame".to_string()))?;
    let body = chars.as_str();

    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(body)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket(body).map(Packet::Message),
        '6' => Ok(Packet::Noop),
        other => Err(ProtocolError::UnknownPacket(other.to_string())),
    }
}

fn decode_socket(body: &str) -> Result<SocketPacket, ProtocolError> {
    let mut chars = body.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ProtocolError::Frame("empty socket packet".to_string()))?;
    let rest = strip_namespace(chars.as_str());

    match kind {
        '0' => Ok(SocketPacket::Connect),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => decode_event(rest),
        '4' => {
            let reason = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| rest.to_string());
            Ok(SocketPacket::ConnectError(reason))
        }
        other => Err(ProtocolError::UnknownPacket(format!("4{}", other))),
    }
}

/// Drop a `/namespace,` prefix if the server sent one
fn strip_namespace(rest: &str) -> &str {
    if rest.starts_with('/') {
        match rest.find(',') {
            Some(idx) => &rest[idx + 1..],
            None => "",
        }
    } else {
        rest
    }
}

fn decode_event(rest: &str) -> Result<SocketPacket, ProtocolError> {
    // Skip an acknowledgement id, if any
    let json_start = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    let items: Vec<Value> = serde_json::from_str(json_start)?;
    let mut items = items.into_iter();
    let name = match items.next() {
        Some(Value::String(name)) => name,
        Some(other) => {
            return Err(ProtocolError::Payload(format!(
                "event name must be a string, got {}",
                other
            )))
        }
        None => return Err(ProtocolError::Payload("event without a name".to_string())),
    };
    Ok(SocketPacket::Event {
        name,
        payload: items.next().unwrap_or(Value::Null),
    })
}

/// Encode an event for the default namespace
pub fn encode_event(name: &str, payload: &Value) -> String {
    format!("42{}", json!([name, payload]))
}

pub fn subscribe(api_keys: &[String]) -> String {
    encode_event(EVENT_SUBSCRIBE, &json!({ "apiKeys": api_keys }))
}

pub fn unsubscribe(api_keys: &[String]) -> String {
    encode_event(EVENT_UNSUBSCRIBE, &json!({ "apiKeys": api_keys }))
}

/// Device count from a `subscribed` acknowledgement
pub fn subscribed_devices(payload: &Value) -> usize {
    payload
        .get("devices")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}
