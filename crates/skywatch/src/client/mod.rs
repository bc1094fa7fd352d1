//! Push subscription to the realtime weather feed.
//!
//! `connect` performs the WebSocket + Socket.IO handshake under a timeout and
//! then hands the socket to a background driver task. The driver turns
//! inbound frames into [`ClientEvent`]s on a channel and executes
//! [`ClientCommand`]s sent through the [`SubscriptionHandle`].
//!
//! There is no reconnect: once the link drops, a single
//! [`ClientEvent::Disconnected`] is emitted and the driver exits.

pub mod protocol;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

use crate::error::{ProtocolError, StationError};
use crate::sample::Sample;
use protocol::{Handshake, Packet, SocketPacket};

/// Inbound events buffered between the driver and the controller
const EVENT_BUFFER: usize = 64;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle and data events emitted by the client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Disconnected { reason: String },
    DataReceived(Sample),
    /// Inbound frame that could not be understood; the link stays up
    ProtocolError(ProtocolError),
}

/// Requests from the controller to the driver
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Subscribe(Vec<String>),
    /// Unsubscribe these keys, then close the transport
    Close(Vec<String>),
}

/// Controller-side handle to a live subscription
#[derive(Debug)]
pub struct SubscriptionHandle {
    commands: mpsc::UnboundedSender<ClientCommand>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// A handle with no driver behind it; commands land on the returned receiver
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ClientCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (
            Self {
                commands,
                task: None,
            },
            rx,
        )
    }

    /// Ask the remote to start pushing data for `api_keys`
    pub fn subscribe(&self, api_keys: &[String]) -> Result<(), StationError> {
        self.commands
            .send(ClientCommand::Subscribe(api_keys.to_vec()))
            .map_err(|_| StationError::Connection("subscription link is closed".to_string()))
    }

    /// Best-effort unsubscribe and close, bounded by `timeout`.
    ///
    /// Returns false when the driver had to be aborted; the transport is
    /// dropped either way.
    pub async fn close(mut self, api_keys: &[String], timeout: Duration) -> bool {
        // The driver may already be gone after a disconnect
        let _ = self.commands.send(ClientCommand::Close(api_keys.to_vec()));

        let Some(mut task) = self.task.take() else {
            return true;
        };
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(_) => true,
            Err(_) => {
                log::warn!("Remote did not acknowledge close within {:?}; dropping transport", timeout);
                task.abort();
                false
            }
        }
    }
}

/// An established subscription: the command handle plus the event stream
#[derive(Debug)]
pub struct Link {
    pub handle: SubscriptionHandle,
    pub events: mpsc::Receiver<ClientEvent>,
}

/// Something that can open a [`Link`]; lets the controller run without a network
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Link, StationError>;
}

/// Production connector for the Socket.IO realtime endpoint
#[derive(Debug, Clone)]
pub struct SocketIoConnector {
    endpoint: String,
    application_key: String,
    timeout: Duration,
}

impl SocketIoConnector {
    pub fn new(endpoint: &str, application_key: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            application_key: application_key.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl Connector for SocketIoConnector {
    async fn connect(&self) -> Result<Link, StationError> {
        connect(&self.endpoint, &self.application_key, self.timeout).await
    }
}

/// Open the realtime feed and start the driver task
pub async fn connect(
    endpoint: &str,
    application_key: &str,
    timeout: Duration,
) -> Result<Link, StationError> {
    let url = protocol::endpoint_url(endpoint, application_key);
    log::info!("Connecting to {}", protocol::redacted_url(endpoint));

    let (socket, handshake) = tokio::time::timeout(timeout, handshake(&url))
        .await
        .map_err(|_| {
            StationError::Connection(format!(
                "timed out after {}s connecting to {}",
                timeout.as_secs_f32(),
                endpoint
            ))
        })??;

    log::info!(
        "Realtime session {} open (ping interval {}ms, timeout {}ms)",
        handshake.sid,
        handshake.ping_interval,
        handshake.ping_timeout
    );

    let (event_tx, events) = mpsc::channel(EVENT_BUFFER);
    let (commands, command_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(drive(socket, handshake, command_rx, event_tx));

    Ok(Link {
        handle: SubscriptionHandle {
            commands,
            task: Some(task),
        },
        events,
    })
}

async fn handshake(url: &str) -> Result<(Socket, Handshake), StationError> {
    let (mut socket, _) = connect_async(url).await?;

    let handshake = loop {
        match next_packet(&mut socket).await? {
            Packet::Open(handshake) => break handshake,
            Packet::Noop => continue,
            other => {
                return Err(StationError::Connection(format!(
                    "expected open packet, got {:?}",
                    other
                )))
            }
        }
    };

    socket.send(Message::Text(protocol::CONNECT.into())).await?;

    loop {
        match next_packet(&mut socket).await? {
            Packet::Message(SocketPacket::Connect) => break,
            Packet::Message(SocketPacket::ConnectError(reason)) => {
                return Err(StationError::Connection(format!(
                    "server refused connection: {}",
                    reason
                )))
            }
            Packet::Ping => socket.send(Message::Text(protocol::PONG.into())).await?,
            Packet::Close => {
                return Err(StationError::Connection(
                    "server closed the session during handshake".to_string(),
                ))
            }
            _ => continue,
        }
    }

    Ok((socket, handshake))
}

/// Next text frame during the handshake, decoded
async fn next_packet(socket: &mut Socket) -> Result<Packet, StationError> {
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => {
                let s: &str = text.as_ref();
                return protocol::decode(s)
                    .map_err(|e| StationError::Connection(format!("handshake failed: {}", e)));
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(StationError::Connection(
                    "connection closed during handshake".to_string(),
                ))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

/// What the driver does after one inbound frame
enum Flow {
    Continue,
    Disconnected(String),
    /// Nobody is listening any more
    Stop,
}

async fn drive(
    mut socket: Socket,
    handshake: Handshake,
    mut commands: mpsc::UnboundedReceiver<ClientCommand>,
    events: mpsc::Sender<ClientEvent>,
) {
    let liveness = handshake.liveness_timeout();

    if events.send(ClientEvent::Connected).await.is_err() {
        let keys = await_close(&mut commands).await;
        close_gracefully(&mut socket, &keys).await;
        return;
    }

    let reason = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ClientCommand::Subscribe(keys)) => {
                    log::info!("Subscribing to {} station key(s)", keys.len());
                    let message = protocol::subscribe(&keys);
                    if let Err(e) = socket.send(Message::Text(message.into())).await {
                        break format!("failed to send subscribe: {}", e);
                    }
                }
                Some(ClientCommand::Close(keys)) => {
                    close_gracefully(&mut socket, &keys).await;
                    return;
                }
                None => {
                    close_gracefully(&mut socket, &[]).await;
                    return;
                }
            },
            frame = tokio::time::timeout(liveness, socket.next()) => match frame {
                Err(_) => break format!("no heartbeat for {:?}", liveness),
                Ok(None) => break "connection closed".to_string(),
                Ok(Some(Err(e))) => break e.to_string(),
                Ok(Some(Ok(Message::Close(_)))) => break "closed by server".to_string(),
                Ok(Some(Ok(Message::Text(text)))) => {
                    let s: &str = text.as_ref();
                    match handle_frame(s, &mut socket, &events).await {
                        Flow::Continue => {}
                        Flow::Disconnected(reason) => break reason,
                        Flow::Stop => {
                            let keys = await_close(&mut commands).await;
                            close_gracefully(&mut socket, &keys).await;
                            return;
                        }
                    }
                }
                Ok(Some(Ok(_))) => {}
            }
        }
    };

    log::warn!("Realtime feed disconnected: {}", reason);
    let _ = events.send(ClientEvent::Disconnected { reason }).await;
}

async fn handle_frame(
    frame: &str,
    socket: &mut Socket,
    events: &mpsc::Sender<ClientEvent>,
) -> Flow {
    let event = match protocol::decode(frame) {
        Ok(Packet::Ping) => {
            return match socket.send(Message::Text(protocol::PONG.into())).await {
                Ok(()) => Flow::Continue,
                Err(e) => Flow::Disconnected(format!("failed to answer heartbeat: {}", e)),
            };
        }
        Ok(Packet::Close) => return Flow::Disconnected("server closed the session".to_string()),
        Ok(Packet::Message(SocketPacket::Disconnect)) => {
            return Flow::Disconnected("server disconnected the client".to_string())
        }
        Ok(Packet::Message(SocketPacket::ConnectError(reason))) => {
            return Flow::Disconnected(format!("server error: {}", reason))
        }
        Ok(Packet::Message(SocketPacket::Event { name, payload })) => match name.as_str() {
            protocol::EVENT_DATA => match Sample::from_payload(&payload, Utc::now()) {
                Ok(sample) => ClientEvent::DataReceived(sample),
                Err(e) => ClientEvent::ProtocolError(e),
            },
            protocol::EVENT_SUBSCRIBED => {
                log::info!(
                    "Subscription confirmed for {} device(s)",
                    protocol::subscribed_devices(&payload)
                );
                return Flow::Continue;
            }
            other => {
                log::debug!("Ignoring event '{}'", other);
                return Flow::Continue;
            }
        },
        Ok(_) => return Flow::Continue,
        Err(e) => {
            log::warn!("Undecodable frame: {}", e);
            ClientEvent::ProtocolError(e)
        }
    };

    if events.send(event).await.is_err() {
        return Flow::Stop;
    }
    Flow::Continue
}

/// The event receiver is gone, which means the controller is shutting down.
/// Wait for its close request (or for the handle to be dropped) so the
/// unsubscribe still goes out.
async fn await_close(commands: &mut mpsc::UnboundedReceiver<ClientCommand>) -> Vec<String> {
    while let Some(command) = commands.recv().await {
        if let ClientCommand::Close(keys) = command {
            return keys;
        }
    }
    Vec::new()
}

/// Unsubscribe, leave the namespace and close the WebSocket, then wait for the
/// remote to finish the close handshake. Callers bound this with a timeout.
async fn close_gracefully(socket: &mut Socket, api_keys: &[String]) {
    if !api_keys.is_empty() {
        log::info!("Unsubscribing {} station key(s)", api_keys.len());
        let _ = socket
            .send(Message::Text(protocol::unsubscribe(api_keys).into()))
            .await;
    }
    let _ = socket.send(Message::Text(protocol::DISCONNECT.into())).await;
    let _ = socket.close(None).await;
    while let Some(Ok(_)) = socket.next().await {}
    log::debug!("Realtime transport closed");
}
