//! End-to-end controller scenarios.
//!
//! A scripted connector stands in for the realtime feed and a recording
//! surface captures every frame the controller presents.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use skywatch::almanac::{AlmanacCalculator, ObserverLocation};
use skywatch::client::{ClientCommand, ClientEvent, Connector, Link, SubscriptionHandle};
use skywatch::error::{ProtocolError, StationError};
use skywatch::sample::{fields, Sample};
use skywatch::station::{ConnectionState, DisplayFrame, Notice, SessionState, Station, Surface};
use skywatch::trend::{PressureTrendAnalyzer, Trend};
use tokio::sync::{mpsc, watch};

// ── Test doubles ─────────────────────────────────────────────────────

/// Hands out one prepared link, or fails, or never answers
enum ScriptedConnector {
    Ready(Mutex<Option<Link>>),
    Refuse,
    Hang,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Link, StationError> {
        match self {
            ScriptedConnector::Ready(link) => link
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| StationError::Connection("already connected once".into())),
            ScriptedConnector::Refuse => {
                Err(StationError::Connection("server refused connection".into()))
            }
            ScriptedConnector::Hang => std::future::pending().await,
        }
    }
}

#[derive(Clone, Default)]
struct RecordingSurface {
    frames: Arc<Mutex<Vec<DisplayFrame>>>,
}

impl Surface for RecordingSurface {
    fn present(&mut self, frame: &DisplayFrame) -> Result<(), StationError> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }
}

impl RecordingSurface {
    fn frames(&self) -> Vec<DisplayFrame> {
        self.frames.lock().unwrap().clone()
    }

    /// Poll until some recorded frame matches, or give up after two seconds
    async fn wait_for(&self, what: &str, pred: impl Fn(&DisplayFrame) -> bool) -> DisplayFrame {
        for _ in 0..400 {
            if let Some(frame) = self.frames().into_iter().rev().find(|f| pred(f)) {
                return frame;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no frame matched: {}", what);
    }
}

// ── Harness ──────────────────────────────────────────────────────────

fn station(min_samples: usize) -> Station {
    let observer = ObserverLocation::new(51.5074, -0.1278, chrono_tz::Europe::London).unwrap();
    Station::new(
        AlmanacCalculator::new(observer),
        PressureTrendAnalyzer::new(3.0, min_samples, 500),
        vec!["station-key".to_string()],
    )
    .with_render_interval(Duration::from_millis(10))
    .with_shutdown_timeout(Duration::from_millis(50))
}

struct Session {
    events: mpsc::Sender<ClientEvent>,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
    surface: RecordingSurface,
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<(Station, Result<(), StationError>)>,
}

fn start_session() -> Session {
    let (events, event_rx) = mpsc::channel(16);
    let (handle, commands) = SubscriptionHandle::channel();
    let connector = ScriptedConnector::Ready(Mutex::new(Some(Link {
        handle,
        events: event_rx,
    })));
    let surface = RecordingSurface::default();
    let (shutdown, shutdown_rx) = watch::channel(false);

    let mut station = station(6);
    let mut run_surface = surface.clone();
    let task = tokio::spawn(async move {
        let result = station.run(&connector, &mut run_surface, shutdown_rx).await;
        (station, result)
    });

    Session {
        events,
        commands,
        surface,
        shutdown,
        task,
    }
}

fn sample(at: DateTime<Utc>) -> Sample {
    Sample::new(at)
        .with(fields::TEMPERATURE, 58.4)
        .with(fields::HUMIDITY, 71.0)
        .with(fields::PRESSURE, 29.87)
}

// ── Scenarios ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_keeps_last_sample() {
    let mut session = start_session();
    let reading = sample(Utc::now());

    session.events.send(ClientEvent::Connected).await.unwrap();
    session
        .events
        .send(ClientEvent::DataReceived(reading.clone()))
        .await
        .unwrap();
    session
        .surface
        .wait_for("sample shown", |f| f.sample.is_some())
        .await;

    session
        .events
        .send(ClientEvent::Disconnected {
            reason: "closed by server".into(),
        })
        .await
        .unwrap();
    let frame = session
        .surface
        .wait_for("disconnected frame", |f| {
            f.session == SessionState::Disconnected
        })
        .await;

    assert_eq!(frame.connection, ConnectionState::Disconnected);
    assert_eq!(frame.sample.as_ref(), Some(&reading));
    assert_eq!(
        frame.notice,
        Some(Notice::Disconnected("closed by server".into()))
    );

    session.shutdown.send(true).unwrap();
    let (station, result) = session.task.await.unwrap();
    assert!(result.is_ok());
    assert_eq!(station.session(), SessionState::Terminated);

    // Subscribe on connect, unsubscribe on the way out
    let keys = vec!["station-key".to_string()];
    assert_eq!(
        session.commands.recv().await,
        Some(ClientCommand::Subscribe(keys.clone()))
    );
    assert_eq!(
        session.commands.recv().await,
        Some(ClientCommand::Close(keys))
    );
}

#[tokio::test]
async fn test_frames_keep_ticking_without_data() {
    let session = start_session();
    session.events.send(ClientEvent::Connected).await.unwrap();

    let first = session
        .surface
        .wait_for("subscribed frame", |f| f.session == SessionState::Subscribed)
        .await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    let later = session.surface.frames().last().cloned().unwrap();

    assert!(later.timestamp > first.timestamp);
    assert!(later.sample.is_none());
    assert!(later.is_connected());

    session.shutdown.send(true).unwrap();
    let (_, result) = session.task.await.unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_protocol_error_is_inline_and_non_fatal() {
    let session = start_session();
    let reading = sample(Utc::now());

    session.events.send(ClientEvent::Connected).await.unwrap();
    session
        .events
        .send(ClientEvent::DataReceived(reading.clone()))
        .await
        .unwrap();
    session
        .events
        .send(ClientEvent::ProtocolError(ProtocolError::Payload(
            "data payload must be an object, got an array".into(),
        )))
        .await
        .unwrap();

    let frame = session
        .surface
        .wait_for("protocol notice", |f| {
            matches!(f.notice, Some(Notice::Protocol(_)))
        })
        .await;
    assert_eq!(frame.sample.as_ref(), Some(&reading));
    assert_eq!(frame.session, SessionState::Subscribed);

    session.shutdown.send(true).unwrap();
    let (station, result) = session.task.await.unwrap();
    assert!(result.is_ok());
    assert_eq!(station.session(), SessionState::Terminated);
}

#[tokio::test]
async fn test_connect_failure_is_fatal() {
    let mut station = station(6);
    let mut surface = RecordingSurface::default();
    let (_shutdown, shutdown_rx) = watch::channel(false);

    let err = station
        .run(&ScriptedConnector::Refuse, &mut surface, shutdown_rx)
        .await
        .unwrap_err();

    assert!(matches!(err, StationError::Connection(_)));
    assert_eq!(station.session(), SessionState::Terminated);
    assert_eq!(station.connection(), ConnectionState::Disconnected);
    // The connecting frame was shown before the attempt
    assert_eq!(surface.frames()[0].session, SessionState::Connecting);
}

#[tokio::test]
async fn test_stop_interrupts_connect() {
    let mut station = station(6);
    let mut surface = RecordingSurface::default();
    let (shutdown, shutdown_rx) = watch::channel(false);

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.send(true).unwrap();
        shutdown
    });

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        station.run(&ScriptedConnector::Hang, &mut surface, shutdown_rx),
    )
    .await
    .expect("stop signal did not interrupt the connect");

    assert!(result.is_ok());
    assert_eq!(station.session(), SessionState::Terminated);
    drop(stopper.await.unwrap());
}

#[test]
fn test_hourly_falling_series() {
    let t0 = Utc.with_ymd_and_hms(2024, 11, 5, 6, 0, 0).unwrap();
    let pressures = [30.10, 30.05, 30.00, 29.95, 29.90, 29.85];
    let feed = |station: &mut Station| {
        let (handle, _commands) = SubscriptionHandle::channel();
        station.start();
        station.handle_event(ClientEvent::Connected, &handle);
        for (hour, pressure) in pressures.iter().enumerate() {
            let at = t0 + chrono::Duration::hours(hour as i64);
            station.handle_event(
                ClientEvent::DataReceived(Sample::new(at).with(fields::PRESSURE, *pressure)),
                &handle,
            );
        }
    };
    let now = t0 + chrono::Duration::hours(5);

    // The 3h window keeps t0+2h..t0+5h: four readings
    let mut strict = station(6);
    feed(&mut strict);
    let frame = strict.frame(now);
    assert_eq!(frame.trend.trend, Trend::InsufficientData);
    assert_eq!(strict.analyzer().history().len(), 4);

    let mut relaxed = station(4);
    feed(&mut relaxed);
    let frame = relaxed.frame(now);
    assert_eq!(frame.trend.trend, Trend::Falling);
    assert!((frame.trend.rate + 0.05).abs() < 1e-9, "rate {}", frame.trend.rate);
    assert_eq!(frame.reading(fields::PRESSURE), Some(29.85));
}
