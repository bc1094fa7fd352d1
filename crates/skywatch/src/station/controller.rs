//! The station controller: one owned state, one loop.
//!
//! Client events, the render tick and the stop signal are multiplexed in a
//! single `select!`, so every frame is built from state that no other task
//! can touch mid-update.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::almanac::AlmanacCalculator;
use crate::client::{ClientEvent, Connector, Link, SubscriptionHandle};
use crate::config::{Config, ConfigError};
use crate::error::StationError;
use crate::sample::Sample;
use crate::trend::PressureTrendAnalyzer;

use super::frame::{ConnectionState, DisplayFrame, Notice};
use super::session::{SessionState, SessionTrigger};

/// Where frames go. The terminal implements this; tests record frames.
pub trait Surface {
    fn present(&mut self, frame: &DisplayFrame) -> Result<(), StationError>;
}

/// Owned dashboard state plus the rules for changing it
pub struct Station {
    analyzer: PressureTrendAnalyzer,
    calculator: AlmanacCalculator,
    api_keys: Vec<String>,
    render_interval: Duration,
    shutdown_timeout: Duration,

    sample: Option<Sample>,
    connection: ConnectionState,
    session: SessionState,
    protocol_notice: Option<String>,
    render_notice: Option<String>,
    disconnect_reason: Option<String>,
}

impl Station {
    pub fn new(
        calculator: AlmanacCalculator,
        analyzer: PressureTrendAnalyzer,
        api_keys: Vec<String>,
    ) -> Self {
        Self {
            analyzer,
            calculator,
            api_keys,
            render_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(1),
            sample: None,
            connection: ConnectionState::Disconnected,
            session: SessionState::Idle,
            protocol_notice: None,
            render_notice: None,
            disconnect_reason: None,
        }
    }

    /// Build from a validated config
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let calculator = AlmanacCalculator::new(config.observer_location()?);
        let analyzer = PressureTrendAnalyzer::from_config(&config.trend);
        Ok(Self::new(calculator, analyzer, config.api_keys.clone())
            .with_render_interval(config.render_interval())
            .with_shutdown_timeout(config.shutdown_timeout()))
    }

    pub fn with_render_interval(mut self, interval: Duration) -> Self {
        self.render_interval = interval;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn latest_sample(&self) -> Option<&Sample> {
        self.sample.as_ref()
    }

    pub fn analyzer(&self) -> &PressureTrendAnalyzer {
        &self.analyzer
    }

    fn transition(&mut self, trigger: SessionTrigger) {
        match self.session.next(trigger) {
            Some(next) => {
                log::info!("Session {} -> {} ({:?})", self.session, next, trigger);
                self.session = next;
            }
            None => log::debug!("Ignoring {:?} while {}", trigger, self.session),
        }
    }

    /// Mark the session as started; the connect attempt follows
    pub fn start(&mut self) {
        self.transition(SessionTrigger::Start);
    }

    /// Apply one client event. `link` carries the subscribe request on connect.
    pub fn handle_event(&mut self, event: ClientEvent, link: &SubscriptionHandle) {
        match event {
            ClientEvent::Connected => {
                if let Err(e) = link.subscribe(&self.api_keys) {
                    log::error!("Failed to send subscribe request: {}", e);
                }
                self.connection = ConnectionState::Connected;
                self.disconnect_reason = None;
                self.transition(SessionTrigger::Connected);
            }
            ClientEvent::Disconnected { reason } => {
                log::warn!("Realtime link lost: {}", reason);
                self.connection = ConnectionState::Disconnected;
                self.disconnect_reason = Some(reason);
                self.transition(SessionTrigger::Disconnected);
            }
            ClientEvent::DataReceived(sample) => {
                if let Some(pressure) = sample.pressure() {
                    self.analyzer.add_reading(pressure, sample.received_at);
                }
                log::debug!("Sample with {} reading(s)", sample.len());
                self.sample = Some(sample);
                self.protocol_notice = None;
            }
            ClientEvent::ProtocolError(err) => {
                log::warn!("Dropping inbound payload: {}", err);
                self.protocol_notice = Some(err.to_string());
            }
        }
    }

    /// Compose the frame for `now`; the almanac is always recomputed
    pub fn frame(&mut self, now: DateTime<Utc>) -> DisplayFrame {
        let trend = self.analyzer.get_trend(now);
        let almanac = self.calculator.get_almanac(now);

        let notice = if let Some(msg) = &self.render_notice {
            Some(Notice::Render(msg.clone()))
        } else if let Some(msg) = &self.protocol_notice {
            Some(Notice::Protocol(msg.clone()))
        } else {
            self.disconnect_reason.clone().map(Notice::Disconnected)
        };

        DisplayFrame {
            timestamp: now.with_timezone(&self.calculator.observer().timezone()),
            sample: self.sample.clone(),
            trend,
            almanac,
            connection: self.connection,
            session: self.session,
            notice,
        }
    }

    /// Build and present one frame. Render failures are kept for the next frame.
    pub fn render<S: Surface + ?Sized>(&mut self, surface: &mut S, now: DateTime<Utc>) {
        let frame = self.frame(now);
        match surface.present(&frame) {
            Ok(()) => {
                if self.render_notice.take().is_some() {
                    log::info!("Rendering recovered");
                }
            }
            Err(e) => {
                log::error!("Failed to render frame: {}", e);
                self.render_notice = Some(match e {
                    StationError::Render(msg) => msg,
                    other => other.to_string(),
                });
            }
        }
    }

    /// Run the session until `shutdown` flips to true.
    ///
    /// Only a failed connect returns an error; everything after that is
    /// shown inline and the loop keeps going.
    pub async fn run<C, S>(
        &mut self,
        connector: &C,
        surface: &mut S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), StationError>
    where
        C: Connector + ?Sized,
        S: Surface + ?Sized,
    {
        self.start();
        self.render(surface, Utc::now());

        let link = tokio::select! {
            result = connector.connect() => match result {
                Ok(link) => link,
                Err(e) => {
                    log::error!("Connect failed: {}", e);
                    self.transition(SessionTrigger::Disconnected);
                    self.transition(SessionTrigger::Stop);
                    self.transition(SessionTrigger::Closed);
                    return Err(e);
                }
            },
            _ = stop_requested(&mut shutdown) => {
                log::info!("Stop requested while connecting");
                self.transition(SessionTrigger::Stop);
                self.transition(SessionTrigger::Closed);
                return Ok(());
            }
        };

        let Link {
            handle,
            mut events,
        } = link;

        let mut ticker = tokio::time::interval(self.render_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut events_open = true;

        loop {
            tokio::select! {
                _ = stop_requested(&mut shutdown) => break,
                _ = ticker.tick() => self.render(surface, Utc::now()),
                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event, &handle),
                    None => {
                        events_open = false;
                        if self.connection == ConnectionState::Connected {
                            self.handle_event(
                                ClientEvent::Disconnected {
                                    reason: "event stream ended".to_string(),
                                },
                                &handle,
                            );
                        }
                    }
                },
            }
        }

        // Unblocks a driver waiting on a full event buffer
        drop(events);
        self.shutdown(handle, surface).await;
        Ok(())
    }

    async fn shutdown<S: Surface + ?Sized>(&mut self, handle: SubscriptionHandle, surface: &mut S) {
        self.transition(SessionTrigger::Stop);
        self.render(surface, Utc::now());

        if handle.close(&self.api_keys, self.shutdown_timeout).await {
            log::info!("Realtime link closed");
        } else {
            log::warn!(
                "Close not acknowledged within {:?}; transport dropped",
                self.shutdown_timeout
            );
        }
        self.connection = ConnectionState::Disconnected;
        self.transition(SessionTrigger::Closed);
    }
}

/// Resolves once the flag is true. A dropped sender never resolves.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::almanac::ObserverLocation;
    use crate::error::ProtocolError;
    use crate::sample::fields;
    use crate::trend::Trend;
    use chrono::TimeZone;

    fn station() -> Station {
        let observer = ObserverLocation::new(40.7128, -74.006, chrono_tz::America::New_York).unwrap();
        Station::new(
            AlmanacCalculator::new(observer),
            PressureTrendAnalyzer::new(3.0, 4, 500),
            vec!["key".to_string()],
        )
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn connected_sends_subscribe_and_moves_to_subscribed() {
        let mut station = station();
        let (handle, mut commands) = SubscriptionHandle::channel();
        station.start();
        station.handle_event(ClientEvent::Connected, &handle);

        assert_eq!(station.session(), SessionState::Subscribed);
        assert_eq!(station.connection(), ConnectionState::Connected);
        assert_eq!(
            commands.try_recv().unwrap(),
            crate::client::ClientCommand::Subscribe(vec!["key".to_string()])
        );
    }

    #[test]
    fn protocol_error_keeps_sample_until_next_valid_one() {
        let mut station = station();
        let (handle, _commands) = SubscriptionHandle::channel();
        station.start();
        station.handle_event(ClientEvent::Connected, &handle);

        let sample = Sample::new(t0()).with(fields::TEMPERATURE, 61.0);
        station.handle_event(ClientEvent::DataReceived(sample.clone()), &handle);
        station.handle_event(
            ClientEvent::ProtocolError(ProtocolError::Payload("bad".into())),
            &handle,
        );

        let frame = station.frame(t0());
        assert_eq!(frame.sample.as_ref(), Some(&sample));
        assert!(matches!(frame.notice, Some(Notice::Protocol(_))));

        station.handle_event(
            ClientEvent::DataReceived(Sample::new(t0()).with(fields::TEMPERATURE, 62.0)),
            &handle,
        );
        let frame = station.frame(t0());
        assert_eq!(frame.notice, None);
        assert_eq!(frame.reading(fields::TEMPERATURE), Some(62.0));
    }

    #[test]
    fn only_pressure_samples_feed_the_trend() {
        let mut station = station();
        let (handle, _commands) = SubscriptionHandle::channel();
        for i in 0..4 {
            let at = t0() + chrono::Duration::minutes(30 * i);
            station.handle_event(
                ClientEvent::DataReceived(Sample::new(at).with(fields::TEMPERATURE, 60.0)),
                &handle,
            );
        }
        assert_eq!(station.analyzer().history().len(), 0);
        assert_eq!(station.frame(t0()).trend.trend, Trend::InsufficientData);
    }

    struct Failing;

    impl Surface for Failing {
        fn present(&mut self, _frame: &DisplayFrame) -> Result<(), StationError> {
            Err(StationError::Render("terminal gone".into()))
        }
    }

    struct Accepting(Vec<DisplayFrame>);

    impl Surface for Accepting {
        fn present(&mut self, frame: &DisplayFrame) -> Result<(), StationError> {
            self.0.push(frame.clone());
            Ok(())
        }
    }

    #[test]
    fn render_error_shows_until_a_frame_presents() {
        let mut station = station();
        station.render(&mut Failing, t0());

        let mut ok = Accepting(Vec::new());
        station.render(&mut ok, t0());
        station.render(&mut ok, t0());
        assert_eq!(ok.0[0].notice, Some(Notice::Render("terminal gone".into())));
        assert_eq!(ok.0[1].notice, None);
    }
}
