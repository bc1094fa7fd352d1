//! Session lifecycle of the station controller.

use std::fmt;

/// Where the controller is in its single connect-subscribe-stop lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Subscribed,
    Disconnected,
    ShuttingDown,
    Terminated,
}

/// Inputs that move the session forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTrigger {
    Start,
    /// Link established and subscribe request sent
    Connected,
    Disconnected,
    /// External stop signal
    Stop,
    /// Close sequence finished or timed out
    Closed,
}

impl SessionState {
    /// Apply `trigger`; `None` means the trigger is not valid in this state.
    ///
    /// There is deliberately no path from `Disconnected` back to `Connecting`.
    pub fn next(self, trigger: SessionTrigger) -> Option<SessionState> {
        use SessionState::*;
        use SessionTrigger as T;

        match (self, trigger) {
            (Idle, T::Start) => Some(Connecting),
            (Connecting, T::Connected) => Some(Subscribed),
            (Connecting, T::Disconnected) | (Subscribed, T::Disconnected) => Some(Disconnected),
            (Terminated, T::Stop) | (ShuttingDown, T::Stop) => None,
            (_, T::Stop) => Some(ShuttingDown),
            (ShuttingDown, T::Closed) => Some(Terminated),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Connecting => "Connecting",
            SessionState::Subscribed => "Subscribed",
            SessionState::Disconnected => "Disconnected",
            SessionState::ShuttingDown => "Shutting down",
            SessionState::Terminated => "Terminated",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Terminated
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
