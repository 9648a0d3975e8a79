//! Service state definitions.

use serde::Serialize;

/// Closing service operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    /// Store connecting, migrations running.
    Starting,
    /// Accepting requests.
    Running,
    /// Draining in-flight requests, rejecting new writes.
    ShuttingDown,
    /// Stopped.
    Stopped,
}

impl ServiceState {
    /// Check if the service is accepting new requests.
    pub fn accepts_requests(&self) -> bool {
        matches!(self, ServiceState::Running)
    }

    /// Check if the service is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Starting => "STARTING",
            ServiceState::Running => "RUNNING",
            ServiceState::ShuttingDown => "SHUTTING_DOWN",
            ServiceState::Stopped => "STOPPED",
        }
    }
}
