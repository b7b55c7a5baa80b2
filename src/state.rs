//! Connection state tracking for the resilient device client.
//!
//! The connection moves through three states, driven exclusively by events
//! raised by the transport-facing client — the state machine never polls:
//!
//! ```text
//! Inactive ──(connected)──> Established ──(stable timer)──> Stable
//!     ^                          │                             │
//!     └───────(disconnected)─────┴─────────(disconnected)──────┘
//! ```
//!
//! `Inactive` may coexist with the transport's own retry loop; retrying is
//! not a distinct state here, and drain-in-progress is an orthogonal flag on
//! the lifecycle machine rather than a fourth state.

use std::fmt;

/// Operational state of the device connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live transport connection. Operations issued now are queued (or
    /// discarded, depending on the offline queueing configuration).
    Inactive,

    /// The transport just connected (CONNACK received); the connection has
    /// not yet been held open long enough to be considered stable, so the
    /// reconnect backoff is not reset yet.
    Established,

    /// The connection has remained open continuously past the stability
    /// threshold; the reconnect backoff has been reset to its base delay.
    Stable,
}

impl ConnectionState {
    /// Returns a short static identifier, useful for logging and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Inactive => "Inactive",
            ConnectionState::Established => "Established",
            ConnectionState::Stable => "Stable",
        }
    }

    /// True if a live transport connection exists (`Established` or
    /// `Stable`), i.e. operations forward immediately rather than queue.
    pub fn is_connected(&self) -> bool {
        !matches!(self, ConnectionState::Inactive)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_as_str() {
        assert_eq!(ConnectionState::Inactive.as_str(), "Inactive");
        assert_eq!(ConnectionState::Established.as_str(), "Established");
        assert_eq!(ConnectionState::Stable.as_str(), "Stable");
    }

    #[test]
    fn test_state_display_matches_as_str() {
        assert_eq!(ConnectionState::Stable.to_string(), "Stable");
        assert_eq!(ConnectionState::Inactive.to_string(), "Inactive");
    }

    #[test]
    fn test_is_connected() {
        assert!(!ConnectionState::Inactive.is_connected());
        assert!(ConnectionState::Established.is_connected());
        assert!(ConnectionState::Stable.is_connected());
    }
}
