//! Unified error handling for the resilient device client.
//!
//! This module defines `DeviceError`, the single error type returned by all
//! fallible operations in this crate. Variants fall into three categories:
//!
//! **Configuration errors** (detected synchronously at construction, before
//! any connection attempt):
//! - `InvalidReconnectTiming`: reconnect delay relationships are inconsistent
//! - `InvalidOfflineQueueing`: offline queue parameters are invalid
//! - `ConfigError`: field-level validation failures in `DeviceOptions`
//!
//! **Capacity errors** (local, synchronous, leave the state machine intact):
//! - `SubscriptionQueueFull`: the offline subscription-request queue is at
//!   its fixed cap; the request was rejected, not silently dropped
//!
//! **Runtime errors** (transport and plumbing):
//! - `ClientTransfer`: the transport-facing client refused a command hand-off
//! - `KernelStopped`: the device kernel task is no longer running
//!
//! Capacity and configuration errors never put the lifecycle state machine
//! into an inconsistent state; transport failures are re-emitted upward as
//! events and never crash the core.

use thiserror::Error;

/// The unified error type for resilient device operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Reconnect timing parameters are inconsistent.
    ///
    /// Raised at construction when any of these constraints is violated:
    /// - base reconnect delay must be greater than zero
    /// - maximum reconnect delay must be >= the base delay
    /// - minimum stable connection duration must be >= the base delay
    ///
    /// Fatal: no connection is attempted with an invalid timing profile.
    #[error("Invalid reconnect timing: {0}")]
    InvalidReconnectTiming(String),

    /// Offline queueing parameters are invalid.
    ///
    /// Currently raised for an unrecognized drop behavior when options are
    /// deserialized from text formats. Programmatic construction uses the
    /// `DropBehavior` enum and cannot hit this.
    #[error("Invalid offline queueing parameters: {0}")]
    InvalidOfflineQueueing(String),

    /// The offline subscription-request queue is full.
    ///
    /// The queue has a fixed cap (see `SUBSCRIPTION_QUEUE_LIMIT`); requests
    /// beyond it are rejected and surfaced to the caller rather than being
    /// silently dropped. The `usize` field carries the cap.
    ///
    /// Recovery: wait for a reconnect (the queue drains on its own) or
    /// reduce offline subscription churn.
    #[error("Maximum queued offline subscription requests reached ({0})")]
    SubscriptionQueueFull(usize),

    /// Field-level validation of `DeviceOptions` failed.
    ///
    /// Produced by the `validator` crate; the message names the offending
    /// field and constraint. Fatal at construction.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] validator::ValidationErrors),

    /// The transport-facing client refused a command hand-off.
    ///
    /// This is a local failure (internal request channel full or client shut
    /// down), not a broker error. Delivery beyond hand-off is the
    /// transport's concern.
    #[error("Client transfer error: {0}")]
    ClientTransfer(#[from] rumqttc::ClientError),

    /// The device kernel task has stopped and can no longer accept commands.
    ///
    /// Seen after `end()` or if the kernel task panicked. The client handle
    /// is unusable from this point; build a new one.
    #[error("Device kernel is not running")]
    KernelStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_reconnect_timing_display() {
        let err = DeviceError::InvalidReconnectTiming("maximum < base".into());
        assert_eq!(err.to_string(), "Invalid reconnect timing: maximum < base");
    }

    #[test]
    fn test_subscription_queue_full_display() {
        let err = DeviceError::SubscriptionQueueFull(50);
        assert!(err.to_string().contains("50"));
        assert!(err.to_string().contains("offline subscription"));
    }

    #[test]
    fn test_kernel_stopped_display() {
        let err = DeviceError::KernelStopped;
        assert_eq!(err.to_string(), "Device kernel is not running");
    }

    #[test]
    fn test_device_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(DeviceError::KernelStopped);
        assert!(!err.to_string().is_empty());
    }
}
