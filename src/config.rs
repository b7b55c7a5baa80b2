//! Configuration for the resilient device client.
//!
//! `DeviceOptions` supports serde deserialization (TOML, JSON, ...) with
//! every field defaulted, plus field-level validation via the `validator`
//! crate. Validation failures and inconsistent reconnect timing are fatal:
//! they surface at construction, before any connection attempt.
//!
//! # Examples
//!
//! ```ignore
//! // Programmatic, mostly defaults
//! let options = DeviceOptions {
//!     host: "broker.example.com".into(),
//!     port: 1883,
//!     offline_queue_max_size: 100,
//!     ..Default::default()
//! };
//!
//! // From TOML
//! let options: DeviceOptions = toml::from_str(r#"
//!     host = "broker.example.com"
//!     port = 1883
//!     offline_queue_drop_behavior = "newest"
//!     base_reconnect_ms = 2000
//! "#)?;
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::queue::DropBehavior;

/// Default keepalive interval in seconds when the caller does not choose one.
pub const DEFAULT_KEEPALIVE_SECS: u64 = 300;

/// Default drain tick interval in milliseconds.
pub const DEFAULT_DRAIN_INTERVAL_MS: u64 = 250;

/// Default base reconnect delay in milliseconds.
pub const DEFAULT_BASE_RECONNECT_MS: u64 = 1_000;

/// Default minimum continuous connection time, in milliseconds, before the
/// reconnect delay resets to its base value.
pub const DEFAULT_MINIMUM_CONNECTION_MS: u64 = 20_000;

/// Default maximum reconnect delay in milliseconds.
pub const DEFAULT_MAXIMUM_RECONNECT_MS: u64 = 128_000;

/// Connection and resilience options for a device client.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DeviceOptions {
    /// Broker hostname or IP address.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Host must be between 1 and 255 characters"
    ))]
    pub host: String,

    /// Broker port.
    #[validate(range(min = 1, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Client identifier. Empty means a UUID is generated at build time.
    #[validate(length(max = 36, message = "Client ID must not exceed 36 characters"))]
    pub client_id: String,

    /// Keepalive interval in seconds.
    #[validate(range(
        min = 5,
        max = 3600,
        message = "Keep alive must be between 5 and 3600 seconds"
    ))]
    pub keep_alive: u64,

    /// Whether to request a clean session from the broker.
    pub clean_session: bool,

    /// Buffer publish/subscribe/unsubscribe operations issued while offline
    /// and replay them on reconnect. When disabled, publishes issued while
    /// offline are silently discarded (fire-and-forget).
    pub offline_queueing: bool,

    /// Maximum size of the offline publish queue. 0 means unbounded.
    pub offline_queue_max_size: usize,

    /// Overflow policy for the offline publish queue.
    pub offline_queue_drop_behavior: DropBehavior,

    /// Re-issue previously active subscriptions after a reconnect. When
    /// disabled, subscribe/unsubscribe never touch the subscription cache
    /// and nothing is resubscribed.
    pub auto_resubscribe: bool,

    /// Interval between drain ticks while replaying queued operations, in
    /// milliseconds. Exactly one queued item is replayed per tick.
    #[validate(range(min = 1, message = "Drain interval must be at least 1 ms"))]
    pub drain_interval_ms: u64,

    /// Delay before the first reconnect attempt, in milliseconds. Doubles on
    /// every retry up to `maximum_reconnect_ms`.
    pub base_reconnect_ms: u64,

    /// Continuous connection time, in milliseconds, required before the
    /// reconnect delay resets to `base_reconnect_ms`.
    pub minimum_connection_ms: u64,

    /// Ceiling for the reconnect delay, in milliseconds.
    pub maximum_reconnect_ms: u64,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: String::new(),
            keep_alive: DEFAULT_KEEPALIVE_SECS,
            clean_session: true,
            offline_queueing: true,
            offline_queue_max_size: 0,
            offline_queue_drop_behavior: DropBehavior::Oldest,
            auto_resubscribe: true,
            drain_interval_ms: DEFAULT_DRAIN_INTERVAL_MS,
            base_reconnect_ms: DEFAULT_BASE_RECONNECT_MS,
            minimum_connection_ms: DEFAULT_MINIMUM_CONNECTION_MS,
            maximum_reconnect_ms: DEFAULT_MAXIMUM_RECONNECT_MS,
        }
    }
}

impl DeviceOptions {
    /// Drain tick interval as a `Duration`.
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    /// Base reconnect delay as a `Duration`.
    pub fn base_reconnect(&self) -> Duration {
        Duration::from_millis(self.base_reconnect_ms)
    }

    /// Minimum stable connection time as a `Duration`.
    pub fn minimum_connection(&self) -> Duration {
        Duration::from_millis(self.minimum_connection_ms)
    }

    /// Maximum reconnect delay as a `Duration`.
    pub fn maximum_reconnect(&self) -> Duration {
        Duration::from_millis(self.maximum_reconnect_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let options = DeviceOptions::default();
        assert!(options.offline_queueing);
        assert_eq!(options.offline_queue_max_size, 0);
        assert_eq!(options.offline_queue_drop_behavior, DropBehavior::Oldest);
        assert!(options.auto_resubscribe);
        assert_eq!(options.drain_interval(), Duration::from_millis(250));
        assert_eq!(options.base_reconnect(), Duration::from_millis(1_000));
        assert_eq!(options.minimum_connection(), Duration::from_millis(20_000));
        assert_eq!(options.maximum_reconnect(), Duration::from_millis(128_000));
        assert_eq!(options.keep_alive, 300);
    }

    #[test]
    fn test_defaults_validate() {
        assert!(DeviceOptions::default().validate().is_ok());
    }

    #[test]
    fn test_empty_host_fails_validation() {
        let options = DeviceOptions {
            host: String::new(),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_from_toml_with_overrides() {
        let options: DeviceOptions = toml::from_str(
            r#"
            host = "broker.example.com"
            port = 8883
            offline_queue_max_size = 10
            offline_queue_drop_behavior = "newest"
            auto_resubscribe = false
            base_reconnect_ms = 2000
            maximum_reconnect_ms = 64000
            "#,
        )
        .unwrap();

        assert_eq!(options.host, "broker.example.com");
        assert_eq!(options.port, 8883);
        assert_eq!(options.offline_queue_max_size, 10);
        assert_eq!(options.offline_queue_drop_behavior, DropBehavior::Newest);
        assert!(!options.auto_resubscribe);
        assert_eq!(options.base_reconnect(), Duration::from_millis(2_000));
        // Untouched fields keep their defaults.
        assert!(options.offline_queueing);
        assert_eq!(options.drain_interval_ms, DEFAULT_DRAIN_INTERVAL_MS);
    }
}
