//! Resilient MQTT client layer for devices on unreliable networks.
//!
//! This crate wraps a rumqttc connection with the behaviors an
//! intermittently connected device needs but a plain MQTT client does not
//! provide:
//!
//! - **Offline operation queueing.** Publishes and subscription changes
//!   issued while disconnected are captured in bounded queues and replayed
//!   after reconnecting, in order, one item per drain tick. The publish
//!   queue's size and overflow policy (drop oldest or reject newest) are
//!   configurable; subscription requests have a fixed cap and overflow is
//!   surfaced as an error.
//! - **Auto-resubscription.** Active subscriptions are cached and re-issued
//!   after every reconnect, before any queued operation replays, so no
//!   messages on previously subscribed topics are missed because the broker
//!   forgot the session.
//! - **Paced reconnection.** The retry delay doubles on every failed
//!   attempt up to a ceiling, and resets to its base value only after a
//!   connection has stayed up past a stability threshold. A flapping
//!   connection keeps backing off instead of hammering the broker.
//! - **Lifecycle observability.** Connection state (`Inactive`,
//!   `Established`, `Stable`) is published on a watch channel, and
//!   connects, closes, offline transitions, reconnect attempts, errors and
//!   inbound messages are re-emitted as [`DeviceEvent`]s on a broadcast
//!   channel.
//!
//! All of this runs in a single kernel task that owns the state machine and
//! the rumqttc event loop; [`DeviceClient`] is a cheap cloneable handle to
//! it. Methods hand commands to the kernel and never block on network I/O.
//!
//! ```ignore
//! use mqtt_resilient::{DeviceClient, DeviceOptions};
//!
//! let client = DeviceClient::connect(DeviceOptions {
//!     host: "broker.example.com".into(),
//!     offline_queue_max_size: 100,
//!     ..Default::default()
//! })?;
//!
//! // Queued if offline, replayed after reconnect.
//! client.publish("telemetry/temp", b"21.5".to_vec()).await?;
//! ```

pub mod backoff;
pub mod config;
mod connection;
pub mod device;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod queue;
pub mod request;
pub mod state;
pub mod subscriptions;
pub mod transport;

pub use config::DeviceOptions;
pub use connection::QueueStats;
pub use device::DeviceClient;
pub use error::DeviceError;
pub use event::DeviceEvent;
pub use queue::DropBehavior;
pub use state::ConnectionState;
pub use transport::{PublishOptions, SubscribeOptions, TransportClient};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DeviceError>;
