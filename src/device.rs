//! Public facade for the resilient device client.
//!
//! `DeviceClient::connect` validates the options, builds the rumqttc client
//! and event loop, and spawns the kernel task that owns all mutable state.
//! The handle itself is cheap to clone and every method is a message to the
//! kernel, so calls never contend on a lock and never wait on network I/O.
//!
//! The connection is managed for the caller from here on: rumqttc retries
//! on its own, paced by the kernel's escalating backoff, and the kernel
//! replays queued work after every reconnect. Dropping every handle stops
//! the kernel.
//!
//! # Examples
//!
//! ```ignore
//! let client = DeviceClient::connect(DeviceOptions {
//!     host: "broker.example.com".into(),
//!     ..Default::default()
//! })?;
//!
//! client.subscribe(vec!["commands/#".into()], SubscribeOptions::default()).await?;
//! client.publish("telemetry/temp", b"21.5".to_vec()).await?;
//!
//! let mut events = client.events();
//! while let Ok(event) = events.recv().await {
//!     if let DeviceEvent::Message { topic, payload } = event {
//!         println!("{topic}: {payload:?}");
//!     }
//! }
//! ```

use rumqttc::{AsyncClient, MqttOptions};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::config::DeviceOptions;
use crate::connection::{Command, DeviceKernel, QueueStats};
use crate::error::DeviceError;
use crate::event::DeviceEvent;
use crate::lifecycle::ConnectionLifecycle;
use crate::request::CompletionHandler;
use crate::state::ConnectionState;
use crate::transport::{PublishOptions, SubscribeOptions};

const COMMAND_CHANNEL_CAPACITY: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 128;
const ENGINE_REQUEST_CAPACITY: usize = 32;

/// Cloneable handle to a resilient MQTT device connection.
#[derive(Clone, Debug)]
pub struct DeviceClient {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<DeviceEvent>,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl DeviceClient {
    /// Validates the options, connects in the background and returns a
    /// handle immediately. Operations issued before the first CONNACK are
    /// queued according to the offline-queueing options.
    ///
    /// # Errors
    /// Fails synchronously on invalid options (`ConfigError`,
    /// `InvalidReconnectTiming`); no connection is attempted then.
    pub fn connect(options: DeviceOptions) -> Result<Self, DeviceError> {
        options.validate()?;

        let client_id = if options.client_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            options.client_id.clone()
        };

        let mut mqtt_options = MqttOptions::new(&client_id, &options.host, options.port);
        mqtt_options
            .set_keep_alive(std::time::Duration::from_secs(options.keep_alive))
            .set_clean_session(options.clean_session);

        let (client, event_loop) = AsyncClient::new(mqtt_options, ENGINE_REQUEST_CAPACITY);
        let core = ConnectionLifecycle::new(client, &options)?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Inactive);
        let cancel = CancellationToken::new();

        info!(host = %options.host, port = options.port, %client_id, "starting device client");

        let kernel = DeviceKernel::new(
            core,
            event_loop,
            command_rx,
            event_tx.clone(),
            state_tx,
            cancel.clone(),
            options.drain_interval(),
        );
        tokio::spawn(kernel.run());

        Ok(Self {
            commands: command_tx,
            events: event_tx,
            state_rx,
            cancel,
        })
    }

    /// Publishes with default options (QoS 0, not retained), fire and
    /// forget. Queued while offline or draining, per the offline-queueing
    /// options.
    pub async fn publish(&self, topic: impl Into<String>, payload: Vec<u8>) -> Result<(), DeviceError> {
        self.publish_with(topic, payload, PublishOptions::default(), None)
            .await
    }

    /// Publishes with explicit options and an optional completion handler.
    /// The handler fires when the message is handed to the transport, which
    /// for a queued publish is after replay.
    pub async fn publish_with(
        &self,
        topic: impl Into<String>,
        payload: Vec<u8>,
        options: PublishOptions,
        done: Option<CompletionHandler>,
    ) -> Result<(), DeviceError> {
        self.commands
            .send(Command::Publish {
                topic: topic.into(),
                payload,
                options,
                done,
            })
            .await
            .map_err(|_| DeviceError::KernelStopped)
    }

    /// Subscribes to the given topic filters. While offline the request is
    /// queued for replay; `SubscriptionQueueFull` is returned if the
    /// offline subscription queue is at its cap.
    pub async fn subscribe(
        &self,
        topics: Vec<String>,
        options: SubscribeOptions,
    ) -> Result<(), DeviceError> {
        self.subscribe_with(topics, options, None).await
    }

    /// `subscribe` with a completion handler that fires at transport
    /// hand-off.
    pub async fn subscribe_with(
        &self,
        topics: Vec<String>,
        options: SubscribeOptions,
        done: Option<CompletionHandler>,
    ) -> Result<(), DeviceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Subscribe {
                topics,
                options,
                done,
                reply,
            })
            .await
            .map_err(|_| DeviceError::KernelStopped)?;
        response.await.map_err(|_| DeviceError::KernelStopped)?
    }

    /// Unsubscribes from the given topic filters. Same offline queueing
    /// rules as `subscribe`.
    pub async fn unsubscribe(&self, topics: Vec<String>) -> Result<(), DeviceError> {
        self.unsubscribe_with(topics, None).await
    }

    /// `unsubscribe` with a completion handler that fires at transport
    /// hand-off.
    pub async fn unsubscribe_with(
        &self,
        topics: Vec<String>,
        done: Option<CompletionHandler>,
    ) -> Result<(), DeviceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Unsubscribe {
                topics,
                done,
                reply,
            })
            .await
            .map_err(|_| DeviceError::KernelStopped)?;
        response.await.map_err(|_| DeviceError::KernelStopped)?
    }

    /// Terminates the connection and stops the kernel. Queued operations
    /// are discarded. The handle is unusable afterwards; later calls return
    /// `KernelStopped`.
    pub async fn end(&self, force: bool) -> Result<(), DeviceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::End { force, reply })
            .await
            .map_err(|_| DeviceError::KernelStopped)?;
        response.await.map_err(|_| DeviceError::KernelStopped)?
    }

    /// Point-in-time queue depths and connection state, for introspection
    /// and tests.
    pub async fn stats(&self) -> Result<QueueStats, DeviceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Stats { reply })
            .await
            .map_err(|_| DeviceError::KernelStopped)?;
        response.await.map_err(|_| DeviceError::KernelStopped)
    }

    /// New subscription to the device event stream. A receiver that falls
    /// behind loses the oldest events rather than blocking the kernel.
    pub fn events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch channel following the connection state across reconnects.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Cancels the kernel without the disconnect handshake. Prefer `end`.
    pub fn abort(&self) {
        self.cancel.cancel();
    }
}
