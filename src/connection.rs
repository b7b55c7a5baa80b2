//! The device kernel: the single task that owns the lifecycle machine.
//!
//! All mutable state — the lifecycle machine, the rumqttc event loop and
//! the three timer deadlines — lives inside one tokio task. Callers talk to
//! it through an mpsc command channel and observe it through a broadcast
//! event channel and a watch channel carrying the connection state. The
//! machine itself therefore needs no locks.
//!
//! Timers are plain `Option<Instant>` deadlines re-evaluated on every loop
//! iteration. After each transition the kernel reconciles the deadlines
//! against the machine's `stability_pending()` and `is_draining()` flags,
//! so starting an already-armed timer is naturally a no-op and a cancelled
//! flag disarms the deadline on the next pass.
//!
//! While a reconnect delay is pending the kernel stops polling the event
//! loop, which holds rumqttc back from retrying; polling resumes when the
//! delay elapses. That is how the escalating backoff paces the transport.

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, Packet};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::DeviceError;
use crate::event::DeviceEvent;
use crate::lifecycle::ConnectionLifecycle;
use crate::request::CompletionHandler;
use crate::state::ConnectionState;
use crate::transport::{PublishOptions, SubscribeOptions};

/// Commands accepted by the kernel task.
pub(crate) enum Command {
    Publish {
        topic: String,
        payload: Vec<u8>,
        options: PublishOptions,
        done: Option<CompletionHandler>,
    },
    Subscribe {
        topics: Vec<String>,
        options: SubscribeOptions,
        done: Option<CompletionHandler>,
        reply: oneshot::Sender<Result<(), DeviceError>>,
    },
    Unsubscribe {
        topics: Vec<String>,
        done: Option<CompletionHandler>,
        reply: oneshot::Sender<Result<(), DeviceError>>,
    },
    End {
        force: bool,
        reply: oneshot::Sender<Result<(), DeviceError>>,
    },
    Stats {
        reply: oneshot::Sender<QueueStats>,
    },
}

/// Point-in-time view of the kernel's queues and state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub state: ConnectionState,
    pub queued_publishes: usize,
    pub queued_subscription_requests: usize,
    pub active_subscriptions: usize,
}

/// Sleeps until the deadline, or forever when there is none. Lets optional
/// timers sit directly in the kernel's `select!` arms.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

pub(crate) struct DeviceKernel {
    core: ConnectionLifecycle<AsyncClient>,
    event_loop: EventLoop,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<DeviceEvent>,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,

    drain_interval: Duration,
    reconnect_at: Option<Instant>,
    stability_at: Option<Instant>,
    drain_at: Option<Instant>,
}

impl DeviceKernel {
    pub(crate) fn new(
        core: ConnectionLifecycle<AsyncClient>,
        event_loop: EventLoop,
        commands: mpsc::Receiver<Command>,
        events: broadcast::Sender<DeviceEvent>,
        state_tx: watch::Sender<ConnectionState>,
        cancel: CancellationToken,
        drain_interval: Duration,
    ) -> Self {
        Self {
            core,
            event_loop,
            commands,
            events,
            state_tx,
            cancel,
            drain_interval,
            reconnect_at: None,
            stability_at: None,
            drain_at: None,
        }
    }

    /// Runs until the client asks to end, every handle is dropped, or the
    /// cancellation token fires.
    pub(crate) async fn run(mut self) {
        info!("device kernel started");
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("device kernel cancelled");
                    let _ = self.core.end(false);
                    break;
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => {
                            if !self.handle_command(command) {
                                break;
                            }
                        }
                        None => {
                            debug!("all client handles dropped, stopping kernel");
                            let _ = self.core.end(false);
                            break;
                        }
                    }
                }
                event = self.event_loop.poll(), if self.reconnect_at.is_none() => {
                    self.handle_poll(event);
                }
                _ = sleep_until_opt(self.reconnect_at), if self.reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    self.emit(DeviceEvent::Reconnect);
                    debug!("reconnect delay elapsed, resuming connection attempts");
                }
                _ = sleep_until_opt(self.stability_at), if self.stability_at.is_some() => {
                    self.stability_at = None;
                    self.core.on_stability_elapsed();
                    self.publish_state();
                    self.sync_timers();
                }
                _ = sleep_until_opt(self.drain_at), if self.drain_at.is_some() => {
                    self.drain_at = None;
                    self.core.drain_tick();
                    self.sync_timers();
                }
            }
        }
        info!("device kernel stopped");
    }

    /// Returns false when the kernel should stop.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Publish {
                topic,
                payload,
                options,
                done,
            } => {
                self.core.publish(topic, payload, options, done);
            }
            Command::Subscribe {
                topics,
                options,
                done,
                reply,
            } => {
                let _ = reply.send(self.core.subscribe(topics, options, done));
            }
            Command::Unsubscribe {
                topics,
                done,
                reply,
            } => {
                let _ = reply.send(self.core.unsubscribe(topics, done));
            }
            Command::End { force, reply } => {
                debug!(force, "client requested connection end");
                // Refuse further commands before acknowledging, so callers
                // observing the reply see the channel already closed.
                self.commands.close();
                let _ = reply.send(self.core.end(force));
                return false;
            }
            Command::Stats { reply } => {
                let _ = reply.send(QueueStats {
                    state: self.core.state(),
                    queued_publishes: self.core.queued_publishes(),
                    queued_subscription_requests: self.core.queued_subscription_requests(),
                    active_subscriptions: self.core.active_subscriptions(),
                });
            }
        }
        self.sync_timers();
        true
    }

    fn handle_poll(&mut self, event: Result<Event, ConnectionError>) {
        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                self.emit(DeviceEvent::PacketReceive);
                if ack.code == ConnectReturnCode::Success {
                    info!(session_present = ack.session_present, "broker accepted connection");
                    self.core.on_connected();
                    self.emit(DeviceEvent::Connect);
                    self.publish_state();
                } else {
                    warn!(code = ?ack.code, "broker refused connection");
                    self.emit(DeviceEvent::Error(format!(
                        "connection refused: {:?}",
                        ack.code
                    )));
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                trace!(topic = %publish.topic, bytes = publish.payload.len(), "message received");
                self.emit(DeviceEvent::PacketReceive);
                self.emit(DeviceEvent::Message {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                });
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                self.emit(DeviceEvent::PacketReceive);
                debug!("broker sent disconnect");
                self.on_connection_lost();
            }
            Ok(Event::Incoming(_)) => {
                self.emit(DeviceEvent::PacketReceive);
            }
            Ok(Event::Outgoing(_)) => {
                self.emit(DeviceEvent::PacketSend);
            }
            Err(e) => {
                error!("transport error: {e}");
                self.emit(DeviceEvent::Error(e.to_string()));
                self.on_connection_lost();
                let delay = self.core.on_retrying();
                debug!(?delay, "holding reconnect attempts");
                self.reconnect_at = Some(Instant::now() + delay);
            }
        }
        self.sync_timers();
    }

    /// Shared disconnect path: machine back to inactive, timers disarmed on
    /// the next reconcile, close and offline surfaced in that order.
    fn on_connection_lost(&mut self) {
        let was_connected = self.core.state().is_connected();
        self.core.on_disconnected();
        if was_connected {
            self.emit(DeviceEvent::Close);
        }
        self.emit(DeviceEvent::Offline);
        self.publish_state();
    }

    /// Reconciles the timer deadlines with the machine's flags. Arms a
    /// deadline only if its flag is set and it is not already armed.
    fn sync_timers(&mut self) {
        if self.core.stability_pending() {
            if self.stability_at.is_none() {
                self.stability_at = Some(Instant::now() + self.core.stability_window());
            }
        } else {
            self.stability_at = None;
        }

        if self.core.is_draining() {
            if self.drain_at.is_none() {
                self.drain_at = Some(Instant::now() + self.drain_interval);
            }
        } else {
            self.drain_at = None;
        }
    }

    fn publish_state(&self) {
        let next = self.core.state();
        self.state_tx.send_if_modified(|current| {
            if *current != next {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    fn emit(&self, event: DeviceEvent) {
        // Err only means nobody is listening right now.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_opt_fires_at_deadline() {
        let deadline = Instant::now() + Duration::from_millis(250);
        sleep_until_opt(Some(deadline)).await;
        assert!(Instant::now() >= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_opt_none_never_fires() {
        let pending = sleep_until_opt(None);
        let result =
            tokio::time::timeout(Duration::from_secs(3600), pending).await;
        assert!(result.is_err());
    }
}
