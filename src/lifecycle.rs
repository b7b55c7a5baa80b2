//! Connection lifecycle state machine and drain engine.
//!
//! `ConnectionLifecycle` owns the offline queues, the subscription cache,
//! the reconnect backoff and the connection state, and decides for every
//! operation whether it executes immediately or is queued. It is a plain
//! synchronous state machine: all transitions are driven by events raised
//! by the transport-facing client, it never polls, and it never blocks.
//! Timer scheduling lives in the kernel (`connection.rs`), which reads the
//! machine's `stability_pending()` and `is_draining()` flags after every
//! transition — starting an already-running timer is therefore a no-op by
//! construction.
//!
//! # Draining
//!
//! When the transport connects, the machine snapshots the subscription
//! cache and enters draining. Each drain tick replays exactly one item, in
//! strict priority order:
//!
//! 1. one entry from the snapshot (resubscription),
//! 2. else one queued subscribe/unsubscribe request,
//! 3. else one queued publish.
//!
//! Resubscription runs first so the cache reflects pre-disconnect topics
//! before queued subscription changes apply, and subscription state is
//! re-established before any queued message goes out. One item per tick
//! bounds the burst rate after a reconnect storm. Draining ends as soon as
//! a tick observes all three sources empty.

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use crate::backoff::ReconnectBackoff;
use crate::config::DeviceOptions;
use crate::error::DeviceError;
use crate::queue::{BoundedQueue, DropBehavior};
use crate::request::{CompletionHandler, PublishRequest, SubscriptionKind, SubscriptionRequest};
use crate::state::ConnectionState;
use crate::subscriptions::{SubscriptionCache, SubscriptionEntry};
use crate::transport::{PublishOptions, SubscribeOptions, TransportClient};

/// Fixed cap for the offline subscription-request queue. Requests beyond it
/// are rejected with `DeviceError::SubscriptionQueueFull`, never silently
/// dropped.
pub const SUBSCRIPTION_QUEUE_LIMIT: usize = 50;

/// The lifecycle state machine and its cooperating subsystems.
///
/// Generic over the transport seam so the replay logic can be exercised
/// against a recording double in tests; production uses
/// `rumqttc::AsyncClient`.
pub struct ConnectionLifecycle<C: TransportClient> {
    client: C,

    state: ConnectionState,
    backoff: ReconnectBackoff,

    /// Publishes captured while offline or while draining.
    publish_queue: BoundedQueue<PublishRequest>,

    /// Subscribe/unsubscribe requests captured while offline.
    subscription_queue: BoundedQueue<SubscriptionRequest>,

    /// Filters to re-establish after a reconnect. Survives disconnects.
    cache: SubscriptionCache,

    /// Ordered copy of the cache taken when draining begins; consumed one
    /// entry per tick without touching the live cache.
    snapshot: VecDeque<SubscriptionEntry>,

    /// Drain timer handle equivalent: true while a drain cycle is running.
    draining: bool,

    /// Stability timer handle equivalent: true while waiting for the
    /// connection to prove itself stable.
    stability_pending: bool,

    offline_queueing: bool,
    auto_resubscribe: bool,
}

impl<C: TransportClient> ConnectionLifecycle<C> {
    /// Builds the machine from validated options.
    ///
    /// # Errors
    /// Returns `DeviceError::InvalidReconnectTiming` if the reconnect delay
    /// relationships are inconsistent; no connection is attempted then.
    pub fn new(client: C, options: &DeviceOptions) -> Result<Self, DeviceError> {
        let backoff = ReconnectBackoff::new(
            options.base_reconnect(),
            options.maximum_reconnect(),
            options.minimum_connection(),
        )?;
        Ok(Self {
            client,
            state: ConnectionState::Inactive,
            backoff,
            publish_queue: BoundedQueue::new(
                options.offline_queue_max_size,
                options.offline_queue_drop_behavior,
            ),
            subscription_queue: BoundedQueue::new(SUBSCRIPTION_QUEUE_LIMIT, DropBehavior::Newest),
            cache: SubscriptionCache::new(),
            snapshot: VecDeque::new(),
            draining: false,
            stability_pending: false,
            offline_queueing: options.offline_queueing,
            auto_resubscribe: options.auto_resubscribe,
        })
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True while a drain cycle is running. The kernel keeps the drain tick
    /// timer armed exactly while this is true.
    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// True while waiting for the stability threshold to elapse. The kernel
    /// keeps the stability timer armed exactly while this is true.
    pub fn stability_pending(&self) -> bool {
        self.stability_pending
    }

    /// Number of publishes waiting in the offline queue.
    pub fn queued_publishes(&self) -> usize {
        self.publish_queue.len()
    }

    /// Number of subscription requests waiting in the offline queue.
    pub fn queued_subscription_requests(&self) -> usize {
        self.subscription_queue.len()
    }

    /// Number of filters in the active-subscription cache.
    pub fn active_subscriptions(&self) -> usize {
        self.cache.len()
    }

    /// Continuous uptime required before the backoff resets.
    pub fn stability_window(&self) -> std::time::Duration {
        self.backoff.minimum_stable()
    }

    /// Delay the transport should currently use between retries.
    pub fn current_reconnect_delay(&self) -> std::time::Duration {
        self.backoff.current_delay()
    }

    // ---- transport lifecycle events -------------------------------------

    /// Transport connected (CONNACK received).
    ///
    /// Arms the stability flag if it is not already armed, and if no drain
    /// cycle is running, snapshots the subscription cache and starts one. A
    /// CONNACK arriving mid-drain leaves the running cycle untouched.
    pub fn on_connected(&mut self) {
        self.state = ConnectionState::Established;
        self.stability_pending = true;
        if !self.draining {
            self.snapshot = self.cache.snapshot();
            self.draining = true;
            debug!(
                resubscriptions = self.snapshot.len(),
                queued_subscriptions = self.subscription_queue.len(),
                queued_publishes = self.publish_queue.len(),
                "connection established, draining offline operations"
            );
        }
    }

    /// The stability timer fired: the connection has been held open past
    /// the threshold. Resets the backoff to its base delay.
    pub fn on_stability_elapsed(&mut self) {
        self.stability_pending = false;
        self.state = ConnectionState::Stable;
        self.backoff.reset();
        debug!("connection is stable, reconnect delay reset to base");
    }

    /// Transport disconnected. Cancels both timers (via their flags),
    /// discards any in-flight snapshot — resubscription restarts from the
    /// full cache on the next connect — and returns to `Inactive`. The
    /// offline queues and the subscription cache survive.
    pub fn on_disconnected(&mut self) {
        self.stability_pending = false;
        self.draining = false;
        self.snapshot.clear();
        self.state = ConnectionState::Inactive;
    }

    /// Transport is about to retry. Doubles the retry delay (capped) and
    /// returns the new value as the wait the transport should apply.
    pub fn on_retrying(&mut self) -> std::time::Duration {
        let delay = self.backoff.escalate();
        trace!(?delay, "reconnect delay escalated");
        delay
    }

    // ---- drain engine ----------------------------------------------------

    /// Replays exactly one queued item, in priority order: snapshot entry,
    /// then queued subscription request, then queued publish. Ends the
    /// drain cycle once all three sources are observed empty.
    pub fn drain_tick(&mut self) {
        if !self.draining {
            return;
        }

        if let Some(entry) = self.snapshot.pop_front() {
            trace!(topic = %entry.topic, "resubscribing from snapshot");
            if let Err(e) = self
                .client
                .subscribe(std::slice::from_ref(&entry.topic), &entry.options)
            {
                warn!(topic = %entry.topic, "resubscribe hand-off failed: {e}");
            }
        } else if let Some(request) = self.subscription_queue.dequeue() {
            // Mirror what the immediate path would have done to the cache.
            self.apply_to_cache(request.kind, &request.topics, request.options);
            self.issue_subscription(request);
        } else if let Some(request) = self.publish_queue.dequeue() {
            self.issue_publish(request);
        }

        if self.snapshot.is_empty()
            && self.subscription_queue.is_empty()
            && self.publish_queue.is_empty()
        {
            self.draining = false;
            debug!("offline queues fully drained");
        }
    }

    // ---- facade operations -----------------------------------------------

    /// Publishes a message, queueing it while offline or while a drain is
    /// in progress (so replay ordering is preserved).
    ///
    /// With queueing enabled, a full queue applies the configured overflow
    /// policy; a rejected or displaced publish is dropped silently, matching
    /// fire-and-forget semantics for best-effort telemetry. With queueing
    /// disabled, publishes issued while offline are silently discarded.
    pub fn publish(
        &mut self,
        topic: String,
        payload: Vec<u8>,
        options: PublishOptions,
        done: Option<CompletionHandler>,
    ) {
        let request = PublishRequest {
            topic,
            payload,
            options,
            done,
        };

        if self.offline_queueing && (self.state == ConnectionState::Inactive || self.draining) {
            if !self.publish_queue.enqueue(request) {
                debug!("offline publish queue full, dropping newest publish");
            }
        } else if self.offline_queueing || self.state != ConnectionState::Inactive {
            self.issue_publish(request);
        } else {
            trace!("publish discarded: offline and queueing disabled");
        }
    }

    /// Subscribes to one or more topic filters.
    ///
    /// Connected (or with auto-resubscribe disabled): updates the cache and
    /// forwards immediately. Offline with auto-resubscribe enabled: queues
    /// the request, surfacing `SubscriptionQueueFull` if the queue is at
    /// its cap.
    pub fn subscribe(
        &mut self,
        topics: Vec<String>,
        options: SubscribeOptions,
        done: Option<CompletionHandler>,
    ) -> Result<(), DeviceError> {
        self.subscription_request(SubscriptionKind::Subscribe, topics, options, done)
    }

    /// Unsubscribes from one or more topic filters. Same queueing rules as
    /// `subscribe`.
    pub fn unsubscribe(
        &mut self,
        topics: Vec<String>,
        done: Option<CompletionHandler>,
    ) -> Result<(), DeviceError> {
        self.subscription_request(
            SubscriptionKind::Unsubscribe,
            topics,
            SubscribeOptions::default(),
            done,
        )
    }

    /// Terminates the underlying transport connection. Pending queues are
    /// not flushed; losing them on explicit termination is expected.
    pub fn end(&mut self, force: bool) -> Result<(), DeviceError> {
        self.client.end(force)
    }

    // ---- internals ---------------------------------------------------------

    fn subscription_request(
        &mut self,
        kind: SubscriptionKind,
        topics: Vec<String>,
        options: SubscribeOptions,
        done: Option<CompletionHandler>,
    ) -> Result<(), DeviceError> {
        if self.state != ConnectionState::Inactive || !self.auto_resubscribe {
            self.apply_to_cache(kind, &topics, options);
            self.issue_subscription(SubscriptionRequest {
                kind,
                topics,
                options,
                done,
            });
            Ok(())
        } else {
            let accepted = self.subscription_queue.enqueue(SubscriptionRequest {
                kind,
                topics,
                options,
                done,
            });
            if accepted {
                Ok(())
            } else {
                Err(DeviceError::SubscriptionQueueFull(SUBSCRIPTION_QUEUE_LIMIT))
            }
        }
    }

    /// Updates the active-subscription cache. No-op when auto-resubscribe
    /// is disabled: the cache then never holds anything and nothing is
    /// resubscribed after a reconnect.
    fn apply_to_cache(&mut self, kind: SubscriptionKind, topics: &[String], options: SubscribeOptions) {
        if !self.auto_resubscribe {
            return;
        }
        for topic in topics {
            match kind {
                SubscriptionKind::Subscribe => self.cache.upsert(topic, options),
                SubscriptionKind::Unsubscribe => self.cache.remove(topic),
            }
        }
    }

    fn issue_publish(&mut self, request: PublishRequest) {
        let result = self
            .client
            .publish(&request.topic, &request.options, request.payload);
        match request.done {
            Some(done) => done(result),
            None => {
                if let Err(e) = result {
                    warn!(topic = %request.topic, "publish hand-off failed: {e}");
                }
            }
        }
    }

    fn issue_subscription(&mut self, request: SubscriptionRequest) {
        let result = match request.kind {
            SubscriptionKind::Subscribe => {
                self.client.subscribe(&request.topics, &request.options)
            }
            SubscriptionKind::Unsubscribe => self.client.unsubscribe(&request.topics),
        };
        match request.done {
            Some(done) => done(result),
            None => {
                if let Err(e) = result {
                    warn!(?request.topics, "subscription hand-off failed: {e}");
                }
            }
        }
    }
}
