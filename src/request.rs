//! Queued operation records.
//!
//! These are the items that flow through the offline queues: a publish or a
//! subscription change captured while disconnected (or while a drain is in
//! progress), together with the caller's optional completion handler. Each
//! record is consumed exactly once — either immediately by the facade path
//! or later by the drain engine.

use crate::error::DeviceError;
use crate::transport::{PublishOptions, SubscribeOptions};

/// Completion callback preserved through queueing.
///
/// Invoked when the operation is finally handed to the transport-facing
/// client, with the hand-off result. It does not signal completion at the
/// broker; delivery beyond hand-off is the transport's concern. Handlers for
/// items discarded by the publish queue's drop-oldest policy are never
/// invoked.
pub type CompletionHandler = Box<dyn FnOnce(Result<(), DeviceError>) + Send + 'static>;

/// A publish captured for later replay.
pub struct PublishRequest {
    pub topic: String,
    pub payload: Vec<u8>,
    pub options: PublishOptions,
    pub done: Option<CompletionHandler>,
}

/// Whether a queued subscription request adds or removes filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Subscribe,
    Unsubscribe,
}

/// A subscribe or unsubscribe captured for later replay.
///
/// Stored in its own bounded queue, separate from publishes, so replay can
/// re-establish subscription state before any queued messages go out.
pub struct SubscriptionRequest {
    pub kind: SubscriptionKind,
    pub topics: Vec<String>,
    pub options: SubscribeOptions,
    pub done: Option<CompletionHandler>,
}
