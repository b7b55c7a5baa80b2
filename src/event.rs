//! Events re-emitted by the device kernel.
//!
//! The kernel watches the transport's notification stream and surfaces a
//! compact set of lifecycle and traffic events to subscribers over a
//! broadcast channel. Events are cloneable values; a slow subscriber that
//! falls behind the channel capacity loses the oldest events, never blocks
//! the kernel.

/// One observable device event.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// The transport connected (CONNACK accepted). Emitted on every
    /// reconnect, not just the first connection.
    Connect,

    /// The connection closed.
    Close,

    /// The device is offline; the transport will retry on its own.
    Offline,

    /// A reconnect attempt is about to start, after the current backoff
    /// delay has elapsed.
    Reconnect,

    /// The transport reported an error. Carries the rendered error text;
    /// the kernel keeps running and the transport keeps retrying.
    Error(String),

    /// An application message arrived on a subscribed topic.
    Message { topic: String, payload: Vec<u8> },

    /// A control or data packet was handed to the wire.
    PacketSend,

    /// A control or data packet arrived from the wire.
    PacketReceive,
}
