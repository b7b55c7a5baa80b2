//! The narrow seam between the lifecycle machine and the MQTT engine.
//!
//! The lifecycle machine never touches the wire protocol; it drives an
//! implementation of `TransportClient` which hands commands to the
//! underlying engine without blocking. The production implementation wraps
//! rumqttc's `AsyncClient` using its `try_*` methods, so a hand-off either
//! succeeds synchronously or fails synchronously — it never waits on
//! network I/O. Packet encoding, the CONNECT/CONNACK handshake, keepalive
//! pings and the reconnect loop itself all belong to rumqttc.

use rumqttc::{AsyncClient, QoS, SubscribeFilter};

use crate::error::DeviceError;

/// Per-publish options carried with a publish request through queueing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
    /// MQTT quality of service for the publish.
    pub qos: QoS,
    /// Whether the broker should retain the message.
    pub retain: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            qos: QoS::AtMostOnce,
            retain: false,
        }
    }
}

/// Per-subscription options, remembered by the subscription cache so the
/// same options are used when auto-resubscribing after a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Requested MQTT quality of service for the subscription.
    pub qos: QoS,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            qos: QoS::AtMostOnce,
        }
    }
}

/// Non-blocking command surface of the transport-facing client.
///
/// Every method completes synchronously: either the command was accepted
/// into the engine's request channel, or it failed locally. Delivery
/// guarantees beyond hand-off are whatever the transport's QoS provides.
pub trait TransportClient: Send {
    /// Hands a publish to the engine.
    fn publish(
        &self,
        topic: &str,
        options: &PublishOptions,
        payload: Vec<u8>,
    ) -> Result<(), DeviceError>;

    /// Hands a subscribe for one or more topic filters to the engine.
    fn subscribe(&self, topics: &[String], options: &SubscribeOptions) -> Result<(), DeviceError>;

    /// Hands an unsubscribe for one or more topic filters to the engine.
    fn unsubscribe(&self, topics: &[String]) -> Result<(), DeviceError>;

    /// Requests connection termination. `force` is advisory: rumqttc's
    /// disconnect has no forced mode, so it is accepted for API parity and
    /// otherwise ignored.
    fn end(&self, force: bool) -> Result<(), DeviceError>;
}

impl TransportClient for AsyncClient {
    fn publish(
        &self,
        topic: &str,
        options: &PublishOptions,
        payload: Vec<u8>,
    ) -> Result<(), DeviceError> {
        self.try_publish(topic, options.qos, options.retain, payload)?;
        Ok(())
    }

    fn subscribe(&self, topics: &[String], options: &SubscribeOptions) -> Result<(), DeviceError> {
        match topics {
            [topic] => self.try_subscribe(topic, options.qos)?,
            _ => {
                let filters = topics
                    .iter()
                    .map(|topic| SubscribeFilter::new(topic.clone(), options.qos));
                self.try_subscribe_many(filters)?;
            }
        }
        Ok(())
    }

    fn unsubscribe(&self, topics: &[String]) -> Result<(), DeviceError> {
        for topic in topics {
            self.try_unsubscribe(topic)?;
        }
        Ok(())
    }

    fn end(&self, _force: bool) -> Result<(), DeviceError> {
        self.try_disconnect()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::MqttOptions;

    #[test]
    fn test_publish_options_default() {
        let opts = PublishOptions::default();
        assert_eq!(opts.qos, QoS::AtMostOnce);
        assert!(!opts.retain);
    }

    #[tokio::test]
    async fn test_async_client_hand_off_without_event_loop() {
        // Commands queue into the engine's request channel; no broker needed.
        let (client, _event_loop) =
            AsyncClient::new(MqttOptions::new("test-transport", "localhost", 1883), 16);

        TransportClient::publish(
            &client,
            "telemetry/temp",
            &PublishOptions::default(),
            b"21.5".to_vec(),
        )
        .unwrap();

        TransportClient::subscribe(
            &client,
            &["commands/#".to_string()],
            &SubscribeOptions::default(),
        )
        .unwrap();

        TransportClient::unsubscribe(&client, &["commands/#".to_string()]).unwrap();
    }
}
