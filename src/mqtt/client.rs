//! Public façade over the broker link, topic registry, and inbound queue.
//!
//! This is the surface the consumer programs against: connect once, poll
//! `get_message` on its own schedule, reflect `check_connection`, publish
//! commands by logical topic key, disconnect at shutdown. Failures are
//! reported as `false` returns with the cause logged; nothing on this
//! surface panics or propagates transport errors to the caller.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::MqttError;
use super::link::BrokerLink;
use super::message::{InboundMessage, MessageQueue, Payload};
use super::topics::TopicRegistry;
use crate::config::{AppConfig, BrokerConfig};

/// Bound on the wait for the broker's connect acknowledgment
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// MQTT client for exchanging sensor readings and device commands.
///
/// Owns the broker configuration, the read-only topic registry, and the
/// inbound queue. The physical session lives in a [`BrokerLink`] created by
/// `connect` and dropped by `disconnect`; calling `connect` again after a
/// dropped session opens a fresh one, so reconnection stays a caller
/// decision.
pub struct MqttClient {
    broker: BrokerConfig,
    registry: TopicRegistry,
    inbox: MessageQueue,
    link: Option<BrokerLink>,
}

impl MqttClient {
    /// Builds the client from loaded configuration. No I/O happens here.
    pub fn new(config: AppConfig) -> Self {
        let registry = TopicRegistry::new(config.topics);
        MqttClient {
            broker: config.broker,
            registry,
            inbox: MessageQueue::new(),
            link: None,
        }
    }

    /// Connects to the broker, blocking the caller until the broker
    /// acknowledges or [`CONNECT_TIMEOUT`] elapses. On success the sensor
    /// and button topics are subscribed by the session task. Returns
    /// `false` on refusal or timeout, with the cause logged.
    pub async fn connect(&mut self) -> bool {
        self.connect_with_timeout(CONNECT_TIMEOUT).await
    }

    pub(crate) async fn connect_with_timeout(&mut self, timeout: Duration) -> bool {
        if self.check_connection() {
            debug!("connect called while already connected");
            return true;
        }
        if let Some(stale) = self.link.take() {
            stale.close().await;
        }

        info!(host = %self.broker.host, port = self.broker.port, "connecting to broker");
        let link = BrokerLink::open(&self.broker, &self.registry, self.inbox.sender());
        match link.await_connected(timeout).await {
            Ok(()) => {
                self.link = Some(link);
                true
            }
            Err(error) => {
                warn!(%error, "connection failed");
                link.close().await;
                false
            }
        }
    }

    /// Publishes `payload` to the wire topic behind `key` at QoS 1.
    ///
    /// Returns `false` without touching the network when the key is not in
    /// the registry or no session is connected.
    pub async fn publish(&self, key: &str, payload: Payload) -> bool {
        match self.try_publish(key, payload).await {
            Ok(()) => true,
            Err(error) => {
                warn!(topic = key, %error, "publish failed");
                false
            }
        }
    }

    async fn try_publish(&self, key: &str, payload: Payload) -> Result<(), MqttError> {
        let wire_topic = self
            .registry
            .resolve(key)
            .ok_or_else(|| MqttError::TopicNotFound(key.to_string()))?;
        let link = self
            .link
            .as_ref()
            .filter(|link| link.is_connected())
            .ok_or(MqttError::NotConnected)?;
        link.publish(wire_topic, payload.encode()).await?;
        debug!(topic = %wire_topic, "published");
        Ok(())
    }

    /// Next buffered message, waiting up to `timeout`; `None` on expiry.
    pub async fn get_message(&mut self, timeout: Duration) -> Option<InboundMessage> {
        self.inbox.recv(timeout).await
    }

    pub fn check_connection(&self) -> bool {
        self.link.as_ref().is_some_and(BrokerLink::is_connected)
    }

    /// Snapshot of the wire topics subscribed in the current session.
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.link
            .as_ref()
            .map(BrokerLink::subscribed_topics)
            .unwrap_or_default()
    }

    /// Closes the session. Idempotent; safe from a cleanup path even when
    /// `connect` never succeeded.
    pub async fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            info!("disconnecting from broker");
            link.close().await;
        }
    }
}
