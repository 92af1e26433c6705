//! Error definitions for the MQTT module

use std::time::Duration;
use thiserror::Error;

/// Failures on the connect and publish paths.
///
/// These never cross the client boundary as panics; the façade logs them
/// and reports `false` to the caller.
#[derive(Debug, Error)]
pub enum MqttError {
    /// Publish was attempted without a live broker session
    #[error("not connected to broker")]
    NotConnected,

    /// The logical topic key has no wire topic in the registry
    #[error("logical topic '{0}' not found in configuration")]
    TopicNotFound(String),

    /// The session ended before the broker acknowledged the connection,
    /// either refused outright or dropped during the handshake
    #[error("connection closed before acknowledgment")]
    SessionClosed,

    /// No connection acknowledgment arrived within the bound
    #[error("no connection acknowledgment within {0:?}")]
    ConnectTimeout(Duration),

    /// The transport rejected the request (queue full, loop gone)
    #[error("publish request failed: {0}")]
    Publish(#[from] rumqttc::ClientError),
}
