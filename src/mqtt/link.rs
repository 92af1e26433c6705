//! Broker session ownership.
//!
//! `BrokerLink` holds exactly one physical connection: it builds the rumqttc
//! session from the broker config and spawns the event-loop task that drives
//! it. The task is the producer side of the system — it writes connection
//! state into a watch channel, records subscriptions on the connect
//! acknowledgment, and pushes every incoming publish onto the unbounded
//! inbound queue. It exits on shutdown, on a refused handshake, and on any
//! connection loss; a dropped session is reported through the state flag,
//! never healed here.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::MqttError;
use super::message::InboundMessage;
use super::topics::TopicRegistry;
use crate::config::BrokerConfig;

const CLIENT_ID: &str = "sensorlink";
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Connection lifecycle as seen by the consumer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Handle to one broker session and its event-loop task.
pub struct BrokerLink {
    client: AsyncClient,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    subscriptions: Arc<RwLock<Vec<String>>>,
    task: JoinHandle<()>,
}

impl BrokerLink {
    /// Starts a session against the configured broker and spawns its event
    /// loop. The link is `Connecting` until the broker acknowledges; use
    /// [`BrokerLink::await_connected`] to wait for the outcome.
    pub fn open(
        config: &BrokerConfig,
        registry: &TopicRegistry,
        inbox: mpsc::UnboundedSender<InboundMessage>,
    ) -> Self {
        let mut options = MqttOptions::new(CLIENT_ID, config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keepalive_secs));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            if !username.is_empty() && !password.is_empty() {
                options.set_credentials(username.clone(), password.clone());
            }
        }

        let (client, event_loop) = AsyncClient::new(options, 100);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let subscriptions = Arc::new(RwLock::new(Vec::new()));

        let task = tokio::spawn(run_event_loop(
            event_loop,
            client.clone(),
            state_tx,
            shutdown_rx,
            registry.subscriptions(),
            subscriptions.clone(),
            inbox,
        ));

        BrokerLink {
            client,
            state_rx,
            shutdown_tx,
            subscriptions,
            task,
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.state_rx.borrow() == ConnectionState::Connected
    }

    /// Snapshot of the wire topics subscribed in this session.
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.subscriptions
            .read()
            .map(|set| set.clone())
            .unwrap_or_default()
    }

    /// Blocks until the broker acknowledges the connection, the session
    /// closes, or `timeout` elapses.
    pub async fn await_connected(&self, timeout: Duration) -> Result<(), MqttError> {
        match tokio::time::timeout(timeout, wait_for_ack(self.state_rx.clone())).await {
            Ok(result) => result,
            Err(_) => Err(MqttError::ConnectTimeout(timeout)),
        }
    }

    /// Hands `payload` to the transport at QoS 1 (at-least-once), not
    /// retained. Buffered by the request channel; does not wait on the
    /// event loop's internal state.
    pub async fn publish(&self, wire_topic: &str, payload: String) -> Result<(), MqttError> {
        self.client
            .publish(wire_topic, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }

    /// Stops the event loop and closes the session. Safe to call on a link
    /// whose session already ended.
    pub async fn close(mut self) {
        let _ = self.shutdown_tx.send(true);
        // Best effort; fails when the loop is already gone
        let _ = self.client.disconnect().await;
        if tokio::time::timeout(CLOSE_GRACE, &mut self.task).await.is_err() {
            warn!("event loop did not stop in time, aborting task");
            self.task.abort();
        }
    }
}

/// Event-driven wait for the state channel to leave `Connecting`.
async fn wait_for_ack(mut state_rx: watch::Receiver<ConnectionState>) -> Result<(), MqttError> {
    loop {
        match *state_rx.borrow_and_update() {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Disconnected => return Err(MqttError::SessionClosed),
            ConnectionState::Connecting => {}
        }
        if state_rx.changed().await.is_err() {
            return Err(MqttError::SessionClosed);
        }
    }
}

/// Drives the rumqttc event loop until shutdown or connection loss.
///
/// Runs on its own task from `open()` until the session ends; everything it
/// shares with the consumer context goes through the state channel, the
/// subscription lock, or the inbound queue.
async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: watch::Receiver<bool>,
    input_topics: Vec<String>,
    subscriptions: Arc<RwLock<Vec<String>>>,
    inbox: mpsc::UnboundedSender<InboundMessage>,
) {
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("session closed by client");
                    break;
                }
            }
            polled = event_loop.poll() => match polled {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        info!("connected to broker");
                        let _ = state_tx.send(ConnectionState::Connected);
                        subscribe_inputs(&client, &input_topics, &subscriptions).await;
                    } else {
                        warn!(code = ?ack.code, "broker refused connection");
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = InboundMessage::from_wire(publish.topic, &publish.payload);
                    debug!(topic = %message.topic, payload = %message.raw_payload, "message received");
                    if inbox.send(message).is_err() {
                        warn!("inbound queue receiver dropped, stopping session");
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!("broker closed the connection");
                    break;
                }
                Ok(_) => {}
                Err(error) => {
                    // Distinguish the drop we asked for from a network failure
                    if *shutdown_rx.borrow() {
                        info!("session closed by client");
                    } else {
                        warn!(%error, "connection lost unexpectedly");
                    }
                    break;
                }
            }
        }
    }
    let _ = state_tx.send(ConnectionState::Disconnected);
}

/// Subscribes every input topic at QoS 1, recording successes.
async fn subscribe_inputs(
    client: &AsyncClient,
    input_topics: &[String],
    subscriptions: &Arc<RwLock<Vec<String>>>,
) {
    for topic in input_topics {
        match client.subscribe(topic.clone(), QoS::AtLeastOnce).await {
            Ok(()) => {
                info!(%topic, "subscribed");
                if let Ok(mut set) = subscriptions.write() {
                    set.push(topic.clone());
                }
            }
            Err(error) => warn!(%topic, %error, "subscribe request failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_for_ack_resolves_on_connected() {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = state_tx.send(ConnectionState::Connected);
        });

        let result = tokio::time::timeout(Duration::from_millis(500), wait_for_ack(state_rx))
            .await
            .expect("wait_for_ack should resolve before the timeout");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn wait_for_ack_fails_when_session_closes() {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = state_tx.send(ConnectionState::Disconnected);
        });

        let result = tokio::time::timeout(Duration::from_millis(500), wait_for_ack(state_rx))
            .await
            .expect("wait_for_ack should resolve before the timeout");
        assert!(matches!(result, Err(MqttError::SessionClosed)));
    }

    #[tokio::test]
    async fn wait_for_ack_fails_when_sender_drops() {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        drop(state_tx);

        let result = wait_for_ack(state_rx).await;
        assert!(matches!(result, Err(MqttError::SessionClosed)));
    }

    #[tokio::test]
    async fn wait_for_ack_sees_state_set_before_the_wait() {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        state_tx.send(ConnectionState::Connected).unwrap();

        let result = wait_for_ack(state_rx).await;
        assert!(result.is_ok());
    }
}
