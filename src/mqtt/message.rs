//! Inbound message representation and the queue that buffers them between
//! the network task and the consumer.

use chrono::NaiveDateTime;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Decoded message body.
///
/// Wire payloads are UTF-8 text. A payload that parses as a JSON object is
/// `Structured`; everything else (bare scalars, arrays, malformed text) is
/// kept verbatim as `Raw` so that no message is ever dropped over a decode
/// failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Structured(serde_json::Map<String, Value>),
    Raw(String),
}

impl Payload {
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Payload::Structured(map),
            _ => Payload::Raw(raw.to_string()),
        }
    }

    /// Canonical wire encoding: structured data as JSON text, raw text as-is.
    pub fn encode(&self) -> String {
        match self {
            Payload::Structured(map) => Value::Object(map.clone()).to_string(),
            Payload::Raw(text) => text.clone(),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Payload::Structured(map) => write!(f, "{}", Value::Object(map.clone())),
            Payload::Raw(text) => write!(f, "{text}"),
        }
    }
}

/// A message received from the broker, created by the network task and
/// consumed exactly once when dequeued.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Wire topic the message arrived on
    pub topic: String,
    pub data: Payload,
    /// Local time of receipt
    pub timestamp: NaiveDateTime,
    /// Original payload text before decoding
    pub raw_payload: String,
}

impl InboundMessage {
    pub fn from_wire(topic: String, payload: &[u8]) -> Self {
        let raw_payload = String::from_utf8_lossy(payload).into_owned();
        InboundMessage {
            topic,
            data: Payload::decode(&raw_payload),
            timestamp: chrono::Local::now().naive_local(),
            raw_payload,
        }
    }
}

impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}: {}", self.timestamp, self.topic, self.data)
    }
}

/// Unbounded FIFO buffer between the network-receive context and the
/// consumer context. This is the only message path across the two; pushing
/// never blocks and never fails while a receiver exists.
pub struct MessageQueue {
    tx: mpsc::UnboundedSender<InboundMessage>,
    rx: mpsc::UnboundedReceiver<InboundMessage>,
}

impl MessageQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        MessageQueue { tx, rx }
    }

    /// Producer handle for the network task.
    pub fn sender(&self) -> mpsc::UnboundedSender<InboundMessage> {
        self.tx.clone()
    }

    /// Waits up to `timeout` for the next message, `None` on expiry. The
    /// consumer's cooperative yield point; it must never busy-spin.
    pub async fn recv(&mut self, timeout: Duration) -> Option<InboundMessage> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn json_object_decodes_as_structured() {
        let payload = Payload::decode(r#"{"temperature": 25.5, "humidity": 60}"#);
        match payload {
            Payload::Structured(map) => {
                assert_eq!(map["temperature"], Value::from(25.5));
                assert_eq!(map["humidity"], Value::from(60));
            }
            Payload::Raw(text) => panic!("expected structured payload, got raw '{text}'"),
        }
    }

    #[test]
    fn plain_text_falls_back_to_raw() {
        assert_eq!(Payload::decode("on"), Payload::Raw("on".to_string()));
    }

    #[test]
    fn non_object_json_falls_back_to_raw() {
        // Bare scalars and arrays are valid JSON but not key/value readings
        assert_eq!(Payload::decode("25.5"), Payload::Raw("25.5".to_string()));
        assert_eq!(Payload::decode("[1, 2]"), Payload::Raw("[1, 2]".to_string()));
    }

    #[test]
    fn malformed_json_falls_back_to_raw() {
        let payload = Payload::decode(r#"{"temperature": "#);
        assert_eq!(payload, Payload::Raw(r#"{"temperature": "#.to_string()));
    }

    #[test]
    fn structured_payload_round_trips_through_encoding() {
        let mut map = serde_json::Map::new();
        map.insert("temperature".to_string(), Value::from(25.5));
        map.insert("unit".to_string(), Value::from("C"));
        let original = Payload::Structured(map);

        assert_eq!(Payload::decode(&original.encode()), original);
    }

    #[test]
    fn raw_payload_encodes_verbatim() {
        assert_eq!(Payload::Raw("on".to_string()).encode(), "on");
    }

    #[test]
    fn from_wire_keeps_original_payload_text() {
        let message = InboundMessage::from_wire("dev/t".to_string(), b"{\"v\": 1}");
        assert_eq!(message.topic, "dev/t");
        assert_eq!(message.raw_payload, "{\"v\": 1}");
        assert!(matches!(message.data, Payload::Structured(_)));
    }

    #[tokio::test]
    async fn queue_preserves_fifo_order() {
        let mut queue = MessageQueue::new();
        let sender = queue.sender();
        for topic in ["dev/a", "dev/b", "dev/c"] {
            sender
                .send(InboundMessage::from_wire(topic.to_string(), b"1"))
                .unwrap();
        }

        let timeout = Duration::from_millis(100);
        assert_eq!(queue.recv(timeout).await.unwrap().topic, "dev/a");
        assert_eq!(queue.recv(timeout).await.unwrap().topic, "dev/b");
        assert_eq!(queue.recv(timeout).await.unwrap().topic, "dev/c");
    }

    #[tokio::test]
    async fn recv_returns_none_after_timeout() {
        let mut queue = MessageQueue::new();
        let start = Instant::now();
        let result = queue.recv(Duration::from_millis(50)).await;
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn messages_survive_sender_clone_drop() {
        let mut queue = MessageQueue::new();
        {
            let sender = queue.sender();
            sender
                .send(InboundMessage::from_wire("dev/t".to_string(), b"25.5"))
                .unwrap();
        }
        let message = queue.recv(Duration::from_millis(100)).await.unwrap();
        assert_eq!(message.data, Payload::Raw("25.5".to_string()));
    }
}
