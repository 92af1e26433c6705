//! Logical topic bookkeeping.
//!
//! Topics are configured as `logical key -> wire topic path`. The key's
//! prefix decides its direction: `sensor_` and `button_` keys are inputs
//! that get subscribed automatically on connect; everything else is a
//! command topic, publish-only and never subscribed.

use std::collections::BTreeMap;

/// Key prefixes that mark a topic as an input (auto-subscribed)
const INPUT_PREFIXES: [&str; 2] = ["sensor_", "button_"];

/// Read-only map from logical topic keys to wire topic paths.
///
/// Built once from configuration at startup; there is no mutation API.
#[derive(Debug, Clone, Default)]
pub struct TopicRegistry {
    topics: BTreeMap<String, String>,
}

impl TopicRegistry {
    pub fn new(topics: BTreeMap<String, String>) -> Self {
        Self { topics }
    }

    /// Looks up the wire topic for a logical key.
    ///
    /// `None` is a recoverable condition; the publish path reports it to
    /// the caller instead of sending anything.
    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.topics.get(key).map(String::as_str)
    }

    /// Wire topics for every input-classified logical key.
    pub fn subscriptions(&self) -> Vec<String> {
        self.topics
            .iter()
            .filter(|(key, _)| INPUT_PREFIXES.iter().any(|prefix| key.starts_with(prefix)))
            .map(|(_, path)| path.clone())
            .collect()
    }
}
