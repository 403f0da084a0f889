//! In-process typed pub/sub — spec.md §4.6.
//!
//! Single shared instance owned by the daemon. Grounded on
//! `crates/runtime/src/server/mod.rs`'s `broadcast::channel<BackendEvent>`
//! fan-out, generalized from one fixed event enum to arbitrary
//! string-keyed topics.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::broadcast;

/// Broadcast channel capacity per topic. Old events are dropped for
/// lagging subscribers rather than blocking the publisher.
const TOPIC_CAPACITY: usize = 256;

pub const TOPIC_NOTIFICATION: &str = "notification";
pub const TOPIC_NEW_EMAIL: &str = "new_email";
pub const TOPIC_CALENDAR_SYNCED: &str = "calendar_synced";
pub const TOPIC_GOOGLE_CONNECTED: &str = "google_connected";
pub const TOPIC_GOOGLE_DISCONNECTED: &str = "google_disconnected";

#[derive(Debug, Clone)]
pub struct Event {
    pub topic: String,
    pub payload: Value,
}

/// In-process pub/sub bus. Delivery is best-effort: a lagging or dropped
/// subscriber never blocks or panics the publisher.
pub struct EventBus {
    topics: Mutex<HashMap<String, broadcast::Sender<Event>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<Event> {
        let mut topics = self.topics.lock().unwrap();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }

    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Event> {
        self.sender_for(topic).subscribe()
    }

    /// Delivers to every current subscriber of `topic`. A send error
    /// (no receivers) is not a failure — it's logged at trace level and
    /// otherwise ignored; one lagging subscriber never affects another.
    pub fn publish(&self, topic: &str, payload: Value) {
        let event = Event {
            topic: topic.to_string(),
            payload,
        };
        let sender = self.sender_for(topic);
        if sender.send(event).is_err() {
            tracing::trace!(topic, "published to a topic with no active subscribers");
        }
    }
}

/// Subscribes to the bus's `notification` topic and forwards every
/// payload to `sink` (an open WebSocket broadcast or similar) until the
/// bus subscription is dropped or the loop is cancelled.
pub async fn wire_event_bus_to_ws<F>(bus: &EventBus, mut sink: F)
where
    F: FnMut(Value),
{
    let mut rx = bus.subscribe(TOPIC_NOTIFICATION);
    loop {
        match rx.recv().await {
            Ok(event) => sink(event.payload),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "ws bridge lagged behind notification topic");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("new_email");
        bus.publish("new_email", serde_json::json!({"id": 1}));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, "new_email");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish("nobody_listening", serde_json::json!({}));
    }

    #[tokio::test]
    async fn one_failing_subscriber_does_not_affect_another() {
        let bus = EventBus::new();
        let mut slow = bus.subscribe("notification");
        drop(bus.subscribe("notification"));
        bus.publish("notification", serde_json::json!({"n": 1}));
        let event = slow.recv().await.unwrap();
        assert_eq!(event.payload["n"], 1);
    }
}
