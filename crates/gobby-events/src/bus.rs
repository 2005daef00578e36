//! In-process pub/sub over a `tokio::sync::broadcast` channel.
//!
//! `publish` never blocks on a subscriber: a slow or closed receiver only
//! costs that receiver events (it lags and drops the oldest), producers are
//! never slowed down.

use crate::event::GobbyEvent;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GobbyEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast to every current subscriber. Returns the number of
    /// receivers the event was handed to (0 if nobody is listening).
    pub fn publish(&self, event: GobbyEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GobbyEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let delivered = bus.publish(GobbyEvent::new("task.created", None, json!({"id": "t1"})));
        assert_eq!(delivered, 2);

        assert_eq!(a.recv().await.unwrap().event_type, "task.created");
        assert_eq!(b.recv().await.unwrap().event_type, "task.created");
    }

    #[tokio::test]
    async fn test_publish_with_no_subscribers_does_not_error() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(GobbyEvent::new("session.started", None, json!({}))), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_does_not_block_producer() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();
        for i in 0..5 {
            bus.publish(GobbyEvent::new("x", None, json!({ "i": i })));
        }
        // rx missed some, but the loop above never blocked on it.
        let err = rx.recv().await.unwrap_err();
        assert!(matches!(err, broadcast::error::RecvError::Lagged(_)));
    }
}
