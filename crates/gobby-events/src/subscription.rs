//! Per-client event-type allow-list and the relay loop that applies it.
//!
//! The WebSocket transport itself (accepting connections, framing) is the
//! HTTP surface's job; this module only owns the filtering and the
//! broadcast-to-per-client-channel forwarding, so it can be reused by any
//! transport that hands it an outbound `mpsc::Sender`.

use crate::bus::EventBus;
use crate::event::GobbyEvent;
use tokio::sync::{broadcast, mpsc};

/// `None` means "no filter", i.e. the client receives every event type.
#[derive(Debug, Clone, Default)]
pub struct EventTypeFilter {
    allow: Option<Vec<String>>,
}

impl EventTypeFilter {
    pub fn all() -> Self {
        Self { allow: None }
    }

    pub fn only(types: impl IntoIterator<Item = String>) -> Self {
        Self { allow: Some(types.into_iter().collect()) }
    }

    pub fn matches(&self, event: &GobbyEvent) -> bool {
        match &self.allow {
            None => true,
            Some(types) => types.iter().any(|t| t == &event.event_type),
        }
    }
}

/// Subscribe to `bus` and forward matching events to `out` until `out` is
/// dropped or the bus is closed. A lagging relay logs and keeps going: one
/// slow client never starves the others subscribed to the same bus.
pub async fn relay_to_client(bus: &EventBus, filter: EventTypeFilter, out: mpsc::Sender<GobbyEvent>) {
    let mut rx = bus.subscribe();
    loop {
        match rx.recv().await {
            Ok(event) => {
                if filter.matches(&event) && out.send(event).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event relay lagged, dropping buffered events for this client");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_all_matches_everything() {
        let filter = EventTypeFilter::all();
        let event = GobbyEvent::new("task.created", None, json!({}));
        assert!(filter.matches(&event));
    }

    #[test]
    fn test_filter_only_rejects_unlisted_type() {
        let filter = EventTypeFilter::only(["task.created".to_string()]);
        assert!(filter.matches(&GobbyEvent::new("task.created", None, json!({}))));
        assert!(!filter.matches(&GobbyEvent::new("session.started", None, json!({}))));
    }

    #[tokio::test]
    async fn test_relay_forwards_only_matching_events() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::channel(8);
        let filter = EventTypeFilter::only(["task.created".to_string()]);
        let bus_clone = bus.clone();
        let relay = tokio::spawn(async move { relay_to_client(&bus_clone, filter, tx).await });

        // give the relay a moment to subscribe
        tokio::task::yield_now().await;
        bus.publish(GobbyEvent::new("session.started", None, json!({})));
        bus.publish(GobbyEvent::new("task.created", None, json!({"id": "t1"})));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, "task.created");

        drop(rx);
        let _ = relay.await;
    }
}
