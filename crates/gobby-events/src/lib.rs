//! The event bus: in-process pub/sub plus the WebSocket relay filter and
//! the webhook fan-out, the two outbound sinks of `GobbyEvent`.

pub mod bus;
pub mod event;
pub mod subscription;
pub mod webhook;

pub use bus::EventBus;
pub use event::GobbyEvent;
pub use subscription::{relay_to_client, EventTypeFilter};
pub use webhook::{WebhookDispatcher, WebhookEndpoint, WebhookVeto};
