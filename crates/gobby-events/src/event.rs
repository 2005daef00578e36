//! The event envelope every producer in the daemon publishes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One broadcastable occurrence. `event_type` is a dotted namespace
/// (`task.created`, `session.handoff_ready`, `hook.decision`) used both for
/// webhook routing and WebSocket client subscription filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GobbyEvent {
    pub event_type: String,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

impl GobbyEvent {
    pub fn new(event_type: impl Into<String>, session_id: Option<String>, payload: Value) -> Self {
        Self { event_type: event_type.into(), session_id, timestamp: Utc::now(), payload }
    }
}
