//! Outbound webhook fan-out: best-effort delivery with exponential backoff,
//! plus the blocking/veto variant used for synchronous hook decisions.

use crate::event::GobbyEvent;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_secs(4);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct WebhookEndpoint {
    pub url: String,
    /// Event types this endpoint receives. Empty means every event.
    pub event_types: Vec<String>,
    pub can_block: bool,
    pub headers: HashMap<String, String>,
    pub retry_count: u32,
    pub timeout: Duration,
}

impl WebhookEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            event_types: Vec::new(),
            can_block: false,
            headers: HashMap::new(),
            retry_count: 3,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn accepts(&self, event_type: &str) -> bool {
        self.event_types.is_empty() || self.event_types.iter().any(|t| t == event_type)
    }
}

/// A `{"decision":"deny","reason":...}` webhook body surfaced back through
/// the hook pipeline as a veto of the in-flight tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookVeto {
    pub reason: String,
}

fn parse_veto(body: &Value) -> Option<WebhookVeto> {
    if body.get("decision").and_then(Value::as_str) == Some("deny") {
        let reason = body.get("reason").and_then(Value::as_str).unwrap_or("webhook denied").to_string();
        Some(WebhookVeto { reason })
    } else {
        None
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

pub struct WebhookDispatcher {
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    async fn post(&self, endpoint: &WebhookEndpoint, event: &GobbyEvent) -> Result<reqwest::Response, reqwest::Error> {
        let mut req = self.client.post(&endpoint.url).timeout(endpoint.timeout).json(event);
        for (key, value) in &endpoint.headers {
            req = req.header(key, value);
        }
        req.send().await
    }

    /// Block on a single attempt and surface a veto if the endpoint denies.
    /// A transport failure or timeout fails open (returns `None`) per the
    /// "blocking webhooks that time out return allow" propagation rule.
    pub async fn dispatch_blocking(&self, endpoint: &WebhookEndpoint, event: &GobbyEvent) -> Option<WebhookVeto> {
        if !endpoint.accepts(&event.event_type) {
            return None;
        }
        match self.post(endpoint, event).await {
            Ok(resp) => {
                let body: Value = resp.json().await.unwrap_or_else(|_| Value::Null);
                parse_veto(&body)
            }
            Err(error) => {
                tracing::warn!(url = %endpoint.url, %error, "blocking webhook call failed, failing open");
                None
            }
        }
    }

    /// Fire-and-forget delivery, retried with exponential backoff (1s, 2s,
    /// 4s) up to `retry_count` attempts. Never surfaces a veto: by the time
    /// a retry round finishes the triggering tool call has long returned.
    pub async fn dispatch_best_effort(&self, endpoint: &WebhookEndpoint, event: &GobbyEvent) {
        if !endpoint.accepts(&event.event_type) {
            return;
        }
        let attempts = endpoint.retry_count.max(1);
        let mut delay = Duration::from_secs(1);
        for attempt in 1..=attempts {
            match self.post(endpoint, event).await {
                Ok(_) => return,
                Err(error) => {
                    if attempt == attempts {
                        tracing::error!(url = %endpoint.url, attempts, %error, "webhook delivery exhausted retries, dropping event");
                        return;
                    }
                    tracing::warn!(url = %endpoint.url, attempt, %error, "webhook delivery attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = next_backoff(delay);
                }
            }
        }
    }

    /// Route to the blocking or best-effort path per the endpoint's config.
    pub async fn dispatch(&self, endpoint: &WebhookEndpoint, event: &GobbyEvent) -> Option<WebhookVeto> {
        if endpoint.can_block {
            self.dispatch_blocking(endpoint, event).await
        } else {
            self.dispatch_best_effort(endpoint, event).await;
            None
        }
    }
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_accepts_empty_allow_list() {
        let endpoint = WebhookEndpoint::new("http://localhost/hook");
        assert!(endpoint.accepts("task.created"));
    }

    #[test]
    fn test_endpoint_accepts_filters_by_type() {
        let mut endpoint = WebhookEndpoint::new("http://localhost/hook");
        endpoint.event_types = vec!["task.created".into()];
        assert!(endpoint.accepts("task.created"));
        assert!(!endpoint.accepts("session.started"));
    }

    #[test]
    fn test_parse_veto_on_deny_body() {
        let body = json!({"decision": "deny", "reason": "policy violation"});
        let veto = parse_veto(&body).unwrap();
        assert_eq!(veto.reason, "policy violation");
    }

    #[test]
    fn test_parse_veto_none_on_allow_body() {
        let body = json!({"decision": "allow"});
        assert!(parse_veto(&body).is_none());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let d1 = Duration::from_secs(1);
        let d2 = next_backoff(d1);
        let d3 = next_backoff(d2);
        let d4 = next_backoff(d3);
        assert_eq!(d2, Duration::from_secs(2));
        assert_eq!(d3, Duration::from_secs(4));
        assert_eq!(d4, Duration::from_secs(4));
    }
}
