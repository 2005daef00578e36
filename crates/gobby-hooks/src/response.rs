//! The response model every hook call gets back: `{decision, message?,
//! inject_context?, modify_request?}`.

use gobby_core::Decision;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookResponse {
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inject_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modify_request: Option<Value>,
}

impl HookResponse {
    pub fn allow() -> Self {
        Self { decision: Decision::Allow, message: None, inject_context: None, modify_request: None }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self { decision: Decision::Deny, message: Some(message.into()), inject_context: None, modify_request: None }
    }

    pub fn ask(message: impl Into<String>) -> Self {
        Self { decision: Decision::Ask, message: Some(message.into()), inject_context: None, modify_request: None }
    }

    pub fn with_inject_context(mut self, context: impl Into<String>) -> Self {
        self.inject_context = Some(context.into());
        self
    }

    pub fn with_modify_request(mut self, value: Value) -> Self {
        self.modify_request = Some(value);
        self
    }

    pub fn is_deny(&self) -> bool {
        self.decision == Decision::Deny
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_has_no_message() {
        let resp = HookResponse::allow();
        assert_eq!(resp.decision, Decision::Allow);
        assert!(resp.message.is_none());
    }

    #[test]
    fn test_deny_carries_message_and_is_deny() {
        let resp = HookResponse::deny("blocked by rule x");
        assert!(resp.is_deny());
        assert_eq!(resp.message.as_deref(), Some("blocked by rule x"));
    }

    #[test]
    fn test_builder_methods_chain() {
        let resp = HookResponse::allow().with_inject_context("ctx").with_modify_request(serde_json::json!({"a": 1}));
        assert_eq!(resp.inject_context.as_deref(), Some("ctx"));
        assert_eq!(resp.modify_request, Some(serde_json::json!({"a": 1})));
    }
}
