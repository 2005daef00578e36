//! The uniform event every CLI hook call is normalized into before it
//! reaches the dispatcher pipeline.

use gobby_core::CliSource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEventType {
    SessionStart,
    SessionEnd,
    PromptSubmit,
    ToolCall,
    ToolResult,
    BeforeAgent,
}

impl HookEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStart => "session_start",
            Self::SessionEnd => "session_end",
            Self::PromptSubmit => "prompt_submit",
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::BeforeAgent => "before_agent",
        }
    }
}

/// A source-CLI payload normalized into the one shape every handler and the
/// dispatcher's core logic understand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookEvent {
    pub event_type: HookEventType,
    pub source: CliSource,
    pub session_id: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl HookEvent {
    pub fn new(event_type: HookEventType, source: CliSource, session_id: Option<String>, data: Value) -> Self {
        Self { event_type, source, session_id, data }
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.data.get("tool").and_then(Value::as_str)
    }

    pub fn tool_args(&self) -> Value {
        self.data.get("args").cloned().unwrap_or(Value::Null)
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.data.get("last_user_message").and_then(Value::as_str)
    }

    pub fn cwd(&self) -> Option<&str> {
        self.data.get("cwd").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_str_is_snake_case_and_unique() {
        let all = [
            HookEventType::SessionStart,
            HookEventType::SessionEnd,
            HookEventType::PromptSubmit,
            HookEventType::ToolCall,
            HookEventType::ToolResult,
            HookEventType::BeforeAgent,
        ];
        let mut seen = std::collections::HashSet::new();
        for event in all {
            assert!(seen.insert(event.as_str()));
        }
    }

    #[test]
    fn test_tool_name_and_args_extraction() {
        let event = HookEvent::new(
            HookEventType::ToolCall,
            CliSource::ClaudeCode,
            Some("sess-1".into()),
            json!({"tool": "Bash", "args": {"command": "ls"}}),
        );
        assert_eq!(event.tool_name(), Some("Bash"));
        assert_eq!(event.tool_args(), json!({"command": "ls"}));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let event = HookEvent::new(HookEventType::SessionStart, CliSource::Codex, None, Value::Null);
        assert_eq!(event.tool_name(), None);
        assert_eq!(event.last_user_message(), None);
    }
}
