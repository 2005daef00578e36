//! `gobby-sessions`: session lookup plus the inter-agent messaging
//! primitives that ride on `AgentOrchestrator`.

use super::{optional_str, required_str, ToolNamespace};
use crate::spec::ToolSpec;
use async_trait::async_trait;
use gobby_agents::AgentOrchestrator;
use gobby_core::GobbyError;
use gobby_store::Store;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct SessionsNamespace {
    store: Store,
    orchestrator: Arc<AgentOrchestrator>,
    specs: Vec<ToolSpec>,
}

impl SessionsNamespace {
    pub fn new(store: Store, orchestrator: Arc<AgentOrchestrator>) -> Self {
        let specs = vec![
            ToolSpec {
                name: "get_session".into(),
                description: "Fetch a session by id or #seq reference.".into(),
                category: "sessions".into(),
                parameters: json!({"type": "object", "properties": {"session_ref": {"type": "string"}, "project_id": {"type": "string"}}, "required": ["session_ref"]}),
            },
            ToolSpec {
                name: "list_sessions".into(),
                description: "List sessions for a project.".into(),
                category: "sessions".into(),
                parameters: json!({"type": "object", "properties": {"project_id": {"type": "string"}}, "required": ["project_id"]}),
            },
            ToolSpec {
                name: "send_message".into(),
                description: "Send a message to another session (e.g. parent/child agent handoff).".into(),
                category: "sessions".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {"to_session": {"type": "string"}, "content": {"type": "string"}, "urgent": {"type": "boolean"}},
                    "required": ["to_session", "content"]
                }),
            },
            ToolSpec {
                name: "poll_messages".into(),
                description: "List unread messages addressed to the current session.".into(),
                category: "sessions".into(),
                parameters: json!({"type": "object", "properties": {}}),
            },
            ToolSpec {
                name: "mark_message_read".into(),
                description: "Mark a message read; idempotent.".into(),
                category: "sessions".into(),
                parameters: json!({"type": "object", "properties": {"message_id": {"type": "string"}}, "required": ["message_id"]}),
            },
        ];
        Self { store, orchestrator, specs }
    }
}

#[async_trait]
impl ToolNamespace for SessionsNamespace {
    fn name(&self) -> &'static str {
        "gobby-sessions"
    }

    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn call(&self, session_id: &str, tool: &str, args: Value) -> Result<Value, GobbyError> {
        match tool {
            "get_session" => {
                let session_ref = required_str(&args, "session_ref")?;
                let resolved = self.store.resolve_session_ref(session_ref, optional_str(&args, "project_id"))?;
                let session = self.store.sessions().get(&resolved).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("session", session_ref))?;
                Ok(serde_json::to_value(session).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            "list_sessions" => {
                let project_id = required_str(&args, "project_id")?;
                let ids = self.store.sessions().list_by_project(project_id).map_err(|e| GobbyError::Internal(e.to_string()))?;
                Ok(serde_json::to_value(ids).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            "send_message" => {
                let to_session = required_str(&args, "to_session")?;
                let content = required_str(&args, "content")?;
                let urgent = args.get("urgent").and_then(Value::as_bool).unwrap_or(false);
                let id = self.orchestrator.send_message(session_id, to_session, content, urgent)?;
                Ok(json!({"message_id": id}))
            }
            "poll_messages" => {
                let messages = self.orchestrator.poll_messages(session_id)?;
                Ok(serde_json::to_value(messages).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            "mark_message_read" => {
                let message_id = required_str(&args, "message_id")?;
                self.orchestrator.mark_read(message_id)?;
                Ok(json!({"marked_read": true}))
            }
            other => Err(GobbyError::not_found("tool", other)),
        }
    }
}
