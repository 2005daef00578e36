//! `gobby-workflows`: read access to workflow state and the allowed-tools
//! projection every other namespace's listing is filtered through.

use super::{required_str, ToolNamespace};
use crate::spec::ToolSpec;
use async_trait::async_trait;
use gobby_core::GobbyError;
use gobby_store::Store;
use gobby_workflow::WorkflowEngine;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct WorkflowsNamespace {
    store: Store,
    engine: Arc<WorkflowEngine>,
    specs: Vec<ToolSpec>,
}

impl WorkflowsNamespace {
    pub fn new(store: Store, engine: Arc<WorkflowEngine>) -> Self {
        let specs = vec![
            ToolSpec {
                name: "get_workflow_state".into(),
                description: "Fetch the active workflow state for a session: phase, counters, variables.".into(),
                category: "workflows".into(),
                parameters: json!({"type": "object", "properties": {"session_id": {"type": "string"}}, "required": ["session_id"]}),
            },
            ToolSpec {
                name: "list_allowed_tools".into(),
                description: "List which tools from a universe the session's current phase permits.".into(),
                category: "workflows".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {"session_id": {"type": "string"}, "universe": {"type": "array", "items": {"type": "string"}}},
                    "required": ["session_id", "universe"]
                }),
            },
        ];
        Self { store, engine, specs }
    }
}

#[async_trait]
impl ToolNamespace for WorkflowsNamespace {
    fn name(&self) -> &'static str {
        "gobby-workflows"
    }

    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn call(&self, _session_id: &str, tool: &str, args: Value) -> Result<Value, GobbyError> {
        match tool {
            "get_workflow_state" => {
                let session_id = required_str(&args, "session_id")?;
                let state = self
                    .store
                    .workflow_states()
                    .get(session_id)
                    .map_err(|e| GobbyError::Internal(e.to_string()))?
                    .ok_or_else(|| GobbyError::not_found("workflow_state", session_id))?;
                Ok(serde_json::to_value(state).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            "list_allowed_tools" => {
                let session_id = required_str(&args, "session_id")?;
                let universe: Vec<String> = args.get("universe").and_then(Value::as_array).map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()).unwrap_or_default();
                let allowed = self.engine.list_allowed_tools(session_id, &universe)?;
                Ok(json!({"allowed": allowed}))
            }
            other => Err(GobbyError::not_found("tool", other)),
        }
    }
}
