//! `gobby-clones`: the shallow-clone isolation counterpart to worktrees —
//! creation goes through the store directly (the orchestrator's isolation
//! handler does this during spawn), while cleanup scheduling and sweeping
//! go through `AgentOrchestrator` so status transitions stay consistent.

use super::{required_str, ToolNamespace};
use crate::spec::ToolSpec;
use async_trait::async_trait;
use gobby_agents::AgentOrchestrator;
use gobby_core::GobbyError;
use gobby_store::Store;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct ClonesNamespace {
    store: Store,
    orchestrator: Arc<AgentOrchestrator>,
    specs: Vec<ToolSpec>,
}

impl ClonesNamespace {
    pub fn new(store: Store, orchestrator: Arc<AgentOrchestrator>) -> Self {
        let specs = vec![
            ToolSpec {
                name: "list_clones".into(),
                description: "List clone workspaces for a project.".into(),
                category: "clones".into(),
                parameters: json!({"type": "object", "properties": {"project_id": {"type": "string"}}, "required": ["project_id"]}),
            },
            ToolSpec {
                name: "get_clone".into(),
                description: "Fetch a clone by id.".into(),
                category: "clones".into(),
                parameters: json!({"type": "object", "properties": {"clone_id": {"type": "string"}}, "required": ["clone_id"]}),
            },
            ToolSpec {
                name: "schedule_clone_cleanup".into(),
                description: "Mark a clone for cleanup after N days (default 7, per the merged-clone retention window).".into(),
                category: "clones".into(),
                parameters: json!({"type": "object", "properties": {"clone_id": {"type": "string"}, "days": {"type": "integer"}}, "required": ["clone_id"]}),
            },
            ToolSpec {
                name: "sweep_clones".into(),
                description: "Delete clones past their cleanup_after deadline, on disk and in the store.".into(),
                category: "clones".into(),
                parameters: json!({"type": "object", "properties": {}}),
            },
        ];
        Self { store, orchestrator, specs }
    }
}

#[async_trait]
impl ToolNamespace for ClonesNamespace {
    fn name(&self) -> &'static str {
        "gobby-clones"
    }

    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn call(&self, _session_id: &str, tool: &str, args: Value) -> Result<Value, GobbyError> {
        match tool {
            "list_clones" => {
                let project_id = required_str(&args, "project_id")?;
                let clones = self.store.clones().list_by_project(project_id).map_err(|e| GobbyError::Internal(e.to_string()))?;
                Ok(serde_json::to_value(clones).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            "get_clone" => {
                let clone_id = required_str(&args, "clone_id")?;
                let clone = self.store.clones().get(clone_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("clone", clone_id))?;
                Ok(serde_json::to_value(clone).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            "schedule_clone_cleanup" => {
                let clone_id = required_str(&args, "clone_id")?;
                let days = args.get("days").and_then(Value::as_i64).unwrap_or(7);
                self.orchestrator.schedule_clone_cleanup(clone_id, days)?;
                Ok(json!({"scheduled": true}))
            }
            "sweep_clones" => {
                let removed = self.orchestrator.sweep_clones()?;
                Ok(serde_json::to_value(removed).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            other => Err(GobbyError::not_found("tool", other)),
        }
    }
}
