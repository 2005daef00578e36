//! `gobby-worktrees`: create and inspect git worktree isolation, and
//! trigger the stale sweep the orchestrator implements.

use super::{required_str, ToolNamespace};
use crate::spec::ToolSpec;
use async_trait::async_trait;
use gobby_agents::AgentOrchestrator;
use gobby_core::GobbyError;
use gobby_store::Store;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct WorktreesNamespace {
    store: Store,
    orchestrator: Arc<AgentOrchestrator>,
    specs: Vec<ToolSpec>,
}

impl WorktreesNamespace {
    pub fn new(store: Store, orchestrator: Arc<AgentOrchestrator>) -> Self {
        let specs = vec![
            ToolSpec {
                name: "list_worktrees".into(),
                description: "List worktrees for a project.".into(),
                category: "worktrees".into(),
                parameters: json!({"type": "object", "properties": {"project_id": {"type": "string"}}, "required": ["project_id"]}),
            },
            ToolSpec {
                name: "get_worktree".into(),
                description: "Fetch a worktree by id.".into(),
                category: "worktrees".into(),
                parameters: json!({"type": "object", "properties": {"worktree_id": {"type": "string"}}, "required": ["worktree_id"]}),
            },
            ToolSpec {
                name: "sweep_stale_worktrees".into(),
                description: "Remove git worktrees whose status is stale, merged, or abandoned.".into(),
                category: "worktrees".into(),
                parameters: json!({"type": "object", "properties": {}}),
            },
        ];
        Self { store, orchestrator, specs }
    }
}

#[async_trait]
impl ToolNamespace for WorktreesNamespace {
    fn name(&self) -> &'static str {
        "gobby-worktrees"
    }

    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn call(&self, _session_id: &str, tool: &str, args: Value) -> Result<Value, GobbyError> {
        match tool {
            "list_worktrees" => {
                let project_id = required_str(&args, "project_id")?;
                let worktrees = self.store.worktrees().list_by_project(project_id).map_err(|e| GobbyError::Internal(e.to_string()))?;
                Ok(serde_json::to_value(worktrees).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            "get_worktree" => {
                let worktree_id = required_str(&args, "worktree_id")?;
                let worktree = self.store.worktrees().get(worktree_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("worktree", worktree_id))?;
                Ok(serde_json::to_value(worktree).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            "sweep_stale_worktrees" => {
                let removed = self.orchestrator.sweep_stale_worktrees()?;
                Ok(json!({"removed": removed}))
            }
            other => Err(GobbyError::not_found("tool", other)),
        }
    }
}
