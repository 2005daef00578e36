//! `gobby-orchestration`: the blocking coordination primitives that don't
//! belong to a single entity — waiting on task completion and driving a
//! merge attempt through the tiered AI-resolution escalation.

use super::{required_str, ToolNamespace};
use crate::spec::ToolSpec;
use async_trait::async_trait;
use gobby_agents::AgentOrchestrator;
use gobby_core::GobbyError;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub struct OrchestrationNamespace {
    orchestrator: Arc<AgentOrchestrator>,
    specs: Vec<ToolSpec>,
}

impl OrchestrationNamespace {
    pub fn new(orchestrator: Arc<AgentOrchestrator>) -> Self {
        let specs = vec![
            ToolSpec {
                name: "wait_for_task".into(),
                description: "Block until a task leaves in_progress or the timeout elapses.".into(),
                category: "orchestration".into(),
                parameters: json!({"type": "object", "properties": {"task_id": {"type": "string"}, "timeout_secs": {"type": "integer"}}, "required": ["task_id"]}),
            },
            ToolSpec {
                name: "wait_for_any_task".into(),
                description: "Block until the first of several tasks leaves in_progress.".into(),
                category: "orchestration".into(),
                parameters: json!({"type": "object", "properties": {"task_ids": {"type": "array", "items": {"type": "string"}}, "timeout_secs": {"type": "integer"}}, "required": ["task_ids"]}),
            },
            ToolSpec {
                name: "wait_for_all_tasks".into(),
                description: "Block until every given task leaves in_progress or the timeout elapses.".into(),
                category: "orchestration".into(),
                parameters: json!({"type": "object", "properties": {"task_ids": {"type": "array", "items": {"type": "string"}}, "timeout_secs": {"type": "integer"}}, "required": ["task_ids"]}),
            },
            ToolSpec {
                name: "merge_start".into(),
                description: "Attempt to merge a branch, escalating through conflict-only then full-file AI resolution before surfacing a human-review outcome.".into(),
                category: "orchestration".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "repo_path": {"type": "string"},
                        "source_branch": {"type": "string"},
                        "target_branch": {"type": "string"},
                        "worktree_id": {"type": "string"},
                        "clone_id": {"type": "string"}
                    },
                    "required": ["repo_path", "source_branch", "target_branch"]
                }),
            },
        ];
        Self { orchestrator, specs }
    }
}

fn timeout_of(args: &Value) -> Duration {
    Duration::from_secs(args.get("timeout_secs").and_then(Value::as_u64).unwrap_or(300))
}

fn task_ids_of(args: &Value) -> Vec<String> {
    args.get("task_ids").and_then(Value::as_array).map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()).unwrap_or_default()
}

#[async_trait]
impl ToolNamespace for OrchestrationNamespace {
    fn name(&self) -> &'static str {
        "gobby-orchestration"
    }

    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn call(&self, _session_id: &str, tool: &str, args: Value) -> Result<Value, GobbyError> {
        match tool {
            "wait_for_task" => {
                let task_id = required_str(&args, "task_id")?;
                let outcome = self.orchestrator.wait_for_task(task_id, timeout_of(&args)).await?;
                Ok(json!({"outcome": format!("{outcome:?}")}))
            }
            "wait_for_any_task" => {
                let task_ids = task_ids_of(&args);
                let (task_id, outcome) = self.orchestrator.wait_for_any_task(&task_ids, timeout_of(&args)).await?;
                Ok(json!({"task_id": task_id, "outcome": format!("{outcome:?}")}))
            }
            "wait_for_all_tasks" => {
                let task_ids = task_ids_of(&args);
                let statuses = self.orchestrator.wait_for_all_tasks(&task_ids, timeout_of(&args)).await?;
                Ok(serde_json::to_value(statuses).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            "merge_start" => {
                let repo_path = PathBuf::from(required_str(&args, "repo_path")?);
                let source_branch = required_str(&args, "source_branch")?;
                let target_branch = required_str(&args, "target_branch")?;
                let worktree_id = args.get("worktree_id").and_then(Value::as_str);
                let clone_id = args.get("clone_id").and_then(Value::as_str);
                let outcome = self.orchestrator.merge_start(&repo_path, source_branch, target_branch, worktree_id, clone_id).await?;
                Ok(json!({"outcome": format!("{outcome:?}")}))
            }
            other => Err(GobbyError::not_found("tool", other)),
        }
    }
}
