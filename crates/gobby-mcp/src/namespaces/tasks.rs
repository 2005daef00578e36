//! `gobby-tasks`: the task graph surface an agent actually touches —
//! create, inspect, close/reopen, list ready work, and declare
//! dependencies. Thin wrapper over `TaskEngine`; no business logic lives
//! here beyond translating JSON in and `Task` rows out.

use super::{optional_str, required_str, ToolNamespace};
use crate::spec::ToolSpec;
use async_trait::async_trait;
use gobby_core::{DependencyType, GobbyError, TaskType};
use gobby_store::Store;
use gobby_tasks::TaskEngine;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct TasksNamespace {
    store: Store,
    engine: Arc<TaskEngine>,
    specs: Vec<ToolSpec>,
}

impl TasksNamespace {
    pub fn new(store: Store, engine: Arc<TaskEngine>) -> Self {
        let specs = vec![
            ToolSpec {
                name: "create_task".into(),
                description: "Create a task under a project, optionally as a subtask with dependencies.".into(),
                category: "tasks".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "title": {"type": "string"},
                        "description": {"type": "string"},
                        "parent_task_id": {"type": "string"},
                        "priority": {"type": "integer", "minimum": 0, "maximum": 4},
                        "task_type": {"type": "string", "enum": ["bug", "feature", "task", "epic", "chore"]},
                        "labels": {"type": "array", "items": {"type": "string"}},
                        "validation_criteria": {"type": "string"},
                        "blocks": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["project_id", "title"]
                }),
            },
            ToolSpec {
                name: "get_task".into(),
                description: "Fetch a task by id, #seq reference, or prefix.".into(),
                category: "tasks".into(),
                parameters: json!({"type": "object", "properties": {"task_ref": {"type": "string"}, "project_id": {"type": "string"}}, "required": ["task_ref"]}),
            },
            ToolSpec {
                name: "list_ready_tasks".into(),
                description: "List open, unblocked tasks for a project ordered by priority.".into(),
                category: "tasks".into(),
                parameters: json!({"type": "object", "properties": {"project_id": {"type": "string"}}, "required": ["project_id"]}),
            },
            ToolSpec {
                name: "close_task".into(),
                description: "Mark a task closed, routing to review if validation is required.".into(),
                category: "tasks".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "task_ref": {"type": "string"},
                        "agent_depth": {"type": "integer"},
                        "commit_sha": {"type": "string"},
                        "force_complete": {"type": "boolean"}
                    },
                    "required": ["task_ref"]
                }),
            },
            ToolSpec {
                name: "reopen_task".into(),
                description: "Reopen a closed or escalated task.".into(),
                category: "tasks".into(),
                parameters: json!({"type": "object", "properties": {"task_ref": {"type": "string"}}, "required": ["task_ref"]}),
            },
            ToolSpec {
                name: "escalate_task".into(),
                description: "Move an open task to escalated, out of the normal close/review flow.".into(),
                category: "tasks".into(),
                parameters: json!({"type": "object", "properties": {"task_ref": {"type": "string"}, "reason": {"type": "string"}}, "required": ["task_ref", "reason"]}),
            },
            ToolSpec {
                name: "add_dependency".into(),
                description: "Declare that a task depends on, relates to, or was discovered from another.".into(),
                category: "tasks".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "task_ref": {"type": "string"},
                        "depends_on": {"type": "string"},
                        "dep_type": {"type": "string", "enum": ["blocks", "related", "discovered_from"]}
                    },
                    "required": ["task_ref", "depends_on"]
                }),
            },
        ];
        Self { store, engine, specs }
    }

    fn resolve(&self, task_ref: &str, project_id: Option<&str>) -> Result<String, GobbyError> {
        self.store.resolve_task_ref(task_ref, project_id)
    }
}

fn parse_task_type(raw: Option<&str>) -> TaskType {
    match raw {
        Some("bug") => TaskType::Bug,
        Some("feature") => TaskType::Feature,
        Some("epic") => TaskType::Epic,
        Some("chore") => TaskType::Chore,
        _ => TaskType::Task,
    }
}

fn parse_dep_type(raw: Option<&str>) -> DependencyType {
    match raw {
        Some("related") => DependencyType::Related,
        Some("discovered_from") => DependencyType::DiscoveredFrom,
        _ => DependencyType::Blocks,
    }
}

#[async_trait]
impl ToolNamespace for TasksNamespace {
    fn name(&self) -> &'static str {
        "gobby-tasks"
    }

    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn call(&self, session_id: &str, tool: &str, args: Value) -> Result<Value, GobbyError> {
        match tool {
            "create_task" => {
                let project_id = required_str(&args, "project_id")?;
                let title = required_str(&args, "title")?;
                let description = optional_str(&args, "description").unwrap_or_default();
                let labels = args.get("labels").and_then(Value::as_array).map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()).unwrap_or_default();
                let blocks: Vec<String> = args.get("blocks").and_then(Value::as_array).map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()).unwrap_or_default();
                let priority = args.get("priority").and_then(Value::as_u64).unwrap_or(2) as u8;
                let task = self.engine.create_task(
                    project_id,
                    optional_str(&args, "parent_task_id"),
                    title,
                    description,
                    optional_str(&args, "details"),
                    optional_str(&args, "test_strategy"),
                    priority,
                    parse_task_type(optional_str(&args, "task_type")),
                    labels,
                    optional_str(&args, "validation_criteria"),
                    &blocks,
                )?;
                Ok(serde_json::to_value(task).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            "get_task" => {
                let task_ref = required_str(&args, "task_ref")?;
                let resolved = self.resolve(task_ref, optional_str(&args, "project_id"))?;
                let task = self.store.tasks().get(&resolved).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("task", task_ref))?;
                Ok(serde_json::to_value(task).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            "list_ready_tasks" => {
                let project_id = required_str(&args, "project_id")?;
                let tasks = self.engine.list_ready_tasks(project_id)?;
                Ok(serde_json::to_value(tasks).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            "close_task" => {
                let task_ref = required_str(&args, "task_ref")?;
                let resolved = self.resolve(task_ref, optional_str(&args, "project_id"))?;
                let agent_depth = args.get("agent_depth").and_then(Value::as_u64).unwrap_or(0) as u32;
                let force_complete = args.get("force_complete").and_then(Value::as_bool).unwrap_or(false);
                let status = self.engine.close_task(&resolved, agent_depth, optional_str(&args, "commit_sha"), session_id, force_complete)?;
                Ok(json!({"status": status}))
            }
            "reopen_task" => {
                let task_ref = required_str(&args, "task_ref")?;
                let resolved = self.resolve(task_ref, optional_str(&args, "project_id"))?;
                self.engine.reopen_task(&resolved)?;
                Ok(json!({"reopened": true}))
            }
            "escalate_task" => {
                let task_ref = required_str(&args, "task_ref")?;
                let resolved = self.resolve(task_ref, optional_str(&args, "project_id"))?;
                let reason = required_str(&args, "reason")?;
                self.engine.escalate_task(&resolved, reason)?;
                Ok(json!({"escalated": true}))
            }
            "add_dependency" => {
                let task_ref = required_str(&args, "task_ref")?;
                let resolved = self.resolve(task_ref, optional_str(&args, "project_id"))?;
                let depends_on = required_str(&args, "depends_on")?;
                let resolved_dep = self.resolve(depends_on, optional_str(&args, "project_id"))?;
                self.engine.add_dependency(&resolved, &resolved_dep, parse_dep_type(optional_str(&args, "dep_type")))?;
                Ok(json!({"added": true}))
            }
            other => Err(GobbyError::not_found("tool", other)),
        }
    }
}
