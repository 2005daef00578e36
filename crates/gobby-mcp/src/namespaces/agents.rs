//! `gobby-agents`: spawn, kill, and inspect subagents. Thin wrapper over
//! `AgentOrchestrator`; argument parsing is the only logic here.

use super::{optional_str, required_str, ToolNamespace};
use crate::spec::ToolSpec;
use async_trait::async_trait;
use gobby_agents::{AgentOrchestrator, SpawnParams};
use gobby_core::{GobbyError, IsolationMode, SpawnMode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct AgentsNamespace {
    orchestrator: Arc<AgentOrchestrator>,
    specs: Vec<ToolSpec>,
}

fn parse_isolation(raw: Option<&str>) -> IsolationMode {
    match raw {
        Some("worktree") => IsolationMode::Worktree,
        Some("clone") => IsolationMode::Clone,
        _ => IsolationMode::Current,
    }
}

fn parse_mode(raw: Option<&str>) -> SpawnMode {
    match raw {
        Some("terminal") => SpawnMode::Terminal,
        Some("embedded") => SpawnMode::Embedded,
        Some("headless") => SpawnMode::Headless,
        _ => SpawnMode::InProcess,
    }
}

impl AgentsNamespace {
    pub fn new(orchestrator: Arc<AgentOrchestrator>) -> Self {
        let specs = vec![
            ToolSpec {
                name: "spawn_agent".into(),
                description: "Spawn a subagent into the current, a worktree, or a clone workspace.".into(),
                category: "agents".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "binary": {"type": "string"},
                        "prompt": {"type": "string"},
                        "provider": {"type": "string"},
                        "model": {"type": "string"},
                        "isolation": {"type": "string", "enum": ["current", "worktree", "clone"]},
                        "mode": {"type": "string", "enum": ["in_process", "headless", "terminal", "embedded"]},
                        "branch_prefix": {"type": "string"},
                        "task_id": {"type": "string"},
                        "workflow": {"type": "string"},
                        "idle_timeout_secs": {"type": "integer"}
                    },
                    "required": ["project_id", "prompt"]
                }),
            },
            ToolSpec {
                name: "kill_agent".into(),
                description: "Terminate a running agent run by id.".into(),
                category: "agents".into(),
                parameters: json!({"type": "object", "properties": {"run_id": {"type": "string"}, "timeout_secs": {"type": "integer"}}, "required": ["run_id"]}),
            },
            ToolSpec {
                name: "list_running_agents".into(),
                description: "List the daemon's in-memory registry of running agent runs.".into(),
                category: "agents".into(),
                parameters: json!({"type": "object", "properties": {}}),
            },
        ];
        Self { orchestrator, specs }
    }
}

#[async_trait]
impl ToolNamespace for AgentsNamespace {
    fn name(&self) -> &'static str {
        "gobby-agents"
    }

    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn call(&self, session_id: &str, tool: &str, args: Value) -> Result<Value, GobbyError> {
        match tool {
            "spawn_agent" => {
                let project_id = required_str(&args, "project_id")?.to_string();
                let prompt = required_str(&args, "prompt")?.to_string();
                let idle_timeout = Duration::from_secs(args.get("idle_timeout_secs").and_then(Value::as_u64).unwrap_or(900));
                let params = SpawnParams {
                    parent_session_id: session_id.to_string(),
                    project_id,
                    binary: optional_str(&args, "binary").unwrap_or("gobby-agent").to_string(),
                    args: vec![],
                    base_prompt: prompt,
                    provider_name: optional_str(&args, "provider").unwrap_or("noop").to_string(),
                    model: optional_str(&args, "model").map(String::from),
                    isolation: parse_isolation(optional_str(&args, "isolation")),
                    mode: parse_mode(optional_str(&args, "mode")),
                    branch_prefix: optional_str(&args, "branch_prefix").unwrap_or("agent").to_string(),
                    branch_name: None,
                    task_id: optional_str(&args, "task_id").map(String::from),
                    workflow_name: optional_str(&args, "workflow").map(String::from),
                    idle_timeout,
                    env: HashMap::new(),
                };
                let outcome = self.orchestrator.start_agent(params).await?;
                Ok(json!({"run_id": outcome.run_id, "child_session_id": outcome.child_session_id, "workspace_path": outcome.workspace_path}))
            }
            "kill_agent" => {
                let run_id = required_str(&args, "run_id")?;
                let timeout = Duration::from_secs(args.get("timeout_secs").and_then(Value::as_u64).unwrap_or(10));
                self.orchestrator.kill(run_id, timeout).await?;
                Ok(json!({"killed": true}))
            }
            "list_running_agents" => {
                let registry = self.orchestrator.registry();
                Ok(json!({"count": registry.len()}))
            }
            other => Err(GobbyError::not_found("tool", other)),
        }
    }
}
