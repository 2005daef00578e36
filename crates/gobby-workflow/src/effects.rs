//! Declarative side effects produced by `on_enter`/`on_exit`/lifecycle
//! actions. The engine applies the ones that are purely about its own
//! state (`SetVariable`, `IncrementVariable`, `CaptureArtifact`) directly;
//! everything that reaches another subsystem (LLM, webhook, MCP tool, task
//! persistence) is returned to the caller to execute, keeping the engine
//! free of a dependency on every crate a workflow might touch.

use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ContextSource {
    PreviousSessionSummary,
    Handoff,
    Artifacts,
    Observations,
    WorkflowState,
    Skills,
    TaskContext,
    Memories,
}

impl ContextSource {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "previous_session_summary" => Self::PreviousSessionSummary,
            "handoff" => Self::Handoff,
            "artifacts" => Self::Artifacts,
            "observations" => Self::Observations,
            "workflow_state" => Self::WorkflowState,
            "skills" => Self::Skills,
            "task_context" => Self::TaskContext,
            "memories" => Self::Memories,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    InjectContext(Vec<ContextSource>),
    InjectMessage(String),
    CallLlm { prompt: String, output_as: String },
    GenerateSummary,
    SynthesizeTitle,
    WriteTodos,
    MarkTodoComplete { id: String },
    PersistTasks { source: String, create_dependencies: bool, link_to_session: bool },
    CallMcpTool { server: String, tool: String, args: Value },
    Webhook { url: String, event: String, can_block: bool, headers: BTreeMap<String, String> },
    FindParentSession,
    RestoreContext,
    MarkSessionStatus(String),
    SwitchMode(String),
    Unknown { kind: String },
}

fn str_arg(args: &BTreeMap<String, Value>, key: &str) -> String {
    args.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn bool_arg(args: &BTreeMap<String, Value>, key: &str) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Translate a raw [`crate::definition::Action`] into the typed effect
/// union. Unrecognized `kind`s surface as `Unknown` rather than erroring,
/// matching the engine's fail-open action semantics.
pub fn from_action(action: &crate::definition::Action) -> Effect {
    let args = &action.args;
    match action.kind.as_str() {
        "inject_context" => {
            let sources = match args.get("source") {
                Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().and_then(ContextSource::parse)).collect(),
                Some(Value::String(s)) => ContextSource::parse(s).into_iter().collect(),
                _ => Vec::new(),
            };
            Effect::InjectContext(sources)
        }
        "inject_message" => Effect::InjectMessage(str_arg(args, "template")),
        "call_llm" => Effect::CallLlm { prompt: str_arg(args, "prompt"), output_as: str_arg(args, "output_as") },
        "generate_summary" => Effect::GenerateSummary,
        "synthesize_title" => Effect::SynthesizeTitle,
        "write_todos" => Effect::WriteTodos,
        "mark_todo_complete" => Effect::MarkTodoComplete { id: str_arg(args, "id") },
        "persist_tasks" => Effect::PersistTasks {
            source: str_arg(args, "source"),
            create_dependencies: bool_arg(args, "create_dependencies"),
            link_to_session: bool_arg(args, "link_to_session"),
        },
        "call_mcp_tool" => Effect::CallMcpTool {
            server: str_arg(args, "server"),
            tool: str_arg(args, "tool"),
            args: args.get("args").cloned().unwrap_or(Value::Null),
        },
        "webhook" => Effect::Webhook {
            url: str_arg(args, "url"),
            event: str_arg(args, "event"),
            can_block: bool_arg(args, "can_block"),
            headers: match args.get("headers") {
                Some(Value::Object(map)) => map.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect(),
                _ => BTreeMap::new(),
            },
        },
        "find_parent_session" => Effect::FindParentSession,
        "restore_context" => Effect::RestoreContext,
        "mark_session_status" => Effect::MarkSessionStatus(str_arg(args, "status")),
        "switch_mode" => Effect::SwitchMode(str_arg(args, "mode")),
        other => Effect::Unknown { kind: other.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Action;
    use serde_json::json;

    fn action(kind: &str, args: &[(&str, Value)]) -> Action {
        Action { kind: kind.to_string(), args: args.iter().map(|(k, v)| (k.to_string(), v.clone())).collect() }
    }

    #[test]
    fn test_inject_context_array_form() {
        let a = action("inject_context", &[("source", json!(["handoff", "artifacts"]))]);
        let effect = from_action(&a);
        assert_eq!(effect, Effect::InjectContext(vec![ContextSource::Handoff, ContextSource::Artifacts]));
    }

    #[test]
    fn test_webhook_action_fields() {
        let a = action("webhook", &[("url", json!("http://x")), ("event", json!("task.created")), ("can_block", json!(true))]);
        let effect = from_action(&a);
        assert_eq!(effect, Effect::Webhook { url: "http://x".into(), event: "task.created".into(), can_block: true, headers: BTreeMap::new() });
    }

    #[test]
    fn test_unknown_kind_is_not_an_error() {
        let a = action("frobnicate", &[]);
        assert_eq!(from_action(&a), Effect::Unknown { kind: "frobnicate".into() });
    }
}
