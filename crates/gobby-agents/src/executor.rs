//! `InProcessExecutor`: the fourth spawn mode, driving the agentic loop
//! directly inside the daemon instead of shelling out to a CLI binary.
//! Tool calls are routed through the `HookDispatcher` so the same
//! workflow restrictions bind an in-process agent as bind a real CLI;
//! completion is signalled by a dedicated `complete` tool rather than
//! process exit, mirroring `csa_executor::Executor::execute`'s role as the
//! single place a turn's request gets built and run.

use async_trait::async_trait;
use gobby_core::GobbyError;
use gobby_hooks::{HookDispatcher, HookEvent, HookEventType};
use gobby_llm::{CompletionRequest, LlmProvider, Message, ToolCall, ToolSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const COMPLETE_TOOL_NAME: &str = "complete";

fn complete_tool_schema() -> ToolSchema {
    ToolSchema {
        name: COMPLETE_TOOL_NAME.to_string(),
        description: "Signal that the assigned task is finished.".to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "output": {"type": "string"},
                "status": {"type": "string", "enum": ["done", "review", "blocked"]},
                "artifacts": {"type": "array", "items": {"type": "string"}},
                "files_modified": {"type": "array", "items": {"type": "string"}},
                "next_steps": {"type": "string"}
            },
            "required": ["output", "status"]
        }),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompleteArgs {
    pub output: String,
    pub status: String,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub next_steps: Option<String>,
}

/// Anything beyond `complete` that an in-process agent might call — task
/// and memory tools, surfaced by the MCP layer. Kept abstract here so
/// `gobby-agents` doesn't need to depend on `gobby-mcp`.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn call(&self, name: &str, args: &Value) -> Result<Value, GobbyError>;
    fn schemas(&self) -> Vec<ToolSchema>;
}

/// A `ToolExecutor` with no tools beyond `complete`, for agents whose
/// entire job is to think and report back (e.g. a pure review/summary
/// agent with no task-management surface wired in).
pub struct NullToolExecutor;

#[async_trait]
impl ToolExecutor for NullToolExecutor {
    async fn call(&self, name: &str, _args: &Value) -> Result<Value, GobbyError> {
        Err(GobbyError::Internal(format!("no tool named '{name}' is available to this in-process agent")))
    }
    fn schemas(&self) -> Vec<ToolSchema> {
        vec![]
    }
}

pub enum LoopOutcome {
    Completed(CompleteArgs),
    MaxTurnsExceeded,
    Cancelled,
}

pub struct InProcessExecutor<'a> {
    pub provider: &'a dyn LlmProvider,
    pub dispatcher: &'a HookDispatcher,
    pub tools: &'a dyn ToolExecutor,
    pub max_turns: u32,
}

impl<'a> InProcessExecutor<'a> {
    pub fn new(provider: &'a dyn LlmProvider, dispatcher: &'a HookDispatcher, tools: &'a dyn ToolExecutor) -> Self {
        Self { provider, dispatcher, tools, max_turns: 25 }
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Run the loop to completion, cancellation, or the turn budget.
    /// `session_id` scopes both the hook dispatch and the tool calls.
    pub async fn run(&self, session_id: &str, system_prompt: &str, prompt: &str, mut cancel: tokio::sync::oneshot::Receiver<()>) -> Result<LoopOutcome, GobbyError> {
        let mut tool_schemas = self.tools.schemas();
        tool_schemas.push(complete_tool_schema());

        let mut messages = vec![Message::system(system_prompt), Message::user(prompt)];

        for _turn in 0..self.max_turns {
            if cancel.try_recv().is_ok() {
                return Ok(LoopOutcome::Cancelled);
            }

            let request = CompletionRequest { messages: messages.clone(), tools: tool_schemas.clone(), model: None, max_tokens: None, temperature: None };
            let response = self.provider.complete(request).await?;

            let Some(call) = response.tool_calls.first().cloned() else {
                if let Some(text) = response.text {
                    messages.push(Message::system(format!("Continue. Previous reply had no tool call: {text}")));
                    continue;
                }
                continue;
            };

            if call.name == COMPLETE_TOOL_NAME {
                let args: CompleteArgs = serde_json::from_value(call.arguments).map_err(|e| GobbyError::Internal(format!("malformed complete() call: {e}")))?;
                return Ok(LoopOutcome::Completed(args));
            }

            let (decision_message, tool_result) = self.dispatch_and_execute(session_id, &call).await;
            messages.push(Message { role: gobby_llm::MessageRole::Assistant, content: format!("calling {}", call.name), tool_call_id: Some(call.id.clone()) });
            messages.push(Message { role: gobby_llm::MessageRole::Tool, content: decision_message.unwrap_or(tool_result), tool_call_id: Some(call.id) });
        }

        Ok(LoopOutcome::MaxTurnsExceeded)
    }

    async fn dispatch_and_execute(&self, session_id: &str, call: &ToolCall) -> (Option<String>, String) {
        let event = HookEvent::new(
            HookEventType::ToolCall,
            gobby_core::CliSource::Generic,
            Some(session_id.to_string()),
            serde_json::json!({"tool": call.name, "args": call.arguments}),
        );
        let response = self.dispatcher.dispatch(event).await;
        if response.is_deny() {
            return (Some(response.message.unwrap_or_else(|| "tool call blocked by workflow policy".to_string())), String::new());
        }

        match self.tools.call(&call.name, &call.arguments).await {
            Ok(value) => (None, value.to_string()),
            Err(error) => (None, serde_json::json!({"error": error.to_string()}).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobby_core::CliSource;
    use gobby_llm::{CompletionResponse, StopReason};
    use gobby_store::Store;
    use gobby_workflow::WorkflowEngine;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    struct ScriptedProvider {
        turn: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(&self, _req: CompletionRequest) -> Result<CompletionResponse, GobbyError> {
            let n = self.turn.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Ok(CompletionResponse {
                    text: None,
                    tool_calls: vec![ToolCall { id: "1".into(), name: COMPLETE_TOOL_NAME.into(), arguments: serde_json::json!({"output": "done", "status": "done"}) }],
                    stop_reason: StopReason::ToolUse,
                })
            } else {
                Ok(CompletionResponse { text: Some("idle".into()), tool_calls: vec![], stop_reason: StopReason::EndTurn })
            }
        }
        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn setup_dispatcher() -> (HookDispatcher, String, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        let project = store.projects().create("demo", dir.path().to_str().unwrap(), "main").unwrap();
        let session = store.sessions().create(&project.id, CliSource::Generic, None, None).unwrap();
        let engine = WorkflowEngine::new(store.clone(), HashMap::new());
        let bus = gobby_events::EventBus::new();
        let llm: Arc<dyn LlmProvider> = Arc::new(gobby_llm::NoopProvider);
        (HookDispatcher::new(store, engine, bus, llm), session.id, dir)
    }

    #[tokio::test]
    async fn test_completes_on_complete_tool_call() {
        let (dispatcher, session_id, _dir) = setup_dispatcher();
        let provider = ScriptedProvider { turn: AtomicUsize::new(0) };
        let tools = NullToolExecutor;
        let executor = InProcessExecutor::new(&provider, &dispatcher, &tools);
        let (_tx, rx) = oneshot::channel();
        let outcome = executor.run(&session_id, "system", "do the thing", rx).await.unwrap();
        match outcome {
            LoopOutcome::Completed(args) => assert_eq!(args.status, "done"),
            _ => panic!("expected Completed"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_loop() {
        let (dispatcher, session_id, _dir) = setup_dispatcher();
        let provider = ScriptedProvider { turn: AtomicUsize::new(1) };
        let tools = NullToolExecutor;
        let executor = InProcessExecutor::new(&provider, &dispatcher, &tools);
        let (tx, rx) = oneshot::channel();
        tx.send(()).unwrap();
        let outcome = executor.run(&session_id, "system", "do the thing", rx).await.unwrap();
        assert!(matches!(outcome, LoopOutcome::Cancelled));
    }
}
