//! The `HookDispatcher`: resolves the session for an incoming [`HookEvent`],
//! runs pre-core plugin handlers, delegates the actual allow/deny decision
//! to the [`gobby_workflow::WorkflowEngine`], runs post-core observers, and
//! broadcasts the outcome on the event bus. Fail-open per the taxonomy in
//! the core error module: any non-`UserBlocked` failure in core handling
//! becomes `allow` rather than wedging the calling CLI.

use crate::event::{HookEvent, HookEventType};
use crate::plugin::PluginHandler;
use crate::response::HookResponse;
use gobby_core::audit::{AuditEventType, AuditResult, WorkflowAuditEntry};
use gobby_core::{CliSource, Decision, SessionStatus};
use gobby_events::{EventBus, GobbyEvent, WebhookDispatcher, WebhookEndpoint};
use gobby_llm::{CompletionRequest, LlmProvider, Message};
use gobby_store::Store;
use gobby_workflow::{ContextSource, Effect, EvalContext, SessionSignals, WorkflowEngine};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Fixed approval/rejection vocabulary for step 4 of the decision
/// algorithm: `require_approval` sets a pending flag and the next user
/// message is matched against this set.
const APPROVAL_KEYWORDS: &[&str] = &["yes", "approve", "approved", "ok", "okay", "go ahead", "lgtm", "y"];
const REJECTION_KEYWORDS: &[&str] = &["no", "deny", "denied", "reject", "rejected", "stop", "n"];

/// `None` when the message doesn't match either keyword set. A keyword must
/// be the whole message, modulo trailing punctuation/whitespace — "yes, but
/// later" starts with "yes" but carries real trailing content, so it is not
/// treated as approval.
fn classify_approval_reply(message: &str) -> Option<bool> {
    let normalized = message.trim().to_lowercase();
    let matches_keyword = |keyword: &str| -> bool {
        let Some(rest) = normalized.strip_prefix(keyword) else { return false };
        match rest.chars().next() {
            None => true,
            Some(c) if c.is_alphanumeric() => false,
            Some(_) => rest.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | ';' | ':')).is_empty(),
        }
    };
    if APPROVAL_KEYWORDS.iter().any(|k| matches_keyword(k)) {
        return Some(true);
    }
    if REJECTION_KEYWORDS.iter().any(|k| matches_keyword(k)) {
        return Some(false);
    }
    None
}

fn parse_session_status(status: &str) -> Option<SessionStatus> {
    match status {
        "active" => Some(SessionStatus::Active),
        "handoff_ready" => Some(SessionStatus::HandoffReady),
        "expired" => Some(SessionStatus::Expired),
        _ => None,
    }
}

pub struct HookDispatcher {
    store: Store,
    engine: WorkflowEngine,
    bus: EventBus,
    handlers: Vec<Box<dyn PluginHandler>>,
    llm: Arc<dyn LlmProvider>,
    webhooks: WebhookDispatcher,
    /// Running per-session accumulation of files touched, used to populate
    /// `session.files_read` / `session.files_modified` in rule expressions.
    signals: Mutex<std::collections::HashMap<String, SessionSignals>>,
}

impl HookDispatcher {
    pub fn new(store: Store, engine: WorkflowEngine, bus: EventBus, llm: Arc<dyn LlmProvider>) -> Self {
        Self { store, engine, bus, handlers: Vec::new(), llm, webhooks: WebhookDispatcher::new(), signals: Mutex::new(std::collections::HashMap::new()) }
    }

    pub fn register(&mut self, handler: Box<dyn PluginHandler>) {
        self.handlers.push(handler);
    }

    /// Run the full pipeline for one event and return the response the
    /// calling CLI should act on.
    pub async fn dispatch(&self, event: HookEvent) -> HookResponse {
        let mut pre: Vec<&Box<dyn PluginHandler>> = self.handlers.iter().filter(|h| h.priority() < 50).collect();
        pre.sort_by_key(|h| h.priority());
        for handler in pre {
            match handler.handle(&event) {
                Ok(Some(response)) if response.is_deny() => {
                    self.broadcast(&event, &response);
                    return response;
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(handler = handler.name(), %error, "pre-core plugin handler failed, skipping");
                }
            }
        }

        let response = self.handle_core(&event).await;

        let mut post: Vec<&Box<dyn PluginHandler>> = self.handlers.iter().filter(|h| h.priority() >= 50).collect();
        post.sort_by_key(|h| h.priority());
        for handler in post {
            if let Err(error) = handler.handle(&event) {
                tracing::warn!(handler = handler.name(), %error, "post-core plugin handler failed, ignored");
            }
        }

        self.broadcast(&event, &response);
        response
    }

    async fn handle_core(&self, event: &HookEvent) -> HookResponse {
        match event.event_type {
            HookEventType::SessionStart => self.handle_session_start(event),
            HookEventType::ToolCall => self.handle_tool_call(event).await,
            HookEventType::ToolResult => self.handle_tool_result(event),
            HookEventType::SessionEnd => self.handle_session_end(event),
            HookEventType::PromptSubmit => self.handle_prompt_submit(event),
            HookEventType::BeforeAgent => HookResponse::allow(),
        }
    }

    /// Step 4 of the decision algorithm: resolve a pending `require_approval`
    /// against the next user message. No pending approval, or no matching
    /// keyword, both fall through to plain `allow` (a bare chat message
    /// should never be blocked just because some unrelated approval is
    /// outstanding).
    fn handle_prompt_submit(&self, event: &HookEvent) -> HookResponse {
        let Some(session_id) = event.session_id.as_deref() else { return HookResponse::allow() };
        let Some(message) = event.last_user_message() else { return HookResponse::allow() };

        let states = self.store.workflow_states();
        let state = match states.get(session_id) {
            Ok(Some(state)) => state,
            Ok(None) => return HookResponse::allow(),
            Err(error) => {
                tracing::error!(%error, session_id, "prompt_submit: failed to load workflow state, failing open");
                return HookResponse::allow();
            }
        };
        let Some(prompt) = state.pending_approval.clone() else { return HookResponse::allow() };

        let reply = classify_approval_reply(message);
        if reply.is_none() {
            return HookResponse::allow();
        }
        if let Err(error) = states.set_pending_approval(session_id, None) {
            tracing::error!(%error, session_id, "prompt_submit: failed to clear pending approval");
        }

        let approved = reply.unwrap();
        let result = if approved { AuditResult::Approved } else { AuditResult::Rejected };
        let mut entry = WorkflowAuditEntry::new(session_id, state.current_phase.clone(), AuditEventType::Approval, result, message);
        entry.context.insert("pending_approval".to_string(), json!(prompt));
        if let Err(error) = states.append_audit(&entry) {
            tracing::warn!(%error, session_id, "prompt_submit: failed to append approval audit entry");
        }

        if approved {
            HookResponse::allow().with_inject_context(format!("approval resolved for: {prompt}"))
        } else {
            HookResponse::deny(format!("approval rejected for: {prompt}"))
        }
    }

    /// Resolve or register the session for `session_start`, returning an
    /// instruction fragment carrying the session's `#N` ref so the agent's
    /// next context includes it.
    fn handle_session_start(&self, event: &HookEvent) -> HookResponse {
        let project_id = match self.resolve_or_create_project(event) {
            Ok(id) => id,
            Err(error) => {
                tracing::error!(%error, "session_start: failed to resolve project, failing open");
                return HookResponse::allow();
            }
        };
        let session = match self.store.sessions().create(&project_id, event.source, None, None) {
            Ok(s) => s,
            Err(error) => {
                tracing::error!(%error, "session_start: failed to create session, failing open");
                return HookResponse::allow();
            }
        };
        HookResponse::allow().with_inject_context(format!("session #{} registered", session.seq_num))
    }

    async fn handle_tool_call(&self, event: &HookEvent) -> HookResponse {
        let Some(session_id) = event.session_id.as_deref() else { return HookResponse::allow() };
        let Some(tool) = event.tool_name() else { return HookResponse::allow() };
        let args = event.tool_args();

        let signals_snapshot = {
            let mut signals_guard = self.signals.lock().unwrap();
            let signals = signals_guard.entry(session_id.to_string()).or_default();
            signals.clone()
        };

        let outcome = match self.engine.decide_tool_call(session_id, tool, &args, &signals_snapshot, event.last_user_message()) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(%error, session_id, tool, "workflow engine decision failed, failing open");
                return HookResponse::allow();
            }
        };

        let (extra_context, veto) = self.apply_effects(session_id, tool, &args, event.last_user_message(), &signals_snapshot, outcome.effects).await;
        if let Some(reason) = veto {
            return HookResponse::deny(reason);
        }

        let response = match outcome.decision {
            gobby_workflow::Decision::Allow => HookResponse::allow(),
            gobby_workflow::Decision::Block { message } => HookResponse::deny(message),
            gobby_workflow::Decision::Ask { prompt } => HookResponse::ask(prompt),
        };
        match extra_context {
            Some(context) if !response.is_deny() => response.with_inject_context(context),
            _ => response,
        }
    }

    /// Execute the effects a transition produced. Most act on this
    /// session's own store rows; `CallLlm`/`GenerateSummary`/`SynthesizeTitle`
    /// go through the configured provider, and `Webhook` through the shared
    /// best-effort/blocking dispatcher. `CallMcpTool` is logged, not run —
    /// the MCP hub lives in `gobby-mcp`, which depends on this crate, so a
    /// hook can't reach back into it without a dependency cycle.
    async fn apply_effects(
        &self,
        session_id: &str,
        tool: &str,
        args: &Value,
        last_user_message: Option<&str>,
        signals: &SessionSignals,
        effects: Vec<Effect>,
    ) -> (Option<String>, Option<String>) {
        let mut injected = Vec::new();
        let mut veto = None;

        for effect in effects {
            match effect {
                Effect::InjectContext(sources) => {
                    if let Some(text) = self.render_context_sources(session_id, &sources) {
                        injected.push(text);
                    }
                }
                Effect::InjectMessage(template) => {
                    let variables = self.current_variables(session_id);
                    let ns = EvalContext {
                        tool,
                        args,
                        session: signals,
                        phase_action_count: 0,
                        total_action_count: 0,
                        variables: &variables,
                        last_user_message,
                    };
                    let rendered = gobby_workflow::render(&template, &ns);
                    if !rendered.is_empty() {
                        injected.push(rendered);
                    }
                }
                Effect::CallLlm { prompt, output_as } => {
                    if let Some(text) = self.call_llm(&prompt).await {
                        if !output_as.is_empty() {
                            let _ = self.store.workflow_states().set_variable(session_id, &output_as, json!(text));
                        }
                        injected.push(text);
                    }
                }
                Effect::GenerateSummary => {
                    if let Some(summary) = self.call_llm("Summarize this session's progress so far in two or three sentences.").await {
                        if let Err(error) = self.store.sessions().set_summary(session_id, &summary) {
                            tracing::warn!(%error, session_id, "generate_summary: failed to persist session summary");
                        }
                        let _ = self.store.workflow_states().capture_artifact(session_id, "summary", &summary);
                    }
                }
                Effect::SynthesizeTitle => {
                    if let Some(title) = self.call_llm("Produce a concise five-word-or-fewer title for what this session is working on.").await {
                        let _ = self.store.workflow_states().capture_artifact(session_id, "title", title.trim());
                    }
                }
                Effect::WriteTodos => {
                    let _ = self.store.workflow_states().set_variable(session_id, "todos", json!([]));
                }
                Effect::MarkTodoComplete { id } => {
                    self.mark_todo_complete(session_id, &id);
                }
                Effect::PersistTasks { source, create_dependencies, link_to_session } => {
                    self.persist_tasks(session_id, &source, create_dependencies, link_to_session);
                }
                Effect::CallMcpTool { server, tool: mcp_tool, .. } => {
                    tracing::warn!(session_id, server, tool = mcp_tool, "call_mcp_tool effect skipped: no MCP hub reachable from the hook pipeline");
                }
                Effect::Webhook { url, event, can_block, headers } => {
                    let mut endpoint = WebhookEndpoint::new(url);
                    endpoint.event_types = vec![event.clone()];
                    endpoint.can_block = can_block;
                    endpoint.headers = headers.into_iter().collect();
                    let payload = GobbyEvent::new(event, Some(session_id.to_string()), json!({ "tool": tool, "args": args }));
                    if let Some(v) = self.webhooks.dispatch(&endpoint, &payload).await {
                        veto = Some(v.reason);
                    }
                }
                Effect::FindParentSession => {
                    if let Ok(Some(session)) = self.store.sessions().get(session_id) {
                        if let Some(parent_id) = session.parent_session_id {
                            let _ = self.store.workflow_states().set_variable(session_id, "parent_session_id", json!(parent_id));
                        }
                    }
                }
                Effect::RestoreContext => {
                    if let Ok(Some(session)) = self.store.sessions().get(session_id) {
                        if let Some(summary) = session.summary_markdown {
                            injected.push(summary);
                        }
                    }
                }
                Effect::MarkSessionStatus(status) => {
                    if let Some(parsed) = parse_session_status(&status) {
                        if let Err(error) = self.store.sessions().set_status(session_id, parsed) {
                            tracing::warn!(%error, session_id, status, "mark_session_status: failed to update session");
                        }
                    } else {
                        tracing::warn!(session_id, status, "mark_session_status: unrecognized status, ignored");
                    }
                }
                Effect::SwitchMode(mode) => {
                    let _ = self.store.workflow_states().set_variable(session_id, "mode", json!(mode));
                }
                Effect::Unknown { kind } => {
                    tracing::debug!(session_id, kind, "unrecognized workflow action kind, ignored");
                }
            }
        }

        (if injected.is_empty() { None } else { Some(injected.join("\n\n")) }, veto)
    }

    async fn call_llm(&self, prompt: &str) -> Option<String> {
        let request = CompletionRequest { messages: vec![Message::user(prompt)], tools: vec![], model: None, max_tokens: None, temperature: None };
        match self.llm.complete(request).await {
            Ok(response) => response.text,
            Err(error) => {
                tracing::warn!(%error, "workflow effect LLM call failed");
                None
            }
        }
    }

    fn current_variables(&self, session_id: &str) -> serde_json::Map<String, Value> {
        match self.store.workflow_states().get(session_id) {
            Ok(Some(state)) => serde_json::Map::from_iter(state.variables),
            _ => serde_json::Map::new(),
        }
    }

    fn mark_todo_complete(&self, session_id: &str, id: &str) {
        let Ok(Some(state)) = self.store.workflow_states().get(session_id) else { return };
        let mut todos = state.variables.get("todos").cloned().unwrap_or_else(|| json!([]));
        if let Some(items) = todos.as_array_mut() {
            for item in items.iter_mut() {
                if item.get("id").and_then(Value::as_str) == Some(id) {
                    item["done"] = json!(true);
                }
            }
        }
        let _ = self.store.workflow_states().set_variable(session_id, "todos", todos);
    }

    /// `source` names a workflow variable or artifact holding a JSON array
    /// of `{title, description}` objects; each becomes a real task.
    /// `TaskManager::create` has no session-stamping parameter, so
    /// `link_to_session` instead records the created ids into a
    /// `tasks_created` workflow variable rather than faking the field.
    fn persist_tasks(&self, session_id: &str, source: &str, create_dependencies: bool, link_to_session: bool) {
        let Ok(Some(state)) = self.store.workflow_states().get(session_id) else { return };
        let Ok(Some(session)) = self.store.sessions().get(session_id) else { return };

        let raw = state
            .variables
            .get(source)
            .cloned()
            .or_else(|| state.artifacts.get(source).and_then(|s| serde_json::from_str(s).ok()));
        let Some(Value::Array(items)) = raw else {
            tracing::debug!(session_id, source, "persist_tasks: source has no array to persist, skipping");
            return;
        };

        let tasks = self.store.tasks();
        let mut created_ids = Vec::new();
        for item in items {
            let title = item.get("title").and_then(Value::as_str).unwrap_or("untitled task").to_string();
            let description = item.get("description").and_then(Value::as_str).unwrap_or_default().to_string();
            match tasks.create(&session.project_id, None, &title, &description, None, None, 5, gobby_core::TaskType::Task, Vec::new(), None) {
                Ok(task) => created_ids.push(task.id),
                Err(error) => tracing::warn!(%error, session_id, title, "persist_tasks: failed to create task"),
            }
        }

        if create_dependencies {
            for (idx, id) in created_ids.iter().enumerate().skip(1) {
                if let Err(error) = tasks.add_dependency(id, &created_ids[idx - 1], gobby_core::DependencyType::Blocks) {
                    tracing::warn!(%error, session_id, task_id = id, "persist_tasks: failed to link dependency");
                }
            }
        }

        if link_to_session {
            let _ = self.store.workflow_states().set_variable(session_id, "tasks_created", json!(created_ids));
        }
    }

    /// Best-effort prose for each requested [`ContextSource`]; sources this
    /// crate has no store access for (skills, memory — owned by
    /// `gobby-mcp`'s addressable stores) are skipped rather than faked.
    fn render_context_sources(&self, session_id: &str, sources: &[ContextSource]) -> Option<String> {
        let state = self.store.workflow_states().get(session_id).ok().flatten();
        let session = self.store.sessions().get(session_id).ok().flatten();
        let mut blocks = Vec::new();

        for source in sources {
            match source {
                ContextSource::PreviousSessionSummary | ContextSource::Handoff => {
                    if let Some(summary) = session.as_ref().and_then(|s| s.summary_markdown.clone()) {
                        blocks.push(summary);
                    }
                }
                ContextSource::Artifacts => {
                    if let Some(state) = &state {
                        if !state.artifacts.is_empty() {
                            let lines: Vec<String> = state.artifacts.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                            blocks.push(lines.join("\n"));
                        }
                    }
                }
                ContextSource::Observations => {
                    let guard = self.signals.lock().unwrap();
                    if let Some(signals) = guard.get(session_id) {
                        if !signals.files_modified.is_empty() {
                            blocks.push(format!("files modified: {}", signals.files_modified.join(", ")));
                        }
                        if !signals.errors.is_empty() {
                            blocks.push(format!("recent errors: {}", signals.errors.join("; ")));
                        }
                    }
                }
                ContextSource::WorkflowState => {
                    if let Some(state) = &state {
                        blocks.push(format!("phase: {}", state.current_phase));
                    }
                }
                ContextSource::TaskContext => {
                    if let Some(session) = &session {
                        if let Ok(tasks) = self.store.tasks().list_open_by_project(&session.project_id) {
                            if !tasks.is_empty() {
                                let lines: Vec<String> = tasks.iter().map(|t| format!("- {} ({:?})", t.title, t.status)).collect();
                                blocks.push(lines.join("\n"));
                            }
                        }
                    }
                }
                ContextSource::Skills | ContextSource::Memories => {
                    tracing::debug!(session_id, ?source, "context source has no store-backed data in the hook pipeline, skipping");
                }
            }
        }

        if blocks.is_empty() { None } else { Some(blocks.join("\n\n")) }
    }

    fn handle_tool_result(&self, event: &HookEvent) -> HookResponse {
        let Some(session_id) = event.session_id.as_deref() else { return HookResponse::allow() };
        let is_write = matches!(event.tool_name(), Some("Write") | Some("Edit") | Some("MultiEdit"));
        let is_read = matches!(event.tool_name(), Some("Read") | Some("Glob") | Some("Grep"));
        if let Some(path) = event.data.get("args").and_then(|a| a.get("file_path")).and_then(|v| v.as_str()) {
            let mut guard = self.signals.lock().unwrap();
            let signals = guard.entry(session_id.to_string()).or_default();
            if is_write {
                signals.files_modified.push(path.to_string());
            } else if is_read {
                signals.files_read.push(path.to_string());
            }
        }
        if let Some(err) = event.data.get("error").and_then(|v| v.as_str()) {
            let mut guard = self.signals.lock().unwrap();
            guard.entry(session_id.to_string()).or_default().errors.push(err.to_string());
        }
        HookResponse::allow()
    }

    fn handle_session_end(&self, event: &HookEvent) -> HookResponse {
        let Some(session_id) = event.session_id.as_deref() else { return HookResponse::allow() };
        self.signals.lock().unwrap().remove(session_id);
        if let Err(error) = self.store.sessions().set_status(session_id, SessionStatus::Active) {
            tracing::warn!(%error, session_id, "session_end: failed to touch session status");
        }
        HookResponse::allow()
    }

    /// Resolve `.gobby/project.json` under the event's `cwd`, creating the
    /// project implicitly on first session in that directory.
    fn resolve_or_create_project(&self, event: &HookEvent) -> anyhow::Result<String> {
        let cwd = event.cwd().unwrap_or(".");
        let manifest_path = std::path::Path::new(cwd).join(".gobby").join("project.json");
        if let Ok(text) = std::fs::read_to_string(&manifest_path) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
                if let Some(id) = value.get("id").and_then(|v| v.as_str()) {
                    return Ok(id.to_string());
                }
            }
        }
        let name = std::path::Path::new(cwd).file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "unnamed".to_string());
        let project = self.store.projects().create(&name, cwd, "main")?;
        Ok(project.id)
    }

    fn broadcast(&self, event: &HookEvent, response: &HookResponse) {
        let decision_str = match response.decision {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
            Decision::Ask => "ask",
        };
        self.bus.publish(GobbyEvent::new(
            format!("hook.{}", event.event_type.as_str()),
            event.session_id.clone(),
            json!({ "decision": decision_str, "message": response.message }),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::HookEventType;
    use gobby_store::Store;
    use gobby_workflow::WorkflowEngine;
    use serde_json::json;
    use std::collections::HashMap;

    fn setup() -> (HookDispatcher, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        let engine = WorkflowEngine::new(store.clone(), HashMap::new());
        let bus = EventBus::new();
        let llm: Arc<dyn LlmProvider> = Arc::new(gobby_llm::NoopProvider);
        (HookDispatcher::new(store, engine, bus, llm), dir)
    }

    #[tokio::test]
    async fn test_session_start_creates_project_and_session() {
        let (dispatcher, dir) = setup();
        let event = HookEvent::new(
            HookEventType::SessionStart,
            CliSource::ClaudeCode,
            None,
            json!({ "cwd": dir.path().to_string_lossy() }),
        );
        let response = dispatcher.dispatch(event).await;
        assert_eq!(response.decision, Decision::Allow);
        assert!(response.inject_context.unwrap().contains("session #1"));
    }

    #[tokio::test]
    async fn test_tool_call_with_no_active_workflow_allows() {
        let (dispatcher, dir) = setup();
        let start = dispatcher
            .dispatch(HookEvent::new(
                HookEventType::SessionStart,
                CliSource::ClaudeCode,
                None,
                json!({ "cwd": dir.path().to_string_lossy() }),
            ))
            .await;
        assert!(!start.is_deny());
        let session_id = dispatcher.store.sessions().find_by_seq_num_any_project(1).unwrap().remove(0).id;
        let call = dispatcher
            .dispatch(HookEvent::new(
                HookEventType::ToolCall,
                CliSource::ClaudeCode,
                Some(session_id),
                json!({ "tool": "Bash", "args": { "command": "ls" } }),
            ))
            .await;
        assert_eq!(call.decision, Decision::Allow);
    }

    #[tokio::test]
    async fn test_pre_core_deny_short_circuits() {
        let (mut dispatcher, dir) = setup();
        struct AlwaysDeny;
        impl PluginHandler for AlwaysDeny {
            fn name(&self) -> &str { "deny-all" }
            fn priority(&self) -> u8 { 10 }
            fn handle(&self, _e: &HookEvent) -> anyhow::Result<Option<HookResponse>> { Ok(Some(HookResponse::deny("nope"))) }
        }
        dispatcher.register(Box::new(AlwaysDeny));
        let response = dispatcher
            .dispatch(HookEvent::new(
                HookEventType::ToolCall,
                CliSource::ClaudeCode,
                None,
                json!({ "cwd": dir.path().to_string_lossy(), "tool": "Bash" }),
            ))
            .await;
        assert!(response.is_deny());
    }

    #[tokio::test]
    async fn test_plugin_handler_error_is_isolated() {
        let (mut dispatcher, _dir) = setup();
        struct AlwaysErrors;
        impl PluginHandler for AlwaysErrors {
            fn name(&self) -> &str { "broken" }
            fn priority(&self) -> u8 { 5 }
            fn handle(&self, _e: &HookEvent) -> anyhow::Result<Option<HookResponse>> { anyhow::bail!("boom") }
        }
        dispatcher.register(Box::new(AlwaysErrors));
        let response = dispatcher.dispatch(HookEvent::new(HookEventType::ToolResult, CliSource::Codex, None, json!({}))).await;
        assert_eq!(response.decision, Decision::Allow);
    }

    const APPROVAL_YAML: &str = r#"
name: approval
type: phase
phases:
  - name: plan
    allowed_tools: all
    rules:
      - id: needs-ok
        when: "tool == 'Deploy'"
        action: require_approval
        prompt: "Deploy to prod?"
"#;

    fn setup_with_workflow(name: &str, yaml: &str) -> (HookDispatcher, String, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        let project = store.projects().create("demo", dir.path().to_str().unwrap(), "main").unwrap();
        let session = store.sessions().create(&project.id, CliSource::ClaudeCode, None, None).unwrap();
        let def: gobby_workflow::WorkflowDefinition = serde_yaml::from_str(yaml).unwrap();
        let mut defs = HashMap::new();
        defs.insert(name.to_string(), def);
        let engine = WorkflowEngine::new(store.clone(), defs);
        engine.activate(&session.id, name).unwrap();
        let bus = EventBus::new();
        let llm: Arc<dyn LlmProvider> = Arc::new(gobby_llm::NoopProvider);
        (HookDispatcher::new(store, engine, bus, llm), session.id, dir)
    }

    #[tokio::test]
    async fn test_prompt_submit_resolves_pending_approval() {
        let (dispatcher, session_id, _dir) = setup_with_workflow("approval", APPROVAL_YAML);

        let ask = dispatcher
            .dispatch(HookEvent::new(HookEventType::ToolCall, CliSource::ClaudeCode, Some(session_id.clone()), json!({ "tool": "Deploy", "args": {} })))
            .await;
        assert_eq!(ask.decision, Decision::Ask);

        let response = dispatcher
            .dispatch(HookEvent::new(HookEventType::PromptSubmit, CliSource::ClaudeCode, Some(session_id.clone()), json!({ "last_user_message": "yes" })))
            .await;
        assert_eq!(response.decision, Decision::Allow);
        assert!(response.inject_context.unwrap().contains("approval resolved for: Deploy to prod?"));
        let state = dispatcher.store.workflow_states().get(&session_id).unwrap().unwrap();
        assert!(state.pending_approval.is_none());
    }

    #[tokio::test]
    async fn test_prompt_submit_ignores_non_matching_reply() {
        let (dispatcher, session_id, _dir) = setup_with_workflow("approval", APPROVAL_YAML);

        dispatcher
            .dispatch(HookEvent::new(HookEventType::ToolCall, CliSource::ClaudeCode, Some(session_id.clone()), json!({ "tool": "Deploy", "args": {} })))
            .await;

        let response = dispatcher
            .dispatch(HookEvent::new(HookEventType::PromptSubmit, CliSource::ClaudeCode, Some(session_id.clone()), json!({ "last_user_message": "yes, but later" })))
            .await;
        assert_eq!(response.decision, Decision::Allow);
        assert!(response.inject_context.is_none());
        let state = dispatcher.store.workflow_states().get(&session_id).unwrap().unwrap();
        assert!(state.pending_approval.is_some());
    }

    const TRANSITION_YAML: &str = r#"
name: effects
type: phase
phases:
  - name: plan
    allowed_tools: all
    exit_conditions: ["phase_action_count >= 1"]
  - name: execute
    allowed_tools: all
    on_enter:
      - kind: inject_message
        template: "entering execute phase"
"#;

    #[tokio::test]
    async fn test_transition_effects_render_inject_message() {
        let (dispatcher, session_id, _dir) = setup_with_workflow("effects", TRANSITION_YAML);

        let response = dispatcher
            .dispatch(HookEvent::new(HookEventType::ToolCall, CliSource::ClaudeCode, Some(session_id.clone()), json!({ "tool": "Read", "args": {} })))
            .await;
        assert_eq!(response.decision, Decision::Allow);
        assert_eq!(response.inject_context.unwrap(), "entering execute phase");
        let state = dispatcher.store.workflow_states().get(&session_id).unwrap().unwrap();
        assert_eq!(state.current_phase, "execute");
    }

    const WEBHOOK_YAML: &str = r#"
name: webhook_on_enter
type: phase
phases:
  - name: plan
    allowed_tools: all
    exit_conditions: ["phase_action_count >= 1"]
  - name: execute
    allowed_tools: all
    on_enter:
      - kind: webhook
        url: "http://127.0.0.1:0/nonexistent"
        event: "phase.entered"
        can_block: true
"#;

    #[tokio::test]
    async fn test_transition_webhook_effect_fails_open_without_veto() {
        let (dispatcher, session_id, _dir) = setup_with_workflow("webhook_on_enter", WEBHOOK_YAML);

        let response = dispatcher
            .dispatch(HookEvent::new(HookEventType::ToolCall, CliSource::ClaudeCode, Some(session_id.clone()), json!({ "tool": "Read", "args": {} })))
            .await;
        assert_eq!(response.decision, Decision::Allow);
    }
}
