//! The per-session phase state machine: tool call decisions, transitions,
//! exit-condition auto-advance and the audit trail, steps 1-7 of the
//! decision algorithm.

use crate::definition::{RuleAction, WorkflowDefinition};
use crate::effects::{from_action, Effect};
use crate::expr::{eval, parse};
use crate::namespace::{EvalContext, SessionSignals};
use gobby_core::audit::{AuditEventType, AuditResult, WorkflowAuditEntry};
use gobby_core::GobbyError;
use gobby_store::Store;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allow,
    Block { message: String },
    Ask { prompt: String },
}

#[derive(Debug, Default)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub effects: Vec<Effect>,
}

pub struct WorkflowEngine {
    store: Store,
    definitions: HashMap<String, WorkflowDefinition>,
}

impl Default for Decision {
    fn default() -> Self {
        Decision::Allow
    }
}

impl WorkflowEngine {
    pub fn new(store: Store, definitions: HashMap<String, WorkflowDefinition>) -> Self {
        Self { store, definitions }
    }

    pub fn definition(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.definitions.get(name)
    }

    /// Activate `workflow_name` for `session_id`, snapshotting the
    /// currently-loaded YAML so later edits to the file don't affect an
    /// in-flight session.
    pub fn activate(&self, session_id: &str, workflow_name: &str) -> Result<(), GobbyError> {
        let def = self.definitions.get(workflow_name).ok_or_else(|| GobbyError::not_found("workflow", workflow_name))?;
        let initial_phase = def.first_phase_name().unwrap_or("").to_string();
        let snapshot = serde_yaml::to_string(def).map_err(|e| GobbyError::Internal(e.to_string()))?;
        self.store
            .workflow_states()
            .activate(session_id, workflow_name, &snapshot, &initial_phase)
            .map_err(|e| GobbyError::Internal(e.to_string()))?;
        Ok(())
    }

    /// `list_allowed_tools`: the single authority the MCP surface calls so
    /// a tool listing never shows what the current phase would block.
    pub fn list_allowed_tools(&self, session_id: &str, universe: &[String]) -> Result<Vec<String>, GobbyError> {
        let Some(state) = self.store.workflow_states().get(session_id).map_err(|e| GobbyError::Internal(e.to_string()))? else {
            return Ok(universe.to_vec());
        };
        if !state.active {
            return Ok(universe.to_vec());
        }
        let def: WorkflowDefinition = serde_yaml::from_str(&state.definition_snapshot).map_err(|e| GobbyError::Internal(e.to_string()))?;
        let Some(phase) = def.phase(&state.current_phase) else { return Ok(universe.to_vec()) };
        Ok(universe.iter().filter(|t| phase.allowed_tools.permits(t) && !phase.blocked_tools.contains(t)).cloned().collect())
    }

    /// Steps 1-7 of the tool-call decision algorithm.
    pub fn decide_tool_call(&self, session_id: &str, tool: &str, args: &Value, session: &SessionSignals, last_user_message: Option<&str>) -> Result<DecisionOutcome, GobbyError> {
        let states = self.store.workflow_states();
        let Some(mut state) = states.get(session_id).map_err(|e| GobbyError::Internal(e.to_string()))? else {
            return Ok(DecisionOutcome { decision: Decision::Allow, effects: vec![] });
        };
        if !state.active {
            return Ok(DecisionOutcome { decision: Decision::Allow, effects: vec![] });
        }

        let def: WorkflowDefinition = serde_yaml::from_str(&state.definition_snapshot).map_err(|e| GobbyError::Internal(e.to_string()))?;
        let Some(phase) = def.phase(&state.current_phase).cloned() else {
            return Ok(DecisionOutcome { decision: Decision::Allow, effects: vec![] });
        };

        let variables = serde_json::Map::from_iter(state.variables.clone());
        let ctx = EvalContext {
            tool,
            args,
            session,
            phase_action_count: state.phase_action_count,
            total_action_count: state.total_action_count,
            variables: &variables,
            last_user_message,
        };

        // Step 2: allow/block list.
        if phase.blocked_tools.iter().any(|t| t == tool) || !phase.allowed_tools.permits(tool) {
            let message = format!("tool '{tool}' is not allowed in phase '{}'", phase.name);
            self.audit(session_id, &phase.name, AuditEventType::ToolCall, AuditResult::Block, &message, Some(tool))?;
            return Ok(DecisionOutcome { decision: Decision::Block { message }, effects: vec![] });
        }

        // Step 3-4: rules in order.
        for rule in &phase.rules {
            let matched = match parse(&rule.when).and_then(|ast| eval(&ast, &ctx)) {
                Ok(value) => value.truthy(),
                Err(error) => {
                    tracing::warn!(rule_id = %rule.id, %error, "rule failed to evaluate");
                    if rule.block_on_error {
                        let message = format!("rule '{}' failed to evaluate and is marked block-on-error", rule.id);
                        self.audit(session_id, &phase.name, AuditEventType::RuleEval, AuditResult::Block, &message, Some(tool))?;
                        return Ok(DecisionOutcome { decision: Decision::Block { message }, effects: vec![] });
                    }
                    false
                }
            };
            if !matched {
                continue;
            }
            self.audit(session_id, &phase.name, AuditEventType::RuleEval, AuditResult::Met, &rule.when, Some(tool))?;
            match &rule.then {
                RuleAction::Block { message } => {
                    self.audit(session_id, &phase.name, AuditEventType::ToolCall, AuditResult::Block, message, Some(tool))?;
                    return Ok(DecisionOutcome { decision: Decision::Block { message: message.clone() }, effects: vec![] });
                }
                RuleAction::RequireApproval { prompt } => {
                    // One outstanding approval per session: a second
                    // approval-requiring rule denies rather than stacking.
                    if state.pending_approval.is_some() {
                        let message = format!("an approval is already pending for this session; resolve it before '{tool}' can run");
                        self.audit(session_id, &phase.name, AuditEventType::Approval, AuditResult::Block, &message, Some(tool))?;
                        return Ok(DecisionOutcome { decision: Decision::Block { message }, effects: vec![] });
                    }
                    states.set_pending_approval(session_id, Some(prompt.as_str())).map_err(|e| GobbyError::Internal(e.to_string()))?;
                    self.audit(session_id, &phase.name, AuditEventType::Approval, AuditResult::Pending, prompt, Some(tool))?;
                    return Ok(DecisionOutcome { decision: Decision::Ask { prompt: prompt.clone() }, effects: vec![] });
                }
                RuleAction::Warn { message } => {
                    tracing::warn!(session_id, tool, message, "workflow rule warning");
                }
                RuleAction::Allow => break,
            }
        }

        // Step 5: transitions.
        for transition in &phase.transitions {
            let matched = parse(&transition.when).and_then(|ast| eval(&ast, &ctx)).map(|v| v.truthy()).unwrap_or(false);
            if matched {
                let effects = self.run_transition(session_id, &def, &phase.name, &transition.to)?;
                states.increment_action_counts(session_id).map_err(|e| GobbyError::Internal(e.to_string()))?;
                return Ok(DecisionOutcome { decision: Decision::Allow, effects });
            }
        }

        states.increment_action_counts(session_id).map_err(|e| GobbyError::Internal(e.to_string()))?;
        state.phase_action_count += 1;

        // Step 6: exit conditions (AND), auto-advance.
        if !phase.exit_conditions.is_empty() {
            let all_met = phase.exit_conditions.iter().all(|cond| {
                let refreshed_ctx = EvalContext { phase_action_count: state.phase_action_count, ..ctx };
                parse(cond).and_then(|ast| eval(&ast, &refreshed_ctx)).map(|v| v.truthy()).unwrap_or(false)
            });
            if all_met {
                self.audit(session_id, &phase.name, AuditEventType::ExitCheck, AuditResult::Met, "all exit conditions met", None)?;
                let next = def.phase_index(&phase.name).and_then(|i| def.phases.get(i + 1)).map(|p| p.name.clone());
                if let Some(next_phase) = next {
                    let effects = self.run_transition(session_id, &def, &phase.name, &next_phase)?;
                    return Ok(DecisionOutcome { decision: Decision::Allow, effects });
                } else {
                    states.deactivate(session_id).map_err(|e| GobbyError::Internal(e.to_string()))?;
                }
            } else {
                self.audit(session_id, &phase.name, AuditEventType::ExitCheck, AuditResult::Unmet, "exit conditions not yet met", None)?;
            }
        }

        self.audit(session_id, &phase.name, AuditEventType::ToolCall, AuditResult::Allow, "no rule blocked the call", Some(tool))?;
        Ok(DecisionOutcome { decision: Decision::Allow, effects: vec![] })
    }

    fn run_transition(&self, session_id: &str, def: &WorkflowDefinition, from_phase: &str, to_phase: &str) -> Result<Vec<Effect>, GobbyError> {
        let states = self.store.workflow_states();
        let mut effects = Vec::new();
        if let Some(from) = def.phase(from_phase) {
            effects.extend(from.on_exit.iter().map(from_action));
        }
        states.transition_phase(session_id, to_phase).map_err(|e| GobbyError::Internal(e.to_string()))?;
        self.audit(session_id, from_phase, AuditEventType::Transition, AuditResult::Transition, &format!("{from_phase} -> {to_phase}"), None)?;
        if let Some(to) = def.phase(to_phase) {
            effects.extend(to.on_enter.iter().map(from_action));
        }
        Ok(effects)
    }

    fn audit(&self, session_id: &str, phase: &str, event_type: AuditEventType, result: AuditResult, reason: &str, tool: Option<&str>) -> Result<(), GobbyError> {
        let mut entry = WorkflowAuditEntry::new(session_id, phase, event_type, result, reason);
        if let Some(tool) = tool {
            entry = entry.with_tool(tool);
        }
        self.store.workflow_states().append_audit(&entry).map_err(|e| GobbyError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobby_core::CliSource;
    use serde_json::json;

    const YAML: &str = r#"
name: tdd
type: phase
phases:
  - name: plan
    allowed_tools: [Read, Grep]
    exit_conditions: ["phase_action_count >= 1"]
  - name: execute
    allowed_tools: all
    blocked_tools: [Write]
    rules:
      - id: no-force-push
        when: "command_contains(args.command, '--force')"
        action: block
        message: "force push is blocked"
"#;

    fn setup() -> (WorkflowEngine, String) {
        let store = Store::open_in_memory().unwrap();
        let project = store.projects().create("demo", "/tmp", "main").unwrap();
        let session = store.sessions().create(&project.id, CliSource::ClaudeCode, None, None).unwrap();
        let def: WorkflowDefinition = serde_yaml::from_str(YAML).unwrap();
        let mut defs = HashMap::new();
        defs.insert("tdd".to_string(), def);
        let engine = WorkflowEngine::new(store, defs);
        engine.activate(&session.id, "tdd").unwrap();
        (engine, session.id)
    }

    #[test]
    fn test_blocked_tool_in_phase() {
        let (engine, sid) = setup();
        let session = SessionSignals::default();
        let outcome = engine.decide_tool_call(&sid, "Write", &json!({}), &session, None).unwrap();
        assert!(matches!(outcome.decision, Decision::Block { .. }));
    }

    #[test]
    fn test_allowed_tool_passes() {
        let (engine, sid) = setup();
        let session = SessionSignals::default();
        let outcome = engine.decide_tool_call(&sid, "Read", &json!({}), &session, None).unwrap();
        assert_eq!(outcome.decision, Decision::Allow);
    }

    #[test]
    fn test_exit_condition_auto_advances_phase() {
        let (engine, sid) = setup();
        let session = SessionSignals::default();
        engine.decide_tool_call(&sid, "Read", &json!({}), &session, None).unwrap();
        let state = engine.store.workflow_states().get(&sid).unwrap().unwrap();
        assert_eq!(state.current_phase, "execute");
    }

    #[test]
    fn test_rule_blocks_matching_call_in_execute_phase() {
        let (engine, sid) = setup();
        let session = SessionSignals::default();
        engine.decide_tool_call(&sid, "Read", &json!({}), &session, None).unwrap(); // advances to execute
        let outcome = engine.decide_tool_call(&sid, "Bash", &json!({"command": "git push --force"}), &session, None).unwrap();
        assert!(matches!(outcome.decision, Decision::Block { .. }));
    }

    #[test]
    fn test_no_active_workflow_allows_everything() {
        let store = Store::open_in_memory().unwrap();
        let project = store.projects().create("demo", "/tmp", "main").unwrap();
        let session = store.sessions().create(&project.id, CliSource::ClaudeCode, None, None).unwrap();
        let engine = WorkflowEngine::new(store, HashMap::new());
        let signals = SessionSignals::default();
        let outcome = engine.decide_tool_call(&session.id, "Bash", &json!({}), &signals, None).unwrap();
        assert_eq!(outcome.decision, Decision::Allow);
    }

    #[test]
    fn test_list_allowed_tools_filters_by_phase() {
        let (engine, sid) = setup();
        let universe = vec!["Read".to_string(), "Write".to_string(), "Grep".to_string()];
        let allowed = engine.list_allowed_tools(&sid, &universe).unwrap();
        assert_eq!(allowed, vec!["Read".to_string(), "Grep".to_string()]);
    }
}
