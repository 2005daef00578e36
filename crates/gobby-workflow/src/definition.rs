//! The workflow YAML schema: `name`, `type`, optional `extends`, phases
//! (or steps — the same shape under either key) and top-level `triggers`
//! for lifecycle workflows.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Phase,
    Step,
    Lifecycle,
}

/// `all` (every tool allowed) or an explicit allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedTools {
    All,
    List(Vec<String>),
}

impl Default for AllowedTools {
    fn default() -> Self {
        AllowedTools::All
    }
}

impl AllowedTools {
    pub fn permits(&self, tool: &str) -> bool {
        match self {
            AllowedTools::All => true,
            AllowedTools::List(list) => list.iter().any(|t| t == tool),
        }
    }
}

impl Serialize for AllowedTools {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AllowedTools::All => serializer.serialize_str("all"),
            AllowedTools::List(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for AllowedTools {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_yaml::Value::deserialize(deserializer)?;
        Ok(match raw {
            serde_yaml::Value::String(s) if s == "all" => AllowedTools::All,
            serde_yaml::Value::Null => AllowedTools::All,
            serde_yaml::Value::Sequence(items) => {
                AllowedTools::List(items.into_iter().filter_map(|v| v.as_str().map(String::from)).collect())
            }
            _ => AllowedTools::All,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RuleAction {
    Block { message: String },
    RequireApproval { prompt: String },
    Warn { message: String },
    Allow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub when: String,
    #[serde(flatten)]
    pub then: RuleAction,
    #[serde(default)]
    pub block_on_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub when: String,
    pub to: String,
}

/// One `on_enter`/`on_exit`/lifecycle-trigger action. `kind` and `args` are
/// kept loosely typed (a map) since the action vocabulary is open-ended and
/// interpreted by the caller that executes [`crate::effects::Effect`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub kind: String,
    #[serde(flatten, default)]
    pub args: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Phase {
    pub name: String,
    #[serde(default)]
    pub allowed_tools: AllowedTools,
    #[serde(default)]
    pub blocked_tools: Vec<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub on_enter: Vec<Action>,
    #[serde(default)]
    pub on_exit: Vec<Action>,
    #[serde(default)]
    pub exit_conditions: Vec<String>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub event: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: WorkflowKind,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub variables: BTreeMap<String, serde_json::Value>,
    #[serde(default, alias = "steps")]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

impl WorkflowDefinition {
    pub fn phase(&self, name: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }

    pub fn first_phase_name(&self) -> Option<&str> {
        self.phases.first().map(|p| p.name.as_str())
    }

    pub fn phase_index(&self, name: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
name: tdd-loop
type: phase
phases:
  - name: plan
    allowed_tools: [Read, Grep]
    exit_conditions: ["phase_action_count > 0"]
    transitions:
      - when: "workflow_state.variables.approved == true"
        to: execute
  - name: execute
    allowed_tools: all
    blocked_tools: [Write]
    rules:
      - id: no-force-push
        when: "command_contains(args.command, '--force')"
        action: block
        message: "force push is not allowed in execute phase"
"#;

    #[test]
    fn test_parse_phase_workflow() {
        let def: WorkflowDefinition = serde_yaml::from_str(YAML).unwrap();
        assert_eq!(def.name, "tdd-loop");
        assert_eq!(def.kind, WorkflowKind::Phase);
        assert_eq!(def.phases.len(), 2);
        assert_eq!(def.phases[0].allowed_tools, AllowedTools::List(vec!["Read".into(), "Grep".into()]));
        assert_eq!(def.phases[1].allowed_tools, AllowedTools::All);
        assert_eq!(def.phases[1].blocked_tools, vec!["Write".to_string()]);
    }

    #[test]
    fn test_rule_action_parses_block() {
        let def: WorkflowDefinition = serde_yaml::from_str(YAML).unwrap();
        let rule = &def.phases[1].rules[0];
        assert!(matches!(&rule.then, RuleAction::Block { message } if message.contains("force push")));
    }

    #[test]
    fn test_allowed_tools_permits() {
        assert!(AllowedTools::All.permits("Edit"));
        let list = AllowedTools::List(vec!["Read".into()]);
        assert!(list.permits("Read"));
        assert!(!list.permits("Write"));
    }
}
