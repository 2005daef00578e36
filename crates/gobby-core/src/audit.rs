//! The workflow engine's append-only audit log record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    ToolCall,
    RuleEval,
    Transition,
    ExitCheck,
    Approval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Allow,
    Block,
    Transition,
    Skip,
    Met,
    Unmet,
    Approved,
    Rejected,
    Pending,
}

/// One entry in a session's workflow audit log. Append-only: entries are
/// never mutated or deleted once written, making the decision chain
/// reproducible as required by the engine's decision algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowAuditEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub phase: String,
    pub event_type: AuditEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub result: AuditResult,
    pub reason: String,
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl WorkflowAuditEntry {
    pub fn new(
        session_id: impl Into<String>,
        phase: impl Into<String>,
        event_type: AuditEventType,
        result: AuditResult,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            phase: phase.into(),
            event_type,
            tool_name: None,
            rule_id: None,
            condition: None,
            result,
            reason: reason.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>, condition: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self.condition = Some(condition.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_defaults() {
        let entry = WorkflowAuditEntry::new(
            "sess-1",
            "plan",
            AuditEventType::ToolCall,
            AuditResult::Block,
            "Tool 'Edit' not allowed in plan phase",
        );
        assert_eq!(entry.session_id, "sess-1");
        assert!(entry.tool_name.is_none());
        assert!(entry.context.is_empty());
    }

    #[test]
    fn test_with_tool_and_rule() {
        let entry = WorkflowAuditEntry::new(
            "sess-1",
            "plan",
            AuditEventType::RuleEval,
            AuditResult::Unmet,
            "guard failed",
        )
        .with_tool("Edit")
        .with_rule("r1", "tool == 'Edit'");
        assert_eq!(entry.tool_name.as_deref(), Some("Edit"));
        assert_eq!(entry.rule_id.as_deref(), Some("r1"));
        assert_eq!(entry.condition.as_deref(), Some("tool == 'Edit'"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let entry = WorkflowAuditEntry::new(
            "sess-1",
            "plan",
            AuditEventType::Transition,
            AuditResult::Transition,
            "plan -> execute",
        );
        let json = serde_json::to_string(&entry).unwrap();
        let back: WorkflowAuditEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.phase, "plan");
        assert_eq!(back.result, AuditResult::Transition);
    }
}
