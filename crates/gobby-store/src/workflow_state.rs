//! Per-session workflow state plus its append-only audit log. Owns
//! `workflow_states` and `workflow_audit_log` exclusively.

use crate::models::WorkflowStateRow;
use crate::store::SharedConn;
use chrono::Utc;
use gobby_core::audit::{AuditEventType, AuditResult, WorkflowAuditEntry};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::BTreeMap;

pub struct WorkflowStateManager {
    conn: SharedConn,
}

fn row_to_state(row: &Row) -> rusqlite::Result<WorkflowStateRow> {
    let variables_raw: String = row.get("variables")?;
    let artifacts_raw: String = row.get("artifacts")?;
    Ok(WorkflowStateRow {
        session_id: row.get("session_id")?,
        workflow_name: row.get("workflow_name")?,
        definition_snapshot: row.get("definition_snapshot")?,
        current_phase: row.get("current_phase")?,
        phase_entered_at: row.get("phase_entered_at")?,
        phase_action_count: row.get::<_, i64>("phase_action_count")? as u32,
        total_action_count: row.get::<_, i64>("total_action_count")? as u32,
        variables: serde_json::from_str(&variables_raw).unwrap_or_default(),
        artifacts: serde_json::from_str(&artifacts_raw).unwrap_or_default(),
        reflection_pending: row.get::<_, i64>("reflection_pending")? != 0,
        context_injected: row.get::<_, i64>("context_injected")? != 0,
        pending_approval: row.get("pending_approval")?,
        active: row.get::<_, i64>("active")? != 0,
    })
}

fn row_to_audit_entry(row: &Row) -> rusqlite::Result<WorkflowAuditEntry> {
    let context_raw: String = row.get("context")?;
    let event_type: String = row.get("event_type")?;
    let result: String = row.get("result")?;
    Ok(WorkflowAuditEntry {
        session_id: row.get("session_id")?,
        timestamp: row.get("timestamp")?,
        phase: row.get("phase")?,
        event_type: parse_event_type(&event_type),
        tool_name: row.get("tool_name")?,
        rule_id: row.get("rule_id")?,
        condition: row.get("condition")?,
        result: parse_audit_result(&result),
        reason: row.get("reason")?,
        context: serde_json::from_str(&context_raw).unwrap_or_default(),
    })
}

fn event_type_str(e: AuditEventType) -> &'static str {
    match e {
        AuditEventType::ToolCall => "tool_call",
        AuditEventType::RuleEval => "rule_eval",
        AuditEventType::Transition => "transition",
        AuditEventType::ExitCheck => "exit_check",
        AuditEventType::Approval => "approval",
    }
}

fn parse_event_type(s: &str) -> AuditEventType {
    match s {
        "rule_eval" => AuditEventType::RuleEval,
        "transition" => AuditEventType::Transition,
        "exit_check" => AuditEventType::ExitCheck,
        "approval" => AuditEventType::Approval,
        _ => AuditEventType::ToolCall,
    }
}

fn audit_result_str(r: AuditResult) -> &'static str {
    match r {
        AuditResult::Allow => "allow",
        AuditResult::Block => "block",
        AuditResult::Transition => "transition",
        AuditResult::Skip => "skip",
        AuditResult::Met => "met",
        AuditResult::Unmet => "unmet",
        AuditResult::Approved => "approved",
        AuditResult::Rejected => "rejected",
        AuditResult::Pending => "pending",
    }
}

fn parse_audit_result(s: &str) -> AuditResult {
    match s {
        "block" => AuditResult::Block,
        "transition" => AuditResult::Transition,
        "skip" => AuditResult::Skip,
        "met" => AuditResult::Met,
        "unmet" => AuditResult::Unmet,
        "approved" => AuditResult::Approved,
        "rejected" => AuditResult::Rejected,
        "pending" => AuditResult::Pending,
        _ => AuditResult::Allow,
    }
}

impl WorkflowStateManager {
    pub(crate) fn new(conn: SharedConn) -> Self {
        Self { conn }
    }

    pub fn activate(&self, session_id: &str, workflow_name: &str, definition_snapshot: &str, initial_phase: &str) -> rusqlite::Result<WorkflowStateRow> {
        let state = WorkflowStateRow {
            session_id: session_id.to_string(),
            workflow_name: workflow_name.to_string(),
            definition_snapshot: definition_snapshot.to_string(),
            current_phase: initial_phase.to_string(),
            phase_entered_at: Utc::now(),
            phase_action_count: 0,
            total_action_count: 0,
            variables: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            reflection_pending: false,
            context_injected: false,
            pending_approval: None,
            active: true,
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO workflow_states (session_id, workflow_name, definition_snapshot, current_phase,
             phase_entered_at, phase_action_count, total_action_count, variables, artifacts,
             reflection_pending, context_injected, pending_approval, active)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)
             ON CONFLICT(session_id) DO UPDATE SET
                workflow_name=excluded.workflow_name, definition_snapshot=excluded.definition_snapshot,
                current_phase=excluded.current_phase, phase_entered_at=excluded.phase_entered_at,
                phase_action_count=0, total_action_count=0, variables='{}', artifacts='{}',
                reflection_pending=0, context_injected=0, pending_approval=NULL, active=1",
            params![
                state.session_id,
                state.workflow_name,
                state.definition_snapshot,
                state.current_phase,
                state.phase_entered_at,
                state.phase_action_count,
                state.total_action_count,
                "{}",
                "{}",
                state.reflection_pending as i64,
                state.context_injected as i64,
                state.pending_approval,
                state.active as i64,
            ],
        )?;
        Ok(state)
    }

    pub fn get(&self, session_id: &str) -> rusqlite::Result<Option<WorkflowStateRow>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM workflow_states WHERE session_id = ?1", params![session_id], row_to_state)
            .optional()
    }

    pub fn transition_phase(&self, session_id: &str, new_phase: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE workflow_states SET current_phase = ?1, phase_entered_at = ?2, phase_action_count = 0
             WHERE session_id = ?3",
            params![new_phase, Utc::now(), session_id],
        )?;
        Ok(())
    }

    pub fn increment_action_counts(&self, session_id: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE workflow_states SET phase_action_count = phase_action_count + 1,
             total_action_count = total_action_count + 1 WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }

    pub fn set_variable(&self, session_id: &str, key: &str, value: serde_json::Value) -> rusqlite::Result<()> {
        let mut state = self
            .get(session_id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        state.variables.insert(key.to_string(), value);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE workflow_states SET variables = ?1 WHERE session_id = ?2",
            params![serde_json::to_string(&state.variables).unwrap(), session_id],
        )?;
        Ok(())
    }

    pub fn capture_artifact(&self, session_id: &str, key: &str, value: &str) -> rusqlite::Result<()> {
        let mut state = self
            .get(session_id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        state.artifacts.insert(key.to_string(), value.to_string());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE workflow_states SET artifacts = ?1 WHERE session_id = ?2",
            params![serde_json::to_string(&state.artifacts).unwrap(), session_id],
        )?;
        Ok(())
    }

    pub fn set_pending_approval(&self, session_id: &str, action: Option<&str>) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE workflow_states SET pending_approval = ?1 WHERE session_id = ?2",
            params![action, session_id],
        )?;
        Ok(())
    }

    pub fn deactivate(&self, session_id: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("UPDATE workflow_states SET active = 0 WHERE session_id = ?1", params![session_id])?;
        Ok(())
    }

    pub fn append_audit(&self, entry: &WorkflowAuditEntry) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO workflow_audit_log (session_id, timestamp, phase, event_type, tool_name, rule_id,
             condition, result, reason, context) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                entry.session_id,
                entry.timestamp,
                entry.phase,
                event_type_str(entry.event_type),
                entry.tool_name,
                entry.rule_id,
                entry.condition,
                audit_result_str(entry.result),
                entry.reason,
                serde_json::to_string(&entry.context).unwrap(),
            ],
        )?;
        Ok(())
    }

    pub fn list_audit(&self, session_id: &str) -> rusqlite::Result<Vec<WorkflowAuditEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM workflow_audit_log WHERE session_id = ?1 ORDER BY rowid_seq",
        )?;
        let rows = stmt.query_map(params![session_id], row_to_audit_entry)?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use gobby_core::CliSource;

    fn setup() -> (Store, String) {
        let store = Store::open_in_memory().unwrap();
        let p = store.projects().create("demo", "/tmp", "main").unwrap();
        let s = store.sessions().create(&p.id, CliSource::ClaudeCode, None, None).unwrap();
        (store, s.id)
    }

    #[test]
    fn test_activate_and_transition() {
        let (store, sid) = setup();
        store.workflow_states().activate(&sid, "tdd", "name: tdd", "plan").unwrap();
        store.workflow_states().transition_phase(&sid, "execute").unwrap();
        let state = store.workflow_states().get(&sid).unwrap().unwrap();
        assert_eq!(state.current_phase, "execute");
        assert_eq!(state.phase_action_count, 0);
    }

    #[test]
    fn test_action_counts_increment() {
        let (store, sid) = setup();
        store.workflow_states().activate(&sid, "tdd", "name: tdd", "plan").unwrap();
        store.workflow_states().increment_action_counts(&sid).unwrap();
        store.workflow_states().increment_action_counts(&sid).unwrap();
        let state = store.workflow_states().get(&sid).unwrap().unwrap();
        assert_eq!(state.phase_action_count, 2);
        assert_eq!(state.total_action_count, 2);
    }

    #[test]
    fn test_audit_log_is_append_only_ordered() {
        let (store, sid) = setup();
        store.workflow_states().activate(&sid, "tdd", "name: tdd", "plan").unwrap();
        let e1 = WorkflowAuditEntry::new(&sid, "plan", AuditEventType::ToolCall, AuditResult::Allow, "ok");
        let e2 = WorkflowAuditEntry::new(&sid, "plan", AuditEventType::Transition, AuditResult::Transition, "plan -> execute");
        store.workflow_states().append_audit(&e1).unwrap();
        store.workflow_states().append_audit(&e2).unwrap();
        let entries = store.workflow_states().list_audit(&sid).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].reason, "plan -> execute");
    }
}
