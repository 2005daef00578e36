//! Session CRUD. Owns the `sessions` table exclusively.

use crate::models::Session;
use crate::sqlconv::{cli_source_from_str, cli_source_to_str, session_status_from_str, session_status_to_str};
use crate::store::SharedConn;
use chrono::Utc;
use gobby_core::ids::new_session_id;
use gobby_core::{CliSource, SessionStatus};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::BTreeMap;

pub struct SessionManager {
    conn: SharedConn,
}

fn row_to_session(row: &Row) -> rusqlite::Result<Session> {
    let terminal_context_raw: String = row.get("terminal_context")?;
    Ok(Session {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        source: cli_source_from_str(&row.get::<_, String>("source")?),
        seq_num: row.get("seq_num")?,
        parent_session_id: row.get("parent_session_id")?,
        spawned_by_agent_id: row.get("spawned_by_agent_id")?,
        agent_depth: row.get::<_, i64>("agent_depth")? as u32,
        status: session_status_from_str(&row.get::<_, String>("status")?),
        summary_markdown: row.get("summary_markdown")?,
        terminal_context: serde_json::from_str(&terminal_context_raw).unwrap_or_default(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl SessionManager {
    pub(crate) fn new(conn: SharedConn) -> Self {
        Self { conn }
    }

    /// Create a session. `seq_num` is `max(seq_num for project) + 1`,
    /// unique within `(project_id)`. Depth is derived from the parent when
    /// `parent_session_id` is given.
    pub fn create(
        &self,
        project_id: &str,
        source: CliSource,
        parent_session_id: Option<&str>,
        spawned_by_agent_id: Option<&str>,
    ) -> rusqlite::Result<Session> {
        let conn = self.conn.lock().unwrap();
        let next_seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(seq_num), 0) + 1 FROM sessions WHERE project_id = ?1",
            params![project_id],
            |r| r.get(0),
        )?;
        let agent_depth: u32 = match parent_session_id {
            Some(pid) => {
                let depth: i64 = conn.query_row(
                    "SELECT agent_depth FROM sessions WHERE id = ?1",
                    params![pid],
                    |r| r.get(0),
                )?;
                depth as u32 + 1
            }
            None => 0,
        };
        let now = Utc::now();
        let session = Session {
            id: new_session_id(),
            project_id: project_id.to_string(),
            source,
            seq_num: next_seq,
            parent_session_id: parent_session_id.map(String::from),
            spawned_by_agent_id: spawned_by_agent_id.map(String::from),
            agent_depth,
            status: SessionStatus::Active,
            summary_markdown: None,
            terminal_context: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        };
        conn.execute(
            "INSERT INTO sessions (id, project_id, source, seq_num, parent_session_id, spawned_by_agent_id,
             agent_depth, status, summary_markdown, terminal_context, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
            params![
                session.id,
                session.project_id,
                cli_source_to_str(session.source),
                session.seq_num,
                session.parent_session_id,
                session.spawned_by_agent_id,
                session.agent_depth,
                session_status_to_str(session.status),
                session.summary_markdown,
                "{}",
                session.created_at,
                session.updated_at,
            ],
        )?;
        Ok(session)
    }

    pub fn get(&self, id: &str) -> rusqlite::Result<Option<Session>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM sessions WHERE id = ?1", params![id], row_to_session)
            .optional()
    }

    pub fn find_by_seq_num(&self, project_id: &str, seq_num: i64) -> rusqlite::Result<Option<Session>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM sessions WHERE project_id = ?1 AND seq_num = ?2",
            params![project_id, seq_num],
            row_to_session,
        )
        .optional()
    }

    pub fn find_by_seq_num_any_project(&self, seq_num: i64) -> rusqlite::Result<Vec<Session>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM sessions WHERE seq_num = ?1")?;
        let rows = stmt.query_map(params![seq_num], row_to_session)?;
        rows.collect()
    }

    pub fn list_ids(&self, project_id: Option<&str>) -> rusqlite::Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        match project_id {
            Some(pid) => {
                let mut stmt = conn.prepare("SELECT id FROM sessions WHERE project_id = ?1")?;
                let rows = stmt.query_map(params![pid], |r| r.get(0))?;
                rows.collect()
            }
            None => {
                let mut stmt = conn.prepare("SELECT id FROM sessions")?;
                let rows = stmt.query_map([], |r| r.get(0))?;
                rows.collect()
            }
        }
    }

    pub fn list_by_project(&self, project_id: &str) -> rusqlite::Result<Vec<Session>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM sessions WHERE project_id = ?1 ORDER BY seq_num")?;
        let rows = stmt.query_map(params![project_id], row_to_session)?;
        rows.collect()
    }

    pub fn set_status(&self, id: &str, status: SessionStatus) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![session_status_to_str(status), Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn set_summary(&self, id: &str, summary_markdown: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sessions SET summary_markdown = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
            params![summary_markdown, session_status_to_str(SessionStatus::HandoffReady), Utc::now(), id],
        )?;
        Ok(())
    }

    /// Expire the oldest `handoff_ready` session in `(project_id)` other
    /// than `consuming_session_id`, as happens when a fresh session
    /// consumes the handoff.
    pub fn expire_oldest_handoff_ready(&self, project_id: &str, consuming_session_id: &str) -> rusqlite::Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let candidate: Option<String> = conn
            .query_row(
                "SELECT id FROM sessions WHERE project_id = ?1 AND status = 'handoff_ready' AND id != ?2
                 ORDER BY updated_at ASC LIMIT 1",
                params![project_id, consuming_session_id],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(id) = &candidate {
            conn.execute(
                "UPDATE sessions SET status = 'expired', updated_at = ?1 WHERE id = ?2",
                params![Utc::now(), id],
            )?;
        }
        Ok(candidate)
    }

    pub fn delete(&self, id: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn setup() -> (Store, String) {
        let store = Store::open_in_memory().unwrap();
        let p = store.projects().create("demo", "/tmp", "main").unwrap();
        (store, p.id)
    }

    #[test]
    fn test_seq_num_increments_per_project() {
        let (store, pid) = setup();
        let s1 = store.sessions().create(&pid, CliSource::ClaudeCode, None, None).unwrap();
        let s2 = store.sessions().create(&pid, CliSource::ClaudeCode, None, None).unwrap();
        assert_eq!(s1.seq_num, 1);
        assert_eq!(s2.seq_num, 2);
    }

    #[test]
    fn test_child_depth_derived_from_parent() {
        let (store, pid) = setup();
        let parent = store.sessions().create(&pid, CliSource::ClaudeCode, None, None).unwrap();
        let child = store
            .sessions()
            .create(&pid, CliSource::Codex, Some(&parent.id), Some("run-1"))
            .unwrap();
        assert_eq!(child.agent_depth, 1);
        assert_eq!(child.parent_session_id.as_deref(), Some(parent.id.as_str()));
    }

    #[test]
    fn test_expire_oldest_handoff_ready() {
        let (store, pid) = setup();
        let old = store.sessions().create(&pid, CliSource::ClaudeCode, None, None).unwrap();
        store.sessions().set_summary(&old.id, "summary").unwrap();
        let fresh = store.sessions().create(&pid, CliSource::ClaudeCode, None, None).unwrap();
        let expired = store.sessions().expire_oldest_handoff_ready(&pid, &fresh.id).unwrap();
        assert_eq!(expired.as_deref(), Some(old.id.as_str()));
        let reloaded = store.sessions().get(&old.id).unwrap().unwrap();
        assert_eq!(reloaded.status, SessionStatus::Expired);
    }
}
