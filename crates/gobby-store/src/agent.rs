//! Agent run history. Owns `agent_runs` exclusively.

use crate::models::AgentRun;
use crate::sqlconv::{agent_run_status_from_str, agent_run_status_to_str, isolation_from_str, isolation_to_str, spawn_mode_from_str, spawn_mode_to_str};
use crate::store::SharedConn;
use chrono::Utc;
use gobby_core::ids::new_agent_run_id;
use gobby_core::{AgentRunStatus, IsolationMode, SpawnMode};
use rusqlite::{params, OptionalExtension, Row};

pub struct AgentRunManager {
    conn: SharedConn,
}

fn row_to_run(row: &Row) -> rusqlite::Result<AgentRun> {
    let result_raw: Option<String> = row.get("result")?;
    Ok(AgentRun {
        id: row.get("id")?,
        parent_session_id: row.get("parent_session_id")?,
        child_session_id: row.get("child_session_id")?,
        workflow_name: row.get("workflow_name")?,
        provider: row.get("provider")?,
        model: row.get("model")?,
        status: agent_run_status_from_str(&row.get::<_, String>("status")?),
        prompt: row.get("prompt")?,
        isolation: isolation_from_str(&row.get::<_, String>("isolation")?),
        mode: spawn_mode_from_str(&row.get::<_, String>("mode")?),
        worktree_id: row.get("worktree_id")?,
        clone_id: row.get("clone_id")?,
        result: result_raw.and_then(|r| serde_json::from_str(&r).ok()),
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
    })
}

impl AgentRunManager {
    pub(crate) fn new(conn: SharedConn) -> Self {
        Self { conn }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        parent_session_id: &str,
        workflow_name: Option<&str>,
        provider: &str,
        model: Option<&str>,
        prompt: &str,
        isolation: IsolationMode,
        mode: SpawnMode,
        worktree_id: Option<&str>,
        clone_id: Option<&str>,
    ) -> rusqlite::Result<AgentRun> {
        let run = AgentRun {
            id: new_agent_run_id(),
            parent_session_id: parent_session_id.to_string(),
            child_session_id: None,
            workflow_name: workflow_name.map(String::from),
            provider: provider.to_string(),
            model: model.map(String::from),
            status: AgentRunStatus::Running,
            prompt: prompt.to_string(),
            isolation,
            mode,
            worktree_id: worktree_id.map(String::from),
            clone_id: clone_id.map(String::from),
            result: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO agent_runs (id, parent_session_id, child_session_id, workflow_name, provider, model,
             status, prompt, isolation, mode, worktree_id, clone_id, result, started_at, completed_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
            params![
                run.id,
                run.parent_session_id,
                run.child_session_id,
                run.workflow_name,
                run.provider,
                run.model,
                agent_run_status_to_str(run.status),
                run.prompt,
                isolation_to_str(run.isolation),
                spawn_mode_to_str(run.mode),
                run.worktree_id,
                run.clone_id,
                None::<String>,
                run.started_at,
                run.completed_at,
            ],
        )?;
        Ok(run)
    }

    pub fn get(&self, id: &str) -> rusqlite::Result<Option<AgentRun>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM agent_runs WHERE id = ?1", params![id], row_to_run)
            .optional()
    }

    pub fn set_child_session(&self, id: &str, child_session_id: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE agent_runs SET child_session_id = ?1 WHERE id = ?2",
            params![child_session_id, id],
        )?;
        Ok(())
    }

    pub fn finish(&self, id: &str, status: AgentRunStatus, result: Option<serde_json::Value>) -> rusqlite::Result<()> {
        let result_str = result.map(|v| v.to_string());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE agent_runs SET status = ?1, result = ?2, completed_at = ?3 WHERE id = ?4",
            params![agent_run_status_to_str(status), result_str, Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn list_running(&self) -> rusqlite::Result<Vec<AgentRun>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM agent_runs WHERE status = 'running'")?;
        let rows = stmt.query_map([], row_to_run)?;
        rows.collect()
    }

    pub fn list_by_parent_session(&self, parent_session_id: &str) -> rusqlite::Result<Vec<AgentRun>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM agent_runs WHERE parent_session_id = ?1 ORDER BY started_at",
        )?;
        let rows = stmt.query_map(params![parent_session_id], row_to_run)?;
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
    fn test_create_and_finish_run() {
        let (store, sid) = setup();
        let run = store
            .agent_runs()
            .create(&sid, None, "anthropic", Some("sonnet"), "fix bug", IsolationMode::Worktree, SpawnMode::Headless, Some("wt-1"), None)
            .unwrap();
        assert_eq!(run.status, AgentRunStatus::Running);
        store
            .agent_runs()
            .finish(&run.id, AgentRunStatus::Completed, Some(serde_json::json!({"ok": true})))
            .unwrap();
        let reloaded = store.agent_runs().get(&run.id).unwrap().unwrap();
        assert_eq!(reloaded.status, AgentRunStatus::Completed);
        assert!(reloaded.result.is_some());
    }

    #[test]
    fn test_list_running_excludes_finished() {
        let (store, sid) = setup();
        let r1 = store
            .agent_runs()
            .create(&sid, None, "anthropic", None, "a", IsolationMode::Current, SpawnMode::InProcess, None, None)
            .unwrap();
        let r2 = store
            .agent_runs()
            .create(&sid, None, "anthropic", None, "b", IsolationMode::Current, SpawnMode::InProcess, None, None)
            .unwrap();
        store.agent_runs().finish(&r1.id, AgentRunStatus::Completed, None).unwrap();
        let running = store.agent_runs().list_running().unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, r2.id);
    }
}
