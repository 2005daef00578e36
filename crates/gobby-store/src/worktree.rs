//! Worktree-isolation bookkeeping. Owns `worktrees` exclusively. Actual
//! filesystem/git operations live in the git-ops collaborator; this is
//! just the ledger of what's been created.

use crate::models::Worktree;
use crate::sqlconv::{worktree_status_from_str, worktree_status_to_str};
use crate::store::SharedConn;
use chrono::Utc;
use gobby_core::ids::new_worktree_id;
use gobby_core::WorktreeStatus;
use rusqlite::{params, OptionalExtension, Row};

pub struct WorktreeManager {
    conn: SharedConn,
}

fn row_to_worktree(row: &Row) -> rusqlite::Result<Worktree> {
    Ok(Worktree {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        task_id: row.get("task_id")?,
        branch_name: row.get("branch_name")?,
        worktree_path: row.get("worktree_path")?,
        base_branch: row.get("base_branch")?,
        agent_session_id: row.get("agent_session_id")?,
        status: worktree_status_from_str(&row.get::<_, String>("status")?),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl WorktreeManager {
    pub(crate) fn new(conn: SharedConn) -> Self {
        Self { conn }
    }

    pub fn create(
        &self,
        project_id: &str,
        task_id: Option<&str>,
        branch_name: &str,
        worktree_path: &str,
        base_branch: &str,
    ) -> rusqlite::Result<Worktree> {
        let now = Utc::now();
        let worktree = Worktree {
            id: new_worktree_id(),
            project_id: project_id.to_string(),
            task_id: task_id.map(String::from),
            branch_name: branch_name.to_string(),
            worktree_path: worktree_path.to_string(),
            base_branch: base_branch.to_string(),
            agent_session_id: None,
            status: WorktreeStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO worktrees (id, project_id, task_id, branch_name, worktree_path, base_branch,
             agent_session_id, status, created_at, updated_at) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                worktree.id,
                worktree.project_id,
                worktree.task_id,
                worktree.branch_name,
                worktree.worktree_path,
                worktree.base_branch,
                worktree.agent_session_id,
                worktree_status_to_str(worktree.status),
                worktree.created_at,
                worktree.updated_at,
            ],
        )?;
        Ok(worktree)
    }

    pub fn get(&self, id: &str) -> rusqlite::Result<Option<Worktree>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM worktrees WHERE id = ?1", params![id], row_to_worktree)
            .optional()
    }

    pub fn assign_session(&self, id: &str, agent_session_id: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE worktrees SET agent_session_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![agent_session_id, Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn set_status(&self, id: &str, status: WorktreeStatus) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE worktrees SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![worktree_status_to_str(status), Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn list_by_project(&self, project_id: &str) -> rusqlite::Result<Vec<Worktree>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM worktrees WHERE project_id = ?1 ORDER BY created_at")?;
        let rows = stmt.query_map(params![project_id], row_to_worktree)?;
        rows.collect()
    }

    pub fn list_stale(&self) -> rusqlite::Result<Vec<Worktree>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM worktrees WHERE status IN ('stale', 'merged', 'abandoned')")?;
        let rows = stmt.query_map([], row_to_worktree)?;
        rows.collect()
    }

    pub fn delete(&self, id: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM worktrees WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn test_create_and_retrieve_worktree() {
        let store = Store::open_in_memory().unwrap();
        let p = store.projects().create("demo", "/tmp", "main").unwrap();
        let wt = store
            .worktrees()
            .create(&p.id, None, "gobby/wt-1", "/tmp/wt-1", "main")
            .unwrap();
        let fetched = store.worktrees().get(&wt.id).unwrap().unwrap();
        assert_eq!(fetched.status, WorktreeStatus::Active);
    }

    #[test]
    fn test_list_stale_filters_active() {
        let store = Store::open_in_memory().unwrap();
        let p = store.projects().create("demo", "/tmp", "main").unwrap();
        let wt1 = store.worktrees().create(&p.id, None, "b1", "/tmp/1", "main").unwrap();
        let wt2 = store.worktrees().create(&p.id, None, "b2", "/tmp/2", "main").unwrap();
        store.worktrees().set_status(&wt2.id, WorktreeStatus::Stale).unwrap();
        let stale = store.worktrees().list_stale().unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, wt2.id);
        assert_ne!(stale[0].id, wt1.id);
    }
}
