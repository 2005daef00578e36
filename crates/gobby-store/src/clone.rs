//! Clone-isolation bookkeeping. Owns `clones` exclusively, mirroring
//! `worktree.rs`'s shape for the heavier, separate-checkout isolation mode.

use crate::models::Clone as CloneRow;
use crate::sqlconv::{clone_status_from_str, clone_status_to_str};
use crate::store::SharedConn;
use chrono::{DateTime, Utc};
use gobby_core::ids::new_clone_id;
use gobby_core::CloneStatus;
use rusqlite::{params, OptionalExtension, Row};

pub struct CloneManager {
    conn: SharedConn,
}

fn row_to_clone(row: &Row) -> rusqlite::Result<CloneRow> {
    Ok(CloneRow {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        task_id: row.get("task_id")?,
        branch_name: row.get("branch_name")?,
        clone_path: row.get("clone_path")?,
        base_branch: row.get("base_branch")?,
        remote_url: row.get("remote_url")?,
        agent_session_id: row.get("agent_session_id")?,
        status: clone_status_from_str(&row.get::<_, String>("status")?),
        last_sync_at: row.get("last_sync_at")?,
        cleanup_after: row.get("cleanup_after")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl CloneManager {
    pub(crate) fn new(conn: SharedConn) -> Self {
        Self { conn }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        project_id: &str,
        task_id: Option<&str>,
        branch_name: &str,
        clone_path: &str,
        base_branch: &str,
        remote_url: &str,
    ) -> rusqlite::Result<CloneRow> {
        let now = Utc::now();
        let clone = CloneRow {
            id: new_clone_id(),
            project_id: project_id.to_string(),
            task_id: task_id.map(String::from),
            branch_name: branch_name.to_string(),
            clone_path: clone_path.to_string(),
            base_branch: base_branch.to_string(),
            remote_url: remote_url.to_string(),
            agent_session_id: None,
            status: CloneStatus::Active,
            last_sync_at: None,
            cleanup_after: None,
            created_at: now,
            updated_at: now,
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO clones (id, project_id, task_id, branch_name, clone_path, base_branch, remote_url,
             agent_session_id, status, last_sync_at, cleanup_after, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
            params![
                clone.id,
                clone.project_id,
                clone.task_id,
                clone.branch_name,
                clone.clone_path,
                clone.base_branch,
                clone.remote_url,
                clone.agent_session_id,
                clone_status_to_str(clone.status),
                clone.last_sync_at,
                clone.cleanup_after,
                clone.created_at,
                clone.updated_at,
            ],
        )?;
        Ok(clone)
    }

    pub fn get(&self, id: &str) -> rusqlite::Result<Option<CloneRow>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM clones WHERE id = ?1", params![id], row_to_clone)
            .optional()
    }

    pub fn mark_synced(&self, id: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE clones SET status = 'synced', last_sync_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn schedule_cleanup(&self, id: &str, cleanup_after: DateTime<Utc>) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE clones SET cleanup_after = ?1, updated_at = ?2 WHERE id = ?3",
            params![cleanup_after, Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn set_status(&self, id: &str, status: CloneStatus) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE clones SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![clone_status_to_str(status), Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn list_by_project(&self, project_id: &str) -> rusqlite::Result<Vec<CloneRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM clones WHERE project_id = ?1 ORDER BY created_at")?;
        let rows = stmt.query_map(params![project_id], row_to_clone)?;
        rows.collect()
    }

    pub fn list_due_for_cleanup(&self, now: DateTime<Utc>) -> rusqlite::Result<Vec<CloneRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM clones WHERE cleanup_after IS NOT NULL AND cleanup_after <= ?1")?;
        let rows = stmt.query_map(params![now], row_to_clone)?;
        rows.collect()
    }

    pub fn delete(&self, id: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM clones WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use chrono::Duration;

    #[test]
    fn test_create_and_mark_synced() {
        let store = Store::open_in_memory().unwrap();
        let p = store.projects().create("demo", "/tmp", "main").unwrap();
        let c = store
            .clones()
            .create(&p.id, None, "gobby/c1", "/tmp/c1", "main", "git@example.com:org/repo.git")
            .unwrap();
        store.clones().mark_synced(&c.id).unwrap();
        let reloaded = store.clones().get(&c.id).unwrap().unwrap();
        assert_eq!(reloaded.status, CloneStatus::Synced);
        assert!(reloaded.last_sync_at.is_some());
    }

    #[test]
    fn test_list_by_project() {
        let store = Store::open_in_memory().unwrap();
        let p = store.projects().create("demo", "/tmp", "main").unwrap();
        store.clones().create(&p.id, None, "gobby/c1", "/tmp/c1", "main", "git@example.com:org/repo.git").unwrap();
        store.clones().create(&p.id, None, "gobby/c2", "/tmp/c2", "main", "git@example.com:org/repo.git").unwrap();
        assert_eq!(store.clones().list_by_project(&p.id).unwrap().len(), 2);
    }

    #[test]
    fn test_list_due_for_cleanup() {
        let store = Store::open_in_memory().unwrap();
        let p = store.projects().create("demo", "/tmp", "main").unwrap();
        let c = store
            .clones()
            .create(&p.id, None, "gobby/c1", "/tmp/c1", "main", "git@example.com:org/repo.git")
            .unwrap();
        let past = Utc::now() - Duration::hours(1);
        store.clones().schedule_cleanup(&c.id, past).unwrap();
        let due = store.clones().list_due_for_cleanup(Utc::now()).unwrap();
        assert_eq!(due.len(), 1);
    }
}
