//! Project CRUD. Owns the `projects` table exclusively.

use crate::models::Project;
use crate::store::SharedConn;
use chrono::Utc;
use gobby_core::ids::new_project_id;
use rusqlite::{params, OptionalExtension, Row};

pub const ORPHANED_PROJECT_NAME: &str = "_orphaned";

pub struct ProjectManager {
    conn: SharedConn,
}

fn row_to_project(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        repo_path: row.get("repo_path")?,
        base_branch: row.get("base_branch")?,
        github_url: row.get("github_url")?,
        is_orphaned: row.get::<_, i64>("is_orphaned")? != 0,
        protected: row.get::<_, i64>("protected")? != 0,
        created_at: row.get("created_at")?,
    })
}

impl ProjectManager {
    pub(crate) fn new(conn: SharedConn) -> Self {
        Self { conn }
    }

    pub fn create(&self, name: &str, repo_path: &str, base_branch: &str) -> rusqlite::Result<Project> {
        let conn = self.conn.lock().unwrap();
        let project = Project {
            id: new_project_id(),
            name: name.to_string(),
            repo_path: repo_path.to_string(),
            base_branch: base_branch.to_string(),
            github_url: None,
            is_orphaned: name == ORPHANED_PROJECT_NAME,
            protected: false,
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO projects (id, name, repo_path, base_branch, github_url, is_orphaned, protected, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                project.id,
                project.name,
                project.repo_path,
                project.base_branch,
                project.github_url,
                project.is_orphaned as i64,
                project.protected as i64,
                project.created_at,
            ],
        )?;
        Ok(project)
    }

    /// Get or lazily create the `_orphaned` project.
    pub fn get_or_create_orphaned(&self) -> rusqlite::Result<Project> {
        if let Some(p) = self.get_by_name(ORPHANED_PROJECT_NAME)? {
            return Ok(p);
        }
        drop(self.conn.lock().unwrap());
        self.create(ORPHANED_PROJECT_NAME, "", "main")
    }

    pub fn get(&self, id: &str) -> rusqlite::Result<Option<Project>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM projects WHERE id = ?1", params![id], row_to_project)
            .optional()
    }

    pub fn get_by_name(&self, name: &str) -> rusqlite::Result<Option<Project>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM projects WHERE name = ?1", params![name], row_to_project)
            .optional()
    }

    pub fn list(&self) -> rusqlite::Result<Vec<Project>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM projects ORDER BY created_at")?;
        let rows = stmt.query_map([], row_to_project)?;
        rows.collect()
    }

    /// Patch `base_branch`/`github_url`; `None` leaves a field untouched.
    pub fn update(&self, id: &str, base_branch: Option<&str>, github_url: Option<&str>) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        if let Some(base_branch) = base_branch {
            conn.execute("UPDATE projects SET base_branch = ?1 WHERE id = ?2", params![base_branch, id])?;
        }
        if let Some(github_url) = github_url {
            conn.execute("UPDATE projects SET github_url = ?1 WHERE id = ?2", params![github_url, id])?;
        }
        Ok(())
    }

    pub fn rename(&self, id: &str, new_name: &str) -> anyhow::Result<()> {
        if new_name == ORPHANED_PROJECT_NAME {
            anyhow::bail!("cannot rename a project to the reserved name '{ORPHANED_PROJECT_NAME}'");
        }
        let conn = self.conn.lock().unwrap();
        conn.execute("UPDATE projects SET name = ?1 WHERE id = ?2", params![new_name, id])?;
        Ok(())
    }

    /// Delete a project, reassigning its tasks and sessions to `_orphaned`.
    /// Protected projects (including `_orphaned` itself) refuse deletion.
    pub fn delete(&self, id: &str) -> anyhow::Result<()> {
        let project = self
            .get(id)?
            .ok_or_else(|| anyhow::anyhow!("project '{id}' not found"))?;
        if project.protected || project.name == ORPHANED_PROJECT_NAME {
            anyhow::bail!("project '{}' is protected and cannot be deleted", project.name);
        }
        drop(project);
        let orphaned = self.get_or_create_orphaned()?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tasks SET project_id = ?1 WHERE project_id = ?2",
            params![orphaned.id, id],
        )?;
        conn.execute(
            "UPDATE sessions SET project_id = ?1 WHERE project_id = ?2",
            params![orphaned.id, id],
        )?;
        conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn test_create_and_get_project() {
        let store = Store::open_in_memory().unwrap();
        let p = store.projects().create("demo", "/tmp/demo", "main").unwrap();
        let fetched = store.projects().get(&p.id).unwrap().unwrap();
        assert_eq!(fetched.name, "demo");
        assert!(!fetched.is_orphaned);
    }

    #[test]
    fn test_orphaned_project_lazy_create() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.projects().get_by_name(ORPHANED_PROJECT_NAME).unwrap().is_none());
        let orphaned = store.projects().get_or_create_orphaned().unwrap();
        assert!(orphaned.is_orphaned);
        // Idempotent: second call returns the same row, not a duplicate.
        let again = store.projects().get_or_create_orphaned().unwrap();
        assert_eq!(orphaned.id, again.id);
    }

    #[test]
    fn test_update_patches_only_given_fields() {
        let store = Store::open_in_memory().unwrap();
        let p = store.projects().create("demo", "/tmp/demo", "main").unwrap();
        store.projects().update(&p.id, Some("develop"), None).unwrap();
        let updated = store.projects().get(&p.id).unwrap().unwrap();
        assert_eq!(updated.base_branch, "develop");
        assert!(updated.github_url.is_none());
    }

    #[test]
    fn test_rename_rejects_orphaned_name() {
        let store = Store::open_in_memory().unwrap();
        let p = store.projects().create("demo", "/tmp/demo", "main").unwrap();
        let err = store.projects().rename(&p.id, ORPHANED_PROJECT_NAME).unwrap_err();
        assert!(err.to_string().contains("reserved name"));
    }

    #[test]
    fn test_delete_reassigns_to_orphaned() {
        let store = Store::open_in_memory().unwrap();
        let p = store.projects().create("demo", "/tmp/demo", "main").unwrap();
        store
            .tasks()
            .create(&p.id, None, "t1", "", None, None, 2, gobby_core::TaskType::Task, vec![], None)
            .unwrap();
        store.projects().delete(&p.id).unwrap();
        let orphaned = store.projects().get_by_name(ORPHANED_PROJECT_NAME).unwrap().unwrap();
        let tasks = store.tasks().list_by_project(&orphaned.id).unwrap();
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn test_delete_protected_fails() {
        let store = Store::open_in_memory().unwrap();
        let orphaned = store.projects().get_or_create_orphaned().unwrap();
        let err = store.projects().delete(&orphaned.id).unwrap_err();
        assert!(err.to_string().contains("protected"));
    }
}
