//! Task CRUD and dependency-edge storage. Owns `tasks` and
//! `task_dependencies` exclusively. Cycle detection over the edges lives
//! one layer up; this module only stores and lists them.

use crate::models::{Task, TaskDependency};
use crate::sqlconv::{dep_type_from_str, dep_type_to_str, task_status_from_str, task_status_to_str, task_type_from_str, task_type_to_str};
use crate::store::SharedConn;
use chrono::Utc;
use gobby_core::ids::new_task_id;
use gobby_core::{DependencyType, TaskStatus, TaskType};
use rusqlite::{params, OptionalExtension, Row};

pub struct TaskManager {
    conn: SharedConn,
}

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    let labels_raw: String = row.get("labels")?;
    let commits_raw: String = row.get("commits")?;
    Ok(Task {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        parent_task_id: row.get("parent_task_id")?,
        seq_num: row.get("seq_num")?,
        title: row.get("title")?,
        description: row.get("description")?,
        details: row.get("details")?,
        test_strategy: row.get("test_strategy")?,
        status: task_status_from_str(&row.get::<_, String>("status")?),
        priority: row.get::<_, i64>("priority")? as u8,
        task_type: task_type_from_str(&row.get::<_, String>("type")?),
        labels: serde_json::from_str(&labels_raw).unwrap_or_default(),
        validation_criteria: row.get("validation_criteria")?,
        validation_fail_count: row.get::<_, i64>("validation_fail_count")? as u32,
        validation_status: row.get("validation_status")?,
        validation_feedback: row.get("validation_feedback")?,
        commits: serde_json::from_str(&commits_raw).unwrap_or_default(),
        closed_in_session_id: row.get("closed_in_session_id")?,
        closed_commit_sha: row.get("closed_commit_sha")?,
        created_in_session_id: row.get("created_in_session_id")?,
        compacted_at: row.get("compacted_at")?,
        summary: row.get("summary")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl TaskManager {
    pub(crate) fn new(conn: SharedConn) -> Self {
        Self { conn }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        project_id: &str,
        parent_task_id: Option<&str>,
        title: &str,
        description: &str,
        details: Option<&str>,
        test_strategy: Option<&str>,
        priority: u8,
        task_type: TaskType,
        labels: Vec<String>,
        validation_criteria: Option<&str>,
    ) -> rusqlite::Result<Task> {
        let conn = self.conn.lock().unwrap();
        let next_seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(seq_num), 0) + 1 FROM tasks WHERE project_id = ?1",
            params![project_id],
            |r| r.get(0),
        )?;
        let now = Utc::now();
        let task = Task {
            id: new_task_id(project_id, next_seq as u32),
            project_id: project_id.to_string(),
            parent_task_id: parent_task_id.map(String::from),
            seq_num: next_seq,
            title: title.to_string(),
            description: description.to_string(),
            details: details.map(String::from),
            test_strategy: test_strategy.map(String::from),
            status: TaskStatus::Pending,
            priority,
            task_type,
            labels,
            validation_criteria: validation_criteria.map(String::from),
            validation_fail_count: 0,
            validation_status: None,
            validation_feedback: None,
            commits: Vec::new(),
            closed_in_session_id: None,
            closed_commit_sha: None,
            created_in_session_id: None,
            compacted_at: None,
            summary: None,
            created_at: now,
            updated_at: now,
        };
        conn.execute(
            "INSERT INTO tasks (id, project_id, parent_task_id, seq_num, title, description, details,
             test_strategy, status, priority, type, labels, validation_criteria, validation_fail_count,
             validation_status, validation_feedback, commits, closed_in_session_id, closed_commit_sha,
             created_in_session_id, compacted_at, summary, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23,?24)",
            params![
                task.id,
                task.project_id,
                task.parent_task_id,
                task.seq_num,
                task.title,
                task.description,
                task.details,
                task.test_strategy,
                task_status_to_str(task.status),
                task.priority as i64,
                task_type_to_str(task.task_type),
                serde_json::to_string(&task.labels).unwrap(),
                task.validation_criteria,
                task.validation_fail_count,
                task.validation_status,
                task.validation_feedback,
                serde_json::to_string(&task.commits).unwrap(),
                task.closed_in_session_id,
                task.closed_commit_sha,
                task.created_in_session_id,
                task.compacted_at,
                task.summary,
                task.created_at,
                task.updated_at,
            ],
        )?;
        Ok(task)
    }

    pub fn get(&self, id: &str) -> rusqlite::Result<Option<Task>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
            .optional()
    }

    pub fn find_by_seq_num(&self, project_id: &str, seq_num: i64) -> rusqlite::Result<Option<Task>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM tasks WHERE project_id = ?1 AND seq_num = ?2",
            params![project_id, seq_num],
            row_to_task,
        )
        .optional()
    }

    pub fn list_ids(&self, project_id: Option<&str>) -> rusqlite::Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        match project_id {
            Some(pid) => {
                let mut stmt = conn.prepare("SELECT id FROM tasks WHERE project_id = ?1")?;
                let rows = stmt.query_map(params![pid], |r| r.get(0))?;
                rows.collect()
            }
            None => {
                let mut stmt = conn.prepare("SELECT id FROM tasks")?;
                let rows = stmt.query_map([], |r| r.get(0))?;
                rows.collect()
            }
        }
    }

    pub fn list_by_project(&self, project_id: &str) -> rusqlite::Result<Vec<Task>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM tasks WHERE project_id = ?1 ORDER BY seq_num")?;
        let rows = stmt.query_map(params![project_id], row_to_task)?;
        rows.collect()
    }

    pub fn list_open_by_project(&self, project_id: &str) -> rusqlite::Result<Vec<Task>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM tasks WHERE project_id = ?1 AND status IN ('pending', 'in_progress') ORDER BY seq_num",
        )?;
        let rows = stmt.query_map(params![project_id], row_to_task)?;
        rows.collect()
    }

    pub fn set_status(&self, id: &str, status: TaskStatus) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![task_status_to_str(status), Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn close(&self, id: &str, session_id: &str, commit_sha: Option<&str>) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tasks SET status = 'completed', closed_in_session_id = ?1, closed_commit_sha = ?2,
             updated_at = ?3 WHERE id = ?4",
            params![session_id, commit_sha, Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn reopen(&self, id: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tasks SET status = 'pending', closed_in_session_id = NULL, closed_commit_sha = NULL,
             updated_at = ?1 WHERE id = ?2",
            params![Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn record_validation_failure(&self, id: &str, feedback: &str) -> rusqlite::Result<u32> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tasks SET validation_fail_count = validation_fail_count + 1, validation_status = 'failed',
             validation_feedback = ?1, updated_at = ?2 WHERE id = ?3",
            params![feedback, Utc::now(), id],
        )?;
        conn.query_row(
            "SELECT validation_fail_count FROM tasks WHERE id = ?1",
            params![id],
            |r| r.get::<_, i64>(0),
        )
        .map(|n| n as u32)
    }

    pub fn append_commit(&self, id: &str, sha: &str) -> rusqlite::Result<()> {
        let task = self
            .get(id)?
            .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows)?;
        let mut commits = task.commits;
        commits.push(sha.to_string());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tasks SET commits = ?1, updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(&commits).unwrap(), Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn compact(&self, id: &str, summary: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tasks SET summary = ?1, compacted_at = ?2, details = NULL WHERE id = ?3",
            params![summary, Utc::now(), id],
        )?;
        Ok(())
    }

    /// Patch the user-editable fields of a task; `None` leaves a field
    /// untouched. Status, dependency and close/reopen transitions go
    /// through their own dedicated methods instead.
    pub fn update(&self, id: &str, title: Option<&str>, description: Option<&str>, details: Option<&str>, priority: Option<u8>, labels: Option<&[String]>) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        if let Some(title) = title {
            conn.execute("UPDATE tasks SET title = ?1, updated_at = ?2 WHERE id = ?3", params![title, Utc::now(), id])?;
        }
        if let Some(description) = description {
            conn.execute("UPDATE tasks SET description = ?1, updated_at = ?2 WHERE id = ?3", params![description, Utc::now(), id])?;
        }
        if let Some(details) = details {
            conn.execute("UPDATE tasks SET details = ?1, updated_at = ?2 WHERE id = ?3", params![details, Utc::now(), id])?;
        }
        if let Some(priority) = priority {
            conn.execute("UPDATE tasks SET priority = ?1, updated_at = ?2 WHERE id = ?3", params![priority as i64, Utc::now(), id])?;
        }
        if let Some(labels) = labels {
            conn.execute("UPDATE tasks SET labels = ?1, updated_at = ?2 WHERE id = ?3", params![serde_json::to_string(labels).unwrap(), Utc::now(), id])?;
        }
        Ok(())
    }

    /// Hard-delete a task row and its dependency edges. Used to roll back a
    /// `create_task` call that would otherwise introduce a cycle.
    pub fn delete_hard(&self, id: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM task_dependencies WHERE task_id = ?1 OR depends_on = ?1", params![id])?;
        conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn add_dependency(&self, task_id: &str, depends_on: &str, dep_type: DependencyType) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO task_dependencies (task_id, depends_on, dep_type) VALUES (?1, ?2, ?3)",
            params![task_id, depends_on, dep_type_to_str(dep_type)],
        )?;
        Ok(())
    }

    pub fn remove_dependency(&self, task_id: &str, depends_on: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM task_dependencies WHERE task_id = ?1 AND depends_on = ?2",
            params![task_id, depends_on],
        )?;
        Ok(())
    }

    /// All dependency edges for a project, as `(task_id, depends_on,
    /// dep_type)` triples, for the caller to feed into a graph.
    pub fn list_dependencies_for_project(&self, project_id: &str) -> rusqlite::Result<Vec<(String, String, TaskDependency)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT d.task_id, d.depends_on, d.dep_type FROM task_dependencies d
             JOIN tasks t ON t.id = d.task_id WHERE t.project_id = ?1",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            let dep_type: String = row.get(2)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                TaskDependency { dep_type: dep_type_from_str(&dep_type) },
            ))
        })?;
        rows.collect()
    }

    pub fn dependencies_of(&self, task_id: &str) -> rusqlite::Result<Vec<(String, TaskDependency)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT depends_on, dep_type FROM task_dependencies WHERE task_id = ?1")?;
        let rows = stmt.query_map(params![task_id], |row| {
            let dep_type: String = row.get(1)?;
            Ok((row.get::<_, String>(0)?, TaskDependency { dep_type: dep_type_from_str(&dep_type) }))
        })?;
        rows.collect()
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
        let t1 = store
            .tasks()
            .create(&pid, None, "a", "", None, None, 2, TaskType::Task, vec![], None)
            .unwrap();
        let t2 = store
            .tasks()
            .create(&pid, None, "b", "", None, None, 2, TaskType::Task, vec![], None)
            .unwrap();
        assert_eq!(t1.seq_num, 1);
        assert_eq!(t2.seq_num, 2);
        assert_ne!(t1.id, t2.id);
    }

    #[test]
    fn test_close_and_reopen() {
        let (store, pid) = setup();
        let t = store
            .tasks()
            .create(&pid, None, "a", "", None, None, 2, TaskType::Task, vec![], None)
            .unwrap();
        store.tasks().close(&t.id, "sess-1", Some("abc123")).unwrap();
        let closed = store.tasks().get(&t.id).unwrap().unwrap();
        assert_eq!(closed.status, TaskStatus::Completed);
        assert_eq!(closed.closed_commit_sha.as_deref(), Some("abc123"));

        store.tasks().reopen(&t.id).unwrap();
        let reopened = store.tasks().get(&t.id).unwrap().unwrap();
        assert_eq!(reopened.status, TaskStatus::Pending);
        assert!(reopened.closed_commit_sha.is_none());
    }

    #[test]
    fn test_update_patches_only_given_fields() {
        let (store, pid) = setup();
        let t = store
            .tasks()
            .create(&pid, None, "a", "original description", None, None, 2, TaskType::Task, vec![], None)
            .unwrap();
        store.tasks().update(&t.id, Some("renamed"), None, None, Some(5), None).unwrap();
        let updated = store.tasks().get(&t.id).unwrap().unwrap();
        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.description, "original description");
        assert_eq!(updated.priority, 5);
    }

    #[test]
    fn test_validation_fail_count_increments() {
        let (store, pid) = setup();
        let t = store
            .tasks()
            .create(&pid, None, "a", "", None, None, 2, TaskType::Task, vec![], None)
            .unwrap();
        let n1 = store.tasks().record_validation_failure(&t.id, "missing tests").unwrap();
        let n2 = store.tasks().record_validation_failure(&t.id, "still failing").unwrap();
        assert_eq!(n1, 1);
        assert_eq!(n2, 2);
    }

    #[test]
    fn test_dependency_edges_roundtrip() {
        let (store, pid) = setup();
        let t1 = store
            .tasks()
            .create(&pid, None, "a", "", None, None, 2, TaskType::Task, vec![], None)
            .unwrap();
        let t2 = store
            .tasks()
            .create(&pid, None, "b", "", None, None, 2, TaskType::Task, vec![], None)
            .unwrap();
        store.tasks().add_dependency(&t2.id, &t1.id, DependencyType::Blocks).unwrap();
        let edges = store.tasks().list_dependencies_for_project(&pid).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].0, t2.id);
        assert_eq!(edges[0].1, t1.id);
    }
}
