//! The `Store`: single source of truth, owning the one SQLite connection
//! and handing out per-entity managers. `resolve_task_ref` and
//! `resolve_session_ref` are the only entry points tools use to turn a
//! human-typed reference into a full id, since they need to look across
//! more than one manager's table.

use crate::schema::run_migrations;
use crate::{
    agent::AgentRunManager, clone::CloneManager, message::MessageManager,
    project::ProjectManager, session::SessionManager, task::TaskManager,
    workflow_state::WorkflowStateManager, worktree::WorktreeManager,
};
use gobby_core::ids::{parse_ref, resolve_prefix, EntityRef};
use gobby_core::GobbyError;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub type SharedConn = Arc<Mutex<Connection>>;

#[derive(Clone)]
pub struct Store {
    conn: SharedConn,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> rusqlite::Result<Self> {
        let mut conn = Connection::open(path)?;
        run_migrations(&mut conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        run_migrations(&mut conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub(crate) fn conn(&self) -> SharedConn {
        self.conn.clone()
    }

    pub fn projects(&self) -> ProjectManager {
        ProjectManager::new(self.conn())
    }

    pub fn sessions(&self) -> SessionManager {
        SessionManager::new(self.conn())
    }

    pub fn tasks(&self) -> TaskManager {
        TaskManager::new(self.conn())
    }

    pub fn workflow_states(&self) -> WorkflowStateManager {
        WorkflowStateManager::new(self.conn())
    }

    pub fn agent_runs(&self) -> AgentRunManager {
        AgentRunManager::new(self.conn())
    }

    pub fn worktrees(&self) -> WorktreeManager {
        WorktreeManager::new(self.conn())
    }

    pub fn clones(&self) -> CloneManager {
        CloneManager::new(self.conn())
    }

    pub fn messages(&self) -> MessageManager {
        MessageManager::new(self.conn())
    }

    /// Resolve a task reference (`N`, `#N`, full id, or id prefix) to a
    /// full task id, scoped to `project_id` when given.
    pub fn resolve_task_ref(&self, reference: &str, project_id: Option<&str>) -> Result<String, GobbyError> {
        let tasks = self.tasks();
        match parse_ref(reference) {
            EntityRef::SeqNum(n) => {
                let project_id = project_id.ok_or_else(|| {
                    GobbyError::ambiguous("task", reference)
                })?;
                tasks
                    .find_by_seq_num(project_id, n)
                    .map_err(|e| GobbyError::Internal(e.to_string()))?
                    .map(|t| t.id)
                    .ok_or_else(|| GobbyError::not_found("task", reference))
            }
            EntityRef::Id(id) => tasks
                .get(&id)
                .map_err(|e| GobbyError::Internal(e.to_string()))?
                .map(|t| t.id)
                .ok_or_else(|| GobbyError::not_found("task", reference)),
            EntityRef::IdPrefix(prefix) => {
                let ids = tasks
                    .list_ids(project_id)
                    .map_err(|e| GobbyError::Internal(e.to_string()))?;
                match resolve_prefix(ids.iter().map(String::as_str), &prefix) {
                    Ok(id) => Ok(id.to_string()),
                    Err(0) => Err(GobbyError::not_found("task", reference)),
                    Err(_) => Err(GobbyError::ambiguous("task", reference)),
                }
            }
        }
    }

    /// Resolve a session reference the same way. Without `project_id`,
    /// an ambiguous `#N` across multiple projects is reported rather than
    /// guessed at.
    pub fn resolve_session_ref(&self, reference: &str, project_id: Option<&str>) -> Result<String, GobbyError> {
        let sessions = self.sessions();
        match parse_ref(reference) {
            EntityRef::SeqNum(n) => {
                let matches = sessions
                    .find_by_seq_num_any_project(n)
                    .map_err(|e| GobbyError::Internal(e.to_string()))?;
                let matches: Vec<_> = match project_id {
                    Some(pid) => matches.into_iter().filter(|s| s.project_id == pid).collect(),
                    None => matches,
                };
                match matches.len() {
                    1 => Ok(matches.into_iter().next().unwrap().id),
                    0 => Err(GobbyError::not_found("session", reference)),
                    _ => Err(GobbyError::ambiguous("session", reference)),
                }
            }
            EntityRef::Id(id) => sessions
                .get(&id)
                .map_err(|e| GobbyError::Internal(e.to_string()))?
                .map(|s| s.id)
                .ok_or_else(|| GobbyError::not_found("session", reference)),
            EntityRef::IdPrefix(prefix) => {
                let ids = sessions
                    .list_ids(project_id)
                    .map_err(|e| GobbyError::Internal(e.to_string()))?;
                match resolve_prefix(ids.iter().map(String::as_str), &prefix) {
                    Ok(id) => Ok(id.to_string()),
                    Err(0) => Err(GobbyError::not_found("session", reference)),
                    Err(_) => Err(GobbyError::ambiguous("session", reference)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_runs_migrations() {
        let store = Store::open_in_memory().unwrap();
        // A project create should succeed against the migrated schema.
        let project = store.projects().create("demo", "/tmp/demo", "main").unwrap();
        assert_eq!(project.name, "demo");
    }

    #[test]
    fn test_resolve_task_ref_not_found() {
        let store = Store::open_in_memory().unwrap();
        let err = store.resolve_task_ref("gt-zzzzzz", None).unwrap_err();
        assert!(matches!(err, GobbyError::NotFound { .. }));
    }
}
