//! Isolation handlers: the three ways a spawned agent can see the
//! repository. `CurrentIsolationHandler` does nothing; the other two wrap
//! `gobby_git::GitOps` and record the resulting worktree/clone row through
//! the Store, mirroring how `csa-session`'s git helpers stayed thin
//! wrappers around a `git` subprocess plus a bookkeeping row.

use gobby_core::GobbyError;
use gobby_git::GitOps;
use gobby_store::Store;
use std::path::PathBuf;

/// What `spawn_agent` needs after isolation prep: where the agent's
/// process should run, and which branch/worktree/clone row (if any) backs
/// it.
pub struct IsolationPrep {
    pub workspace_path: PathBuf,
    pub branch_name: Option<String>,
    pub worktree_id: Option<String>,
    pub clone_id: Option<String>,
}

pub trait IsolationHandler: Send + Sync {
    fn prepare(&self, project_id: &str, task_id: Option<&str>, branch_name: Option<&str>) -> Result<IsolationPrep, GobbyError>;
}

/// Replace characters that don't survive in a git branch name with `-`,
/// collapsing runs and trimming the slugified title to a sane length.
pub fn slugify(input: &str) -> String {
    let mut slug = String::new();
    let mut last_was_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && !slug.is_empty() {
            slug.push('-');
            last_was_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug.chars().take(40).collect()
}

pub fn synthesize_branch_name(branch_prefix: &str, task_seq: Option<i64>, task_title: Option<&str>, now_unix: i64) -> String {
    match (task_seq, task_title) {
        (Some(seq), Some(title)) => format!("task-{}-{}", seq, slugify(title)),
        _ => format!("{branch_prefix}-{now_unix}"),
    }
}

/// `current`: the agent runs in the project's own working directory with
/// no isolation at all. Fast, but concurrent agents in this mode will
/// collide on the same working tree.
pub struct CurrentIsolationHandler {
    store: Store,
}

impl CurrentIsolationHandler {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl IsolationHandler for CurrentIsolationHandler {
    fn prepare(&self, project_id: &str, _task_id: Option<&str>, _branch_name: Option<&str>) -> Result<IsolationPrep, GobbyError> {
        let project = self.store.projects().get(project_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("project", project_id))?;
        Ok(IsolationPrep { workspace_path: PathBuf::from(project.repo_path), branch_name: None, worktree_id: None, clone_id: None })
    }
}

/// `worktree`: a `git worktree` attached to the main repo. Fast to create,
/// but the underlying repository object store is shared — this is why
/// parallel orchestration prefers `clone` when agents run concurrently.
pub struct WorktreeIsolationHandler {
    store: Store,
    git: std::sync::Arc<dyn GitOps>,
    worktree_root: PathBuf,
}

impl WorktreeIsolationHandler {
    pub fn new(store: Store, git: std::sync::Arc<dyn GitOps>, worktree_root: PathBuf) -> Self {
        Self { store, git, worktree_root }
    }
}

impl IsolationHandler for WorktreeIsolationHandler {
    fn prepare(&self, project_id: &str, task_id: Option<&str>, branch_name: Option<&str>) -> Result<IsolationPrep, GobbyError> {
        let project = self.store.projects().get(project_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("project", project_id))?;
        let branch = branch_name.map(String::from).ok_or_else(|| GobbyError::Internal("branch_name must be resolved before worktree prepare".into()))?;
        let repo_path = PathBuf::from(&project.repo_path);
        let worktree_path = self.worktree_root.join(&branch);

        self.git.create_worktree(&repo_path, &worktree_path, &branch, &project.base_branch)?;

        let worktree = self
            .store
            .worktrees()
            .create(project_id, task_id, &branch, &worktree_path.to_string_lossy(), &project.base_branch)
            .map_err(|e| GobbyError::Internal(e.to_string()))?;

        Ok(IsolationPrep { workspace_path: worktree_path, branch_name: Some(branch), worktree_id: Some(worktree.id), clone_id: None })
    }
}

/// `clone`: a separate shallow clone of the remote, thread-safe for
/// concurrent agents because it shares nothing with the main working tree.
pub struct CloneIsolationHandler {
    store: Store,
    git: std::sync::Arc<dyn GitOps>,
    clone_root: PathBuf,
}

impl CloneIsolationHandler {
    pub fn new(store: Store, git: std::sync::Arc<dyn GitOps>, clone_root: PathBuf) -> Self {
        Self { store, git, clone_root }
    }
}

impl IsolationHandler for CloneIsolationHandler {
    fn prepare(&self, project_id: &str, task_id: Option<&str>, branch_name: Option<&str>) -> Result<IsolationPrep, GobbyError> {
        let project = self.store.projects().get(project_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("project", project_id))?;
        let branch = branch_name.map(String::from).ok_or_else(|| GobbyError::Internal("branch_name must be resolved before clone prepare".into()))?;
        let repo_path = PathBuf::from(&project.repo_path);
        let remote_url = project.github_url.clone().map(Ok).unwrap_or_else(|| self.git.resolve_remote_url(&repo_path))?;
        let clone_path = self.clone_root.join(&branch);

        self.git.shallow_clone(&remote_url, &project.base_branch, &branch, &clone_path)?;

        let clone_row = self
            .store
            .clones()
            .create(project_id, task_id, &branch, &clone_path.to_string_lossy(), &project.base_branch, &remote_url)
            .map_err(|e| GobbyError::Internal(e.to_string()))?;

        Ok(IsolationPrep { workspace_path: clone_path, branch_name: Some(branch), worktree_id: None, clone_id: Some(clone_row.id) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_punctuation() {
        assert_eq!(slugify("Fix the Login Bug!!"), "fix-the-login-bug");
    }

    #[test]
    fn test_slugify_truncates_long_titles() {
        let long = "a".repeat(100);
        assert_eq!(slugify(&long).len(), 40);
    }

    #[test]
    fn test_synthesize_branch_name_prefers_task() {
        let name = synthesize_branch_name("agent", Some(42), Some("Add retries"), 1_700_000_000);
        assert_eq!(name, "task-42-add-retries");
    }

    #[test]
    fn test_synthesize_branch_name_falls_back_to_timestamp() {
        let name = synthesize_branch_name("agent", None, None, 1_700_000_000);
        assert_eq!(name, "agent-1700000000");
    }
}
