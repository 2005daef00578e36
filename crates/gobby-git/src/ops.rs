//! `GitOps`: worktree and shallow-clone primitives plus the diff/commit
//! helpers the task validation loop needs, all shelling out to a `git`
//! binary the way `csa_session::git` and `csa_todo::git` do.

use gobby_core::GobbyError;
use std::path::Path;
use std::process::Command;

/// A merge attempt either succeeds outright or surfaces the conflicting
/// files for the resolution tiers in [`crate::merge`].
#[derive(Debug, Clone, PartialEq)]
pub enum MergeAttempt {
    Success,
    Conflicts(Vec<ConflictedFile>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConflictedFile {
    pub path: String,
    pub ours: String,
    pub theirs: String,
}

pub trait GitOps: Send + Sync {
    /// Create (or reuse, if it already exists) a worktree at
    /// `worktree_path` checked out to `branch_name`, branched from
    /// `base_branch`.
    fn create_worktree(&self, repo_path: &Path, worktree_path: &Path, branch_name: &str, base_branch: &str) -> Result<(), GobbyError>;

    fn remove_worktree(&self, repo_path: &Path, worktree_path: &Path) -> Result<(), GobbyError>;

    /// `git clone --depth=1 --branch=<base_branch>` into `dest_path`, then
    /// create and check out `branch_name`.
    fn shallow_clone(&self, remote_url: &str, base_branch: &str, branch_name: &str, dest_path: &Path) -> Result<(), GobbyError>;

    fn resolve_remote_url(&self, repo_path: &Path) -> Result<String, GobbyError>;

    /// Stage and commit everything under `repo_path`. Returns `None` when
    /// there is nothing to commit.
    fn commit_all(&self, repo_path: &Path, message: &str) -> Result<Option<String>, GobbyError>;

    fn push(&self, repo_path: &Path, branch_name: &str) -> Result<(), GobbyError>;

    fn fetch_branch(&self, repo_path: &Path, branch_name: &str) -> Result<(), GobbyError>;

    /// Diff for the validation loop: `commits` when given, else the
    /// current uncommitted (staged + unstaged) working tree diff.
    fn diff(&self, repo_path: &Path, commits: &[String]) -> Result<String, GobbyError>;

    fn files_touched(&self, repo_path: &Path, commits: &[String]) -> Result<Vec<String>, GobbyError>;

    fn attempt_merge(&self, repo_path: &Path, source_ref: &str, target_branch: &str) -> Result<MergeAttempt, GobbyError>;

    fn abort_merge(&self, repo_path: &Path) -> Result<(), GobbyError>;
}

/// The default `GitOps` implementation: every operation is a `git`
/// subprocess invocation, output captured and translated to `GobbyError`.
pub struct ProcessGitOps;

fn run(dir: &Path, args: &[&str]) -> Result<std::process::Output, GobbyError> {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| GobbyError::GitError(format!("failed to spawn git {args:?}: {e}")))
}

fn require_success(output: &std::process::Output, context: &str) -> Result<(), GobbyError> {
    if !output.status.success() {
        return Err(GobbyError::GitError(format!("{context}: {}", String::from_utf8_lossy(&output.stderr))));
    }
    Ok(())
}

impl GitOps for ProcessGitOps {
    fn create_worktree(&self, repo_path: &Path, worktree_path: &Path, branch_name: &str, base_branch: &str) -> Result<(), GobbyError> {
        if worktree_path.exists() {
            return Ok(());
        }
        let path_str = worktree_path.to_string_lossy().to_string();
        let output = run(repo_path, &["worktree", "add", "-b", branch_name, &path_str, base_branch])?;
        require_success(&output, "git worktree add failed")
    }

    fn remove_worktree(&self, repo_path: &Path, worktree_path: &Path) -> Result<(), GobbyError> {
        let path_str = worktree_path.to_string_lossy().to_string();
        let output = run(repo_path, &["worktree", "remove", "--force", &path_str])?;
        require_success(&output, "git worktree remove failed")
    }

    fn shallow_clone(&self, remote_url: &str, base_branch: &str, branch_name: &str, dest_path: &Path) -> Result<(), GobbyError> {
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GobbyError::GitError(e.to_string()))?;
        }
        let dest_str = dest_path.to_string_lossy().to_string();
        let output = Command::new("git")
            .args(["clone", "--depth=1", "--branch", base_branch, remote_url, &dest_str])
            .output()
            .map_err(|e| GobbyError::GitError(format!("failed to spawn git clone: {e}")))?;
        require_success(&output, "git clone failed")?;
        let output = run(dest_path, &["checkout", "-b", branch_name])?;
        require_success(&output, "git checkout -b failed")
    }

    fn resolve_remote_url(&self, repo_path: &Path) -> Result<String, GobbyError> {
        let output = run(repo_path, &["remote", "get-url", "origin"])?;
        require_success(&output, "git remote get-url failed")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn commit_all(&self, repo_path: &Path, message: &str) -> Result<Option<String>, GobbyError> {
        let output = run(repo_path, &["add", "-A"])?;
        require_success(&output, "git add failed")?;

        let status = run(repo_path, &["diff", "--cached", "--quiet"])?;
        match status.status.code() {
            Some(0) => return Ok(None),
            Some(1) => {}
            _ => return Err(GobbyError::GitError("git diff --cached failed".into())),
        }

        let output = run(repo_path, &["commit", "-m", message])?;
        require_success(&output, "git commit failed")?;

        let hash_output = run(repo_path, &["rev-parse", "--short", "HEAD"])?;
        require_success(&hash_output, "git rev-parse failed")?;
        Ok(Some(String::from_utf8_lossy(&hash_output.stdout).trim().to_string()))
    }

    fn push(&self, repo_path: &Path, branch_name: &str) -> Result<(), GobbyError> {
        let output = run(repo_path, &["push", "-u", "origin", branch_name])?;
        require_success(&output, "git push failed")
    }

    fn fetch_branch(&self, repo_path: &Path, branch_name: &str) -> Result<(), GobbyError> {
        let output = run(repo_path, &["fetch", "origin", branch_name])?;
        require_success(&output, "git fetch failed")
    }

    fn diff(&self, repo_path: &Path, commits: &[String]) -> Result<String, GobbyError> {
        let output = if let [single] = commits {
            run(repo_path, &["show", single.as_str()])?
        } else if commits.len() > 1 {
            let range = format!("{}^..{}", commits[0], commits[commits.len() - 1]);
            run(repo_path, &["diff", &range])?
        } else {
            run(repo_path, &["diff", "HEAD"])?
        };
        require_success(&output, "git diff failed")?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn files_touched(&self, repo_path: &Path, commits: &[String]) -> Result<Vec<String>, GobbyError> {
        let output = if let [single] = commits {
            run(repo_path, &["show", "--name-only", "--pretty=format:", single.as_str()])?
        } else {
            run(repo_path, &["diff", "--name-only", "HEAD"])?
        };
        require_success(&output, "git diff --name-only failed")?;
        Ok(String::from_utf8_lossy(&output.stdout).lines().filter(|l| !l.is_empty()).map(String::from).collect())
    }

    fn attempt_merge(&self, repo_path: &Path, source_ref: &str, target_branch: &str) -> Result<MergeAttempt, GobbyError> {
        let checkout = run(repo_path, &["checkout", target_branch])?;
        require_success(&checkout, "git checkout target failed")?;

        let merge = run(repo_path, &["merge", "--no-commit", "--no-ff", source_ref])?;
        if merge.status.success() {
            let commit = run(repo_path, &["commit", "--no-edit"])?;
            require_success(&commit, "git commit merge failed")?;
            return Ok(MergeAttempt::Success);
        }

        let list = run(repo_path, &["diff", "--name-only", "--diff-filter=U"])?;
        require_success(&list, "listing conflicted files failed")?;
        let mut conflicts = Vec::new();
        for path in String::from_utf8_lossy(&list.stdout).lines().filter(|l| !l.is_empty()) {
            let ours = run(repo_path, &["show", &format!(":2:{path}")]).ok().map(|o| String::from_utf8_lossy(&o.stdout).to_string()).unwrap_or_default();
            let theirs = run(repo_path, &["show", &format!(":3:{path}")]).ok().map(|o| String::from_utf8_lossy(&o.stdout).to_string()).unwrap_or_default();
            conflicts.push(ConflictedFile { path: path.to_string(), ours, theirs });
        }
        Ok(MergeAttempt::Conflicts(conflicts))
    }

    fn abort_merge(&self, repo_path: &Path) -> Result<(), GobbyError> {
        let output = run(repo_path, &["merge", "--abort"])?;
        require_success(&output, "git merge --abort failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn init_repo(dir: &Path) {
        StdCommand::new("git").args(["init"]).current_dir(dir).output().unwrap();
        StdCommand::new("git").args(["config", "user.email", "gobby@localhost"]).current_dir(dir).output().unwrap();
        StdCommand::new("git").args(["config", "user.name", "gobby"]).current_dir(dir).output().unwrap();
        std::fs::write(dir.join("README.md"), "hello\n").unwrap();
        StdCommand::new("git").args(["add", "-A"]).current_dir(dir).output().unwrap();
        StdCommand::new("git").args(["commit", "-m", "init"]).current_dir(dir).output().unwrap();
        StdCommand::new("git").args(["branch", "-M", "main"]).current_dir(dir).output().unwrap();
    }

    #[test]
    fn test_commit_all_returns_none_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let ops = ProcessGitOps;
        let sha = ops.commit_all(dir.path(), "no changes").unwrap();
        assert!(sha.is_none());
    }

    #[test]
    fn test_commit_all_returns_sha_when_dirty() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        std::fs::write(dir.path().join("new.txt"), "content").unwrap();
        let ops = ProcessGitOps;
        let sha = ops.commit_all(dir.path(), "add new file").unwrap();
        assert!(sha.is_some());
    }

    #[test]
    fn test_create_and_remove_worktree() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let wt_path = dir.path().join("wt1");
        let ops = ProcessGitOps;
        ops.create_worktree(dir.path(), &wt_path, "feature-1", "main").unwrap();
        assert!(wt_path.join("README.md").exists());
        ops.remove_worktree(dir.path(), &wt_path).unwrap();
        assert!(!wt_path.exists());
    }

    #[test]
    fn test_merge_clean_branch_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let ops = ProcessGitOps;
        StdCommand::new("git").args(["checkout", "-b", "feature"]).current_dir(dir.path()).output().unwrap();
        std::fs::write(dir.path().join("feature.txt"), "x").unwrap();
        ops.commit_all(dir.path(), "feature work").unwrap();
        let result = ops.attempt_merge(dir.path(), "feature", "main").unwrap();
        assert_eq!(result, MergeAttempt::Success);
    }

    #[test]
    fn test_merge_conflict_surfaces_conflicted_files() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let ops = ProcessGitOps;
        StdCommand::new("git").args(["checkout", "-b", "feature"]).current_dir(dir.path()).output().unwrap();
        std::fs::write(dir.path().join("README.md"), "feature version\n").unwrap();
        ops.commit_all(dir.path(), "feature edit").unwrap();
        StdCommand::new("git").args(["checkout", "main"]).current_dir(dir.path()).output().unwrap();
        std::fs::write(dir.path().join("README.md"), "main version\n").unwrap();
        ops.commit_all(dir.path(), "main edit").unwrap();
        let result = ops.attempt_merge(dir.path(), "feature", "main").unwrap();
        match result {
            MergeAttempt::Conflicts(files) => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].path, "README.md");
            }
            MergeAttempt::Success => panic!("expected conflicts"),
        }
        ops.abort_merge(dir.path()).unwrap();
    }
}
