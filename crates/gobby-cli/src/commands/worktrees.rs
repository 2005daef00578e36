//! `gobby worktrees ...`. Plain create/list/delete go straight through
//! `GitOps` + the store; `spawn` and the sweep commands delegate to
//! `AgentOrchestrator`, which already implements them for the spawn flow.

use crate::cli::WorktreeCommands;
use crate::commands::agents::spawn_with_isolation;
use crate::context::CliContext;
use gobby_core::GobbyError;
use gobby_git::{GitOps, ProcessGitOps};
use std::path::PathBuf;

pub async fn handle(ctx: &CliContext, cmd: WorktreeCommands) -> Result<(), GobbyError> {
    match cmd {
        WorktreeCommands::Create { project, branch } => {
            let project = ctx.resolve_project(Some(&project))?;
            let repo_path = PathBuf::from(&project.repo_path);
            let worktree_path = gobby_core::config::gobby_home().join("worktrees").join(&branch);
            let git = ProcessGitOps;
            git.create_worktree(&repo_path, &worktree_path, &branch, &project.base_branch)?;
            let created = ctx
                .store
                .worktrees()
                .create(&project.id, None, &branch, &worktree_path.to_string_lossy(), &project.base_branch)
                .map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&created);
        }
        WorktreeCommands::List { project } => {
            let project = ctx.resolve_project(project.as_deref())?;
            let worktrees = ctx.store.worktrees().list_by_project(&project.id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&worktrees);
        }
        WorktreeCommands::Show { worktree } => {
            let found = ctx.store.worktrees().get(&worktree).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("worktree", worktree.clone()))?;
            ctx.print(&found);
        }
        WorktreeCommands::Spawn(args) => spawn_with_isolation(ctx, args, "worktree").await?,
        WorktreeCommands::Sync { worktree } => {
            let found = ctx.store.worktrees().get(&worktree).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("worktree", worktree.clone()))?;
            let git = ProcessGitOps;
            git.fetch_branch(&PathBuf::from(&found.worktree_path), &found.base_branch)?;
            ctx.print(&serde_json::json!({"worktree_id": found.id, "synced": true}));
        }
        WorktreeCommands::Delete { worktree } => {
            let found = ctx.store.worktrees().get(&worktree).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("worktree", worktree.clone()))?;
            if let Some(parent) = PathBuf::from(&found.worktree_path).parent() {
                let git = ProcessGitOps;
                let _ = git.remove_worktree(parent, &PathBuf::from(&found.worktree_path));
            }
            ctx.store.worktrees().delete(&found.id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&serde_json::json!({"worktree_id": found.id, "deleted": true}));
        }
        WorktreeCommands::Stale => {
            let stale = ctx.store.worktrees().list_stale().map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&stale);
        }
        WorktreeCommands::Cleanup => {
            let orchestrator = ctx.build_orchestrator(None)?;
            let count = orchestrator.sweep_stale_worktrees()?;
            ctx.print(&serde_json::json!({"cleaned_up": count}));
        }
    }
    Ok(())
}
