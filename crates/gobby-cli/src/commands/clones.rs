//! `gobby clones ...`. `merge`/`cleanup`/`cleanup-merged` delegate to
//! `AgentOrchestrator`, which owns the merge-resolution tiers and the
//! cleanup sweep; plain create/list/sync/delete go straight through
//! `GitOps` + the store, mirroring `worktrees`.

use crate::cli::CloneCommands;
use crate::commands::agents::spawn_with_isolation;
use crate::context::CliContext;
use gobby_core::GobbyError;
use gobby_git::{GitOps, MergeOutcome, ProcessGitOps};
use std::path::PathBuf;

fn merge_outcome_json(outcome: &MergeOutcome) -> serde_json::Value {
    match outcome {
        MergeOutcome::Clean => serde_json::json!({"result": "clean"}),
        MergeOutcome::Resolved { reached_tier, files } => {
            serde_json::json!({"result": "resolved", "tier": format!("{reached_tier:?}"), "files": files.iter().map(|f| &f.path).collect::<Vec<_>>()})
        }
        MergeOutcome::NeedsHuman { files } => {
            serde_json::json!({"result": "needs_human", "files": files.iter().map(|f| &f.path).collect::<Vec<_>>()})
        }
    }
}

pub async fn handle(ctx: &CliContext, cmd: CloneCommands) -> Result<(), GobbyError> {
    match cmd {
        CloneCommands::Create { project, branch } => {
            let project = ctx.resolve_project(Some(&project))?;
            let clone_path = gobby_core::config::gobby_home().join("clones").join(&branch);
            let git = ProcessGitOps;
            let remote_url = git.resolve_remote_url(&PathBuf::from(&project.repo_path))?;
            git.shallow_clone(&remote_url, &project.base_branch, &branch, &clone_path)?;
            let created = ctx
                .store
                .clones()
                .create(&project.id, None, &branch, &clone_path.to_string_lossy(), &project.base_branch, &remote_url)
                .map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&created);
        }
        CloneCommands::List { project } => {
            let project = ctx.resolve_project(project.as_deref())?;
            let clones = ctx.store.clones().list_by_project(&project.id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&clones);
        }
        CloneCommands::Spawn(args) => spawn_with_isolation(ctx, args, "clone").await?,
        CloneCommands::Sync { clone } => {
            let found = ctx.store.clones().get(&clone).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("clone", clone.clone()))?;
            let git = ProcessGitOps;
            git.fetch_branch(&PathBuf::from(&found.clone_path), &found.base_branch)?;
            ctx.store.clones().mark_synced(&found.id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&serde_json::json!({"clone_id": found.id, "synced": true}));
        }
        CloneCommands::Merge { clone, source_branch, target_branch } => {
            let found = ctx.store.clones().get(&clone).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("clone", clone.clone()))?;
            let orchestrator = ctx.build_orchestrator(None)?;
            let outcome = orchestrator.merge_start(&PathBuf::from(&found.clone_path), &source_branch, &target_branch, None, Some(&found.id)).await?;
            ctx.print(&merge_outcome_json(&outcome));
        }
        CloneCommands::Delete { clone } => {
            let found = ctx.store.clones().get(&clone).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("clone", clone.clone()))?;
            if std::path::Path::new(&found.clone_path).exists() {
                let _ = std::fs::remove_dir_all(&found.clone_path);
            }
            ctx.store.clones().delete(&found.id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&serde_json::json!({"clone_id": found.id, "deleted": true}));
        }
        CloneCommands::Cleanup { clone, days } => {
            let orchestrator = ctx.build_orchestrator(None)?;
            orchestrator.schedule_clone_cleanup(&clone, days)?;
            ctx.print(&serde_json::json!({"clone_id": clone, "cleanup_in_days": days}));
        }
        CloneCommands::CleanupMerged => {
            let orchestrator = ctx.build_orchestrator(None)?;
            let swept = orchestrator.sweep_clones()?;
            ctx.print(&swept);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_outcome_json_clean() {
        let value = merge_outcome_json(&MergeOutcome::Clean);
        assert_eq!(value["result"], "clean");
    }

    #[test]
    fn test_merge_outcome_json_needs_human_lists_files() {
        let conflict = gobby_git::ConflictFile { path: "src/lib.rs".to_string(), ours: "a".to_string(), theirs: "b".to_string(), resolved: None };
        let value = merge_outcome_json(&MergeOutcome::NeedsHuman { files: vec![conflict] });
        assert_eq!(value["result"], "needs_human");
        assert_eq!(value["files"][0], "src/lib.rs");
    }
}
