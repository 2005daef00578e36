//! `gobby projects ...`. `rename`/`delete` surface the store's own
//! protected-project guard as a constraint violation rather than a
//! generic internal error.

use crate::cli::ProjectCommands;
use crate::context::CliContext;
use gobby_core::GobbyError;
use gobby_git::{GitOps, ProcessGitOps};
use std::path::PathBuf;

pub fn handle(ctx: &CliContext, cmd: ProjectCommands) -> Result<(), GobbyError> {
    match cmd {
        ProjectCommands::List => {
            let projects = ctx.store.projects().list().map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&projects);
        }
        ProjectCommands::Show { project } => {
            let found = ctx.resolve_project(Some(&project))?;
            ctx.print(&found);
        }
        ProjectCommands::Rename { project, new_name } => {
            let found = ctx.resolve_project(Some(&project))?;
            ctx.store.projects().rename(&found.id, &new_name).map_err(|e| GobbyError::ConstraintViolation(e.to_string()))?;
            ctx.print(&serde_json::json!({"project_id": found.id, "name": new_name}));
        }
        ProjectCommands::Delete { project } => {
            let found = ctx.resolve_project(Some(&project))?;
            ctx.store.projects().delete(&found.id).map_err(|e| GobbyError::ConstraintViolation(e.to_string()))?;
            ctx.print(&serde_json::json!({"project_id": found.id, "deleted": true}));
        }
        ProjectCommands::Update { project, base_branch, github_url } => {
            let found = ctx.resolve_project(Some(&project))?;
            ctx.store.projects().update(&found.id, base_branch.as_deref(), github_url.as_deref()).map_err(|e| GobbyError::Internal(e.to_string()))?;
            let updated = ctx.store.projects().get(&found.id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("project", found.id.clone()))?;
            ctx.print(&updated);
        }
        ProjectCommands::Repair { project } => {
            let found = ctx.resolve_project(Some(&project))?;
            let repo_path = PathBuf::from(&found.repo_path);
            let git = ProcessGitOps;
            let refreshed_url = git.resolve_remote_url(&repo_path).ok();
            ctx.store
                .projects()
                .update(&found.id, None, refreshed_url.as_deref())
                .map_err(|e| GobbyError::Internal(e.to_string()))?;
            let repaired = ctx.store.projects().get(&found.id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("project", found.id.clone()))?;
            ctx.print(&serde_json::json!({"project": repaired, "repo_path_exists": repo_path.exists()}));
        }
    }
    Ok(())
}
