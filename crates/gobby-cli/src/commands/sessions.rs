//! `gobby sessions ...`: read-only lookups plus delete; spawn-adjacent
//! messaging lives under `agents`/MCP, not the CLI.

use crate::cli::SessionCommands;
use crate::context::CliContext;
use gobby_core::GobbyError;

pub fn handle(ctx: &CliContext, cmd: SessionCommands) -> Result<(), GobbyError> {
    match cmd {
        SessionCommands::List { project } => {
            let project = ctx.resolve_project(project.as_deref())?;
            let sessions = ctx.store.sessions().list_by_project(&project.id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&sessions);
        }
        SessionCommands::Show { session } => {
            let project = ctx.current_project().ok();
            let id = ctx.store.resolve_session_ref(&session, project.as_ref().map(|p| p.id.as_str()))?;
            let found = ctx.store.sessions().get(&id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("session", session.clone()))?;
            ctx.print(&found);
        }
        SessionCommands::Delete { session } => {
            let project = ctx.current_project().ok();
            let id = ctx.store.resolve_session_ref(&session, project.as_ref().map(|p| p.id.as_str()))?;
            ctx.store.sessions().delete(&id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&serde_json::json!({"session_id": id, "deleted": true}));
        }
    }
    Ok(())
}
