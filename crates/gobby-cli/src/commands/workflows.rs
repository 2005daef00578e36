//! `gobby workflows ...`. Definitions are loaded fresh from disk per
//! invocation (the long-running daemon keeps its own loaded copy; the CLI
//! has no reason to cache across process lifetimes).

use crate::cli::WorkflowCommands;
use crate::context::CliContext;
use gobby_core::GobbyError;
use gobby_workflow::{load_workflows, WorkflowEngine};
use std::collections::HashMap;

fn load(ctx: &CliContext, dir: Option<&str>) -> Result<HashMap<String, gobby_workflow::WorkflowDefinition>, GobbyError> {
    load_workflows(&ctx.workflows_dir(dir))
}

pub fn handle(ctx: &CliContext, cmd: WorkflowCommands) -> Result<(), GobbyError> {
    match cmd {
        WorkflowCommands::List { dir } => {
            let defs = load(ctx, dir.as_deref())?;
            let mut names: Vec<&String> = defs.keys().collect();
            names.sort();
            ctx.print(&names);
        }
        WorkflowCommands::Show { name, dir } => {
            let defs = load(ctx, dir.as_deref())?;
            let def = defs.get(&name).ok_or_else(|| GobbyError::not_found("workflow", name.clone()))?;
            ctx.print(def);
        }
        WorkflowCommands::Set { session, name, dir } => {
            let project = ctx.current_project().ok();
            let session_id = ctx.store.resolve_session_ref(&session, project.as_ref().map(|p| p.id.as_str()))?;
            let defs = load(ctx, dir.as_deref())?;
            let engine = WorkflowEngine::new(ctx.store.clone(), defs);
            engine.activate(&session_id, &name)?;
            ctx.print(&serde_json::json!({"session_id": session_id, "workflow": name, "activated": true}));
        }
        WorkflowCommands::Reset { session, name, dir } => {
            let project = ctx.current_project().ok();
            let session_id = ctx.store.resolve_session_ref(&session, project.as_ref().map(|p| p.id.as_str()))?;
            ctx.store.workflow_states().deactivate(&session_id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            let defs = load(ctx, dir.as_deref())?;
            let engine = WorkflowEngine::new(ctx.store.clone(), defs);
            engine.activate(&session_id, &name)?;
            ctx.print(&serde_json::json!({"session_id": session_id, "workflow": name, "reset": true}));
        }
        WorkflowCommands::Enable { session, name, dir } => {
            let project = ctx.current_project().ok();
            let session_id = ctx.store.resolve_session_ref(&session, project.as_ref().map(|p| p.id.as_str()))?;
            let defs = load(ctx, dir.as_deref())?;
            let engine = WorkflowEngine::new(ctx.store.clone(), defs);
            engine.activate(&session_id, &name)?;
            ctx.print(&serde_json::json!({"session_id": session_id, "workflow": name, "enabled": true}));
        }
        WorkflowCommands::Clear { session } | WorkflowCommands::Disable { session } => {
            let project = ctx.current_project().ok();
            let session_id = ctx.store.resolve_session_ref(&session, project.as_ref().map(|p| p.id.as_str()))?;
            ctx.store.workflow_states().deactivate(&session_id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&serde_json::json!({"session_id": session_id, "cleared": true}));
        }
        WorkflowCommands::Status { session } => {
            let project = ctx.current_project().ok();
            let session_id = ctx.store.resolve_session_ref(&session, project.as_ref().map(|p| p.id.as_str()))?;
            let state = ctx
                .store
                .workflow_states()
                .get(&session_id)
                .map_err(|e| GobbyError::Internal(e.to_string()))?
                .ok_or_else(|| GobbyError::not_found("workflow_state", session.clone()))?;
            ctx.print(&state);
        }
        WorkflowCommands::Phase { session, phase } => {
            let project = ctx.current_project().ok();
            let session_id = ctx.store.resolve_session_ref(&session, project.as_ref().map(|p| p.id.as_str()))?;
            ctx.store.workflow_states().transition_phase(&session_id, &phase).map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&serde_json::json!({"session_id": session_id, "phase": phase}));
        }
        WorkflowCommands::Audit { session } => {
            let project = ctx.current_project().ok();
            let session_id = ctx.store.resolve_session_ref(&session, project.as_ref().map(|p| p.id.as_str()))?;
            let entries = ctx.store.workflow_states().list_audit(&session_id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&entries);
        }
    }
    Ok(())
}
