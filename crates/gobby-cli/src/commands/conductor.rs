//! `gobby conductor ...`. The conductor loop itself runs inside the
//! daemon process (`start`/`stop`/`status`/`chat` never spawn agents
//! directly); this module only flips the `conductor_autonomous` switch
//! the daemon reads on its next poll and lets a human drop a message
//! into its inbox.

use crate::cli::ConductorCommands;
use crate::context::CliContext;
use gobby_core::{CliSource, GobbyError};
use gobby_store::models::{MessagePriority, Session};
use std::path::PathBuf;

const CONDUCTOR_MARKER: &str = "__conductor__";

fn config_path(ctx: &CliContext) -> PathBuf {
    ctx.cwd.join(".gobby").join("config.toml")
}

fn set_autonomous(ctx: &CliContext, enabled: bool) -> Result<(), GobbyError> {
    let path = config_path(ctx);
    let mut table = match std::fs::read_to_string(&path) {
        Ok(text) => text.parse::<toml::Value>().map_err(|e| GobbyError::Internal(e.to_string()))?,
        Err(_) => toml::Value::Table(toml::map::Map::new()),
    };
    if let toml::Value::Table(map) = &mut table {
        map.insert("conductor_autonomous".to_string(), toml::Value::Boolean(enabled));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| GobbyError::Internal(e.to_string()))?;
    }
    std::fs::write(&path, toml::to_string_pretty(&table).map_err(|e| GobbyError::Internal(e.to_string()))?).map_err(|e| GobbyError::Internal(e.to_string()))?;
    Ok(())
}

/// The conductor has no dedicated session table of its own; it's the one
/// project session whose `summary_markdown` carries the marker, created
/// lazily on first use.
fn conductor_session(ctx: &CliContext, project_id: &str) -> Result<Session, GobbyError> {
    let existing = ctx.store.sessions().list_by_project(project_id).map_err(|e| GobbyError::Internal(e.to_string()))?;
    if let Some(found) = existing.into_iter().find(|s| s.summary_markdown.as_deref() == Some(CONDUCTOR_MARKER)) {
        return Ok(found);
    }
    let created = ctx.store.sessions().create(project_id, CliSource::Generic, None, None).map_err(|e| GobbyError::Internal(e.to_string()))?;
    ctx.store.sessions().set_summary(&created.id, CONDUCTOR_MARKER).map_err(|e| GobbyError::Internal(e.to_string()))?;
    Ok(created)
}

pub fn handle(ctx: &CliContext, cmd: ConductorCommands) -> Result<(), GobbyError> {
    match cmd {
        ConductorCommands::Start => {
            set_autonomous(ctx, true)?;
            ctx.print(&serde_json::json!({"conductor_autonomous": true}));
        }
        ConductorCommands::Stop => {
            set_autonomous(ctx, false)?;
            ctx.print(&serde_json::json!({"conductor_autonomous": false}));
        }
        ConductorCommands::Status => {
            ctx.print(&serde_json::json!({
                "conductor_autonomous": ctx.config.conductor_autonomous,
                "token_budget": ctx.config.token_budget,
            }));
        }
        ConductorCommands::Chat { message } => {
            let project = ctx.current_project()?;
            let session = conductor_session(ctx, &project.id)?;
            let sent = ctx
                .store
                .messages()
                .send(&session.id, &session.id, &message, MessagePriority::Normal)
                .map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&serde_json::json!({"conductor_session_id": session.id, "message_id": sent.id, "queued": true}));
        }
    }
    Ok(())
}
