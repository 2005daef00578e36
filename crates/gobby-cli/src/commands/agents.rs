//! `gobby agents ...`. Builds a disposable `AgentOrchestrator` against
//! the shared store; see [`crate::context::CliContext::build_orchestrator`].

use crate::cli::{AgentCommands, AgentSpawnArgs};
use crate::context::CliContext;
use gobby_agents::SpawnParams;
use gobby_core::{GobbyError, IsolationMode, SpawnMode};
use std::collections::HashMap;
use std::time::Duration;

fn parse_isolation(raw: &str) -> IsolationMode {
    match raw {
        "worktree" => IsolationMode::Worktree,
        "clone" => IsolationMode::Clone,
        _ => IsolationMode::Current,
    }
}

fn parse_mode(raw: &str) -> SpawnMode {
    match raw {
        "terminal" => SpawnMode::Terminal,
        "embedded" => SpawnMode::Embedded,
        "headless" => SpawnMode::Headless,
        _ => SpawnMode::InProcess,
    }
}

async fn spawn(ctx: &CliContext, args: AgentSpawnArgs) -> Result<(), GobbyError> {
    spawn_with_isolation(ctx, args, "").await
}

/// Used directly by `gobby worktrees spawn`/`gobby clones spawn`, which
/// pin the isolation mode rather than taking it from `--isolation`.
pub async fn spawn_with_isolation(ctx: &CliContext, args: AgentSpawnArgs, forced_isolation: &str) -> Result<(), GobbyError> {
    let project = ctx.resolve_project(Some(&args.project))?;
    // A CLI-initiated spawn has no existing session to act as the parent;
    // create one at depth 0 so `max_agent_depth` still applies to the child.
    let parent_session_id = ctx
        .store
        .sessions()
        .create(&project.id, gobby_core::CliSource::Generic, None, None)
        .map_err(|e| GobbyError::Internal(e.to_string()))?
        .id;
    let orchestrator = ctx.build_orchestrator(None)?;
    let isolation = if forced_isolation.is_empty() { &args.isolation } else { forced_isolation };
    let params = SpawnParams {
        parent_session_id,
        project_id: project.id,
        binary: args.binary,
        args: vec![],
        base_prompt: args.prompt,
        provider_name: "api".to_string(),
        model: None,
        isolation: parse_isolation(isolation),
        mode: parse_mode(&args.mode),
        branch_prefix: args.branch_prefix,
        branch_name: None,
        task_id: args.task,
        workflow_name: args.workflow,
        idle_timeout: Duration::from_secs(args.idle_timeout_secs),
        env: HashMap::new(),
    };
    let outcome = orchestrator.start_agent(params).await?;
    ctx.print(&serde_json::json!({
        "run_id": outcome.run_id,
        "child_session_id": outcome.child_session_id,
        "workspace_path": outcome.workspace_path,
    }));
    Ok(())
}

pub async fn handle(ctx: &CliContext, cmd: AgentCommands) -> Result<(), GobbyError> {
    match cmd {
        AgentCommands::Start(args) | AgentCommands::Spawn(args) => spawn(ctx, args).await?,
        AgentCommands::List => {
            let runs = ctx.store.agent_runs().list_running().map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&runs);
        }
        AgentCommands::Show { run_id } => {
            let run = ctx.store.agent_runs().get(&run_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("agent_run", run_id.clone()))?;
            ctx.print(&run);
        }
        AgentCommands::Kill { run_id, timeout_secs } => {
            let orchestrator = ctx.build_orchestrator(None)?;
            orchestrator.kill(&run_id, Duration::from_secs(timeout_secs)).await?;
            ctx.print(&serde_json::json!({"run_id": run_id, "killed": true}));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_isolation_defaults_to_current() {
        assert_eq!(parse_isolation("worktree"), IsolationMode::Worktree);
        assert_eq!(parse_isolation("clone"), IsolationMode::Clone);
        assert_eq!(parse_isolation("nonsense"), IsolationMode::Current);
    }

    #[test]
    fn test_parse_mode_defaults_to_in_process() {
        assert_eq!(parse_mode("headless"), SpawnMode::Headless);
        assert_eq!(parse_mode("terminal"), SpawnMode::Terminal);
        assert_eq!(parse_mode("embedded"), SpawnMode::Embedded);
        assert_eq!(parse_mode("nonsense"), SpawnMode::InProcess);
    }
}
