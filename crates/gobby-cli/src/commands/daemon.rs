//! `gobby start/stop/status`: a pidfile-tracked background process
//! hosting the HTTP/MCP surface, grounded on `cli-sub-agent`'s
//! `csa-mcp-hub` serve/stop/status trio but re-exec'd through this same
//! binary (`gobby start --foreground`) instead of a dedicated daemon
//! binary, since gobby ships one `gobby` executable.

use crate::context::CliContext;
use gobby_agents::AgentOrchestrator;
use gobby_core::config::gobby_home;
use gobby_core::GobbyError;
use gobby_events::EventBus;
use gobby_git::ProcessGitOps;
use gobby_hooks::HookDispatcher;
use gobby_mcp::hub::McpHub;
use gobby_mcp::http::{router, AppState};
use gobby_mcp::namespaces::agents::AgentsNamespace;
use gobby_mcp::namespaces::clones::ClonesNamespace;
use gobby_mcp::namespaces::memory::MemoryNamespace;
use gobby_mcp::namespaces::orchestration::OrchestrationNamespace;
use gobby_mcp::namespaces::sessions::SessionsNamespace;
use gobby_mcp::namespaces::skills::SkillsNamespace;
use gobby_mcp::namespaces::tasks::TasksNamespace;
use gobby_mcp::namespaces::worktrees::WorktreesNamespace;
use gobby_mcp::namespaces::workflows::WorkflowsNamespace;
use gobby_mcp::addressable::AddressableStore;
use gobby_tasks::TaskEngine;
use gobby_workflow::{load_workflows, WorkflowEngine};
use std::path::PathBuf;
use std::sync::Arc;

fn pid_path() -> PathBuf {
    gobby_home().join("gobby.pid")
}

fn read_pid() -> Option<i32> {
    std::fs::read_to_string(pid_path()).ok().and_then(|s| s.trim().parse().ok())
}

fn process_alive(pid: i32) -> bool {
    // SAFETY: signal 0 sends nothing, just probes whether the pid exists
    // and is signalable by us.
    unsafe { libc::kill(pid, 0) == 0 }
}

pub async fn handle_start(ctx: &CliContext, bind: Option<String>, port: Option<u16>, foreground: bool) -> Result<(), GobbyError> {
    if let Some(pid) = read_pid() {
        if process_alive(pid) {
            ctx.print(&serde_json::json!({"already_running": true, "pid": pid}));
            return Ok(());
        }
    }

    if !foreground {
        let exe = std::env::current_exe().map_err(|e| GobbyError::Internal(e.to_string()))?;
        let mut cmd = std::process::Command::new(exe);
        cmd.arg("start").arg("--foreground");
        if let Some(bind) = &bind {
            cmd.arg("--bind").arg(bind);
        }
        if let Some(port) = port {
            cmd.arg("--port").arg(port.to_string());
        }
        let child = cmd.spawn().map_err(|e| GobbyError::Internal(e.to_string()))?;
        ctx.print(&serde_json::json!({"started": true, "pid": child.id()}));
        return Ok(());
    }

    std::fs::create_dir_all(gobby_home()).map_err(|e| GobbyError::Internal(e.to_string()))?;
    std::fs::write(pid_path(), std::process::id().to_string()).map_err(|e| GobbyError::Internal(e.to_string()))?;

    let workflows_dir = ctx.workflows_dir(None);
    let defs = load_workflows(&workflows_dir).unwrap_or_else(|_| gobby_workflow::builtin_definitions());

    let dispatcher_engine = WorkflowEngine::new(ctx.store.clone(), defs.clone());
    let bus = EventBus::new();
    let dispatcher = Arc::new(HookDispatcher::new(ctx.store.clone(), dispatcher_engine, bus.clone(), crate::context::build_llm_provider()));
    let orchestrator_engine = Arc::new(WorkflowEngine::new(ctx.store.clone(), defs.clone()));
    let orchestrator = Arc::new(AgentOrchestrator::new(
        ctx.store.clone(),
        Arc::new(ProcessGitOps),
        crate::context::build_llm_provider(),
        dispatcher.clone(),
        bus.clone(),
        ctx.config.clone(),
        gobby_home().join("worktrees"),
        gobby_home().join("clones"),
        orchestrator_engine,
    ));

    // `McpHub` reads workflow phase gating through its own engine handle;
    // kept separate from the dispatcher's so a hook-triggered phase change
    // and a tool-call gating check never borrow the same engine mutably.
    let hub_engine = Arc::new(WorkflowEngine::new(ctx.store.clone(), defs));
    let mut hub = McpHub::new(hub_engine.clone());
    let task_engine = Arc::new(TaskEngine::new(ctx.store.clone(), ctx.config.clone(), crate::context::build_llm_provider()));
    hub.register(Arc::new(TasksNamespace::new(ctx.store.clone(), task_engine)));
    hub.register(Arc::new(SessionsNamespace::new(ctx.store.clone(), orchestrator.clone())));
    hub.register(Arc::new(WorkflowsNamespace::new(ctx.store.clone(), hub_engine)));
    hub.register(Arc::new(AgentsNamespace::new(orchestrator.clone())));
    hub.register(Arc::new(WorktreesNamespace::new(ctx.store.clone(), orchestrator.clone())));
    hub.register(Arc::new(ClonesNamespace::new(ctx.store.clone(), orchestrator.clone())));
    hub.register(Arc::new(OrchestrationNamespace::new(orchestrator.clone())));
    let global_dir = gobby_home().join("skills");
    let project_skills_dir = ctx.cwd.join(".gobby").join("skills");
    hub.register(Arc::new(SkillsNamespace::new(AddressableStore::new(Some(project_skills_dir), global_dir))));
    let memory_global_dir = gobby_home().join("memory");
    let memory_project_dir = ctx.cwd.join(".gobby").join("memory");
    hub.register(Arc::new(MemoryNamespace::new(AddressableStore::new(Some(memory_project_dir), memory_global_dir))));

    let state = Arc::new(AppState { hub: Arc::new(hub), dispatcher, bus });
    let app = router(state);

    let bind_addr = bind.unwrap_or_else(|| "127.0.0.1".to_string());
    let bind_port = port.unwrap_or(4490);
    let addr: std::net::SocketAddr = format!("{bind_addr}:{bind_port}").parse().map_err(|e: std::net::AddrParseError| GobbyError::Internal(e.to_string()))?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| GobbyError::Internal(e.to_string()))?;
    tracing::info!(%addr, "gobby daemon listening");
    let result = axum::serve(listener, app).await;
    let _ = std::fs::remove_file(pid_path());
    result.map_err(|e| GobbyError::Internal(e.to_string()))
}

pub fn handle_stop(ctx: &CliContext) -> Result<(), GobbyError> {
    match read_pid() {
        Some(pid) if process_alive(pid) => {
            // SAFETY: pid was just confirmed alive and was written by a
            // gobby process we started; SIGTERM is the ordinary shutdown
            // signal, no preconditions beyond having the pid.
            unsafe { libc::kill(pid, libc::SIGTERM) };
            let _ = std::fs::remove_file(pid_path());
            ctx.print(&serde_json::json!({"stopped": true, "pid": pid}));
        }
        _ => {
            let _ = std::fs::remove_file(pid_path());
            ctx.print(&serde_json::json!({"stopped": false, "reason": "not running"}));
        }
    }
    Ok(())
}

pub fn handle_status(ctx: &CliContext) -> Result<(), GobbyError> {
    match read_pid() {
        Some(pid) if process_alive(pid) => ctx.print(&serde_json::json!({"running": true, "pid": pid})),
        _ => ctx.print(&serde_json::json!({"running": false})),
    }
    Ok(())
}
