//! The four ways to execute a spawned agent. `HeadlessSpawner` and
//! `TerminalSpawner` launch the CLI as a real OS process, the way
//! `csa_executor::Executor::build_base_command` builds one; `EmbeddedSpawner`
//! additionally allocates a pseudo-terminal for UI attachment.
//! `InProcessExecutor` (`executor.rs`) doesn't spawn a process at all.

use async_trait::async_trait;
use gobby_core::{AgentRunStatus, GobbyError};
use gobby_store::Store;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

/// Environment variables every spawned child receives, mirroring how a
/// parent process tells a child its place in the session tree.
pub struct SpawnCommandParams {
    pub binary: String,
    pub args: Vec<String>,
    pub workspace_path: PathBuf,
    pub env: HashMap<String, String>,
    pub idle_timeout: Duration,
}

impl SpawnCommandParams {
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.args);
        cmd.current_dir(&self.workspace_path);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

/// What the orchestrator records in the running-agent registry after spawn.
#[derive(Debug, Clone, Default)]
pub struct SpawnHandle {
    pub pid: Option<u32>,
    pub master_fd: Option<i32>,
}

#[async_trait]
pub trait Spawner: Send + Sync {
    /// Launch the child and, if the spawn mode needs a background
    /// supervisor (headless/embedded wait for exit, terminal does not),
    /// start it. `store`/`run_id` let the supervisor record completion
    /// without the orchestrator having to poll.
    async fn spawn(&self, params: SpawnCommandParams, store: Store, run_id: String) -> Result<SpawnHandle, GobbyError>;
}

/// Runs the CLI as a subprocess with stdout/stderr captured, the default
/// non-interactive mode. An idle timeout bounds how long the daemon waits
/// for output before declaring the run timed out.
pub struct HeadlessSpawner;

#[async_trait]
impl Spawner for HeadlessSpawner {
    async fn spawn(&self, params: SpawnCommandParams, store: Store, run_id: String) -> Result<SpawnHandle, GobbyError> {
        let mut cmd = params.build_command();
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| GobbyError::Internal(format!("failed to spawn {}: {e}", params.binary)))?;
        let pid = child.id();
        let idle_timeout = params.idle_timeout;

        tokio::spawn(async move {
            let outcome = tokio::time::timeout(idle_timeout, child.wait_with_output()).await;
            let (status, result) = match outcome {
                Ok(Ok(output)) if output.status.success() => {
                    (AgentRunStatus::Completed, serde_json::json!({"stdout": String::from_utf8_lossy(&output.stdout), "stderr": String::from_utf8_lossy(&output.stderr)}))
                }
                Ok(Ok(output)) => (AgentRunStatus::Error, serde_json::json!({"exit_code": output.status.code(), "stderr": String::from_utf8_lossy(&output.stderr)})),
                Ok(Err(error)) => (AgentRunStatus::Error, serde_json::json!({"error": error.to_string()})),
                Err(_) => (AgentRunStatus::Timeout, serde_json::json!({"idle_timeout_secs": idle_timeout.as_secs()})),
            };
            if let Err(error) = store.agent_runs().finish(&run_id, status, Some(result)) {
                tracing::error!(%error, run_id, "failed to record headless agent completion");
            }
        });

        Ok(SpawnHandle { pid, master_fd: None })
    }
}

/// Opens the user's terminal with the CLI command and the workspace as
/// cwd. PID capture is best-effort: the terminal launcher (`open`,
/// `x-terminal-emulator`, `wt`) typically exits immediately, leaving the
/// actual CLI PID to be found later by a platform-specific process finder
/// keyed on the session ID, same as `kill`'s terminal-mode lookup.
pub struct TerminalSpawner;

impl TerminalSpawner {
    fn terminal_launch_command(inner_binary: &str, inner_args: &[String], workspace: &std::path::Path) -> Command {
        let inner = format!("{inner_binary} {}", inner_args.join(" "));
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.args(["-a", "Terminal", &workspace.to_string_lossy()]);
            cmd
        } else if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "cmd", "/K", &inner]);
            cmd.current_dir(workspace);
            cmd
        } else {
            let mut cmd = Command::new("x-terminal-emulator");
            cmd.args(["-e", &inner]);
            cmd.current_dir(workspace);
            cmd
        }
    }
}

#[async_trait]
impl Spawner for TerminalSpawner {
    async fn spawn(&self, params: SpawnCommandParams, _store: Store, _run_id: String) -> Result<SpawnHandle, GobbyError> {
        let mut cmd = Self::terminal_launch_command(&params.binary, &params.args, &params.workspace_path);
        for (key, value) in &params.env {
            cmd.env(key, value);
        }
        let child = cmd.spawn().map_err(|e| GobbyError::Internal(format!("failed to open terminal: {e}")))?;
        Ok(SpawnHandle { pid: child.id(), master_fd: None })
    }
}

/// Allocates a pseudo-terminal the UI can attach to for live interaction,
/// while still capturing output for the session transcript. `portable_pty`
/// hides the raw fd behind a `MasterPty` trait object, so the registry
/// tracks the pty by run id rather than by fd number; `master_fd` stays
/// `None` on this spawn mode for that reason.
pub struct EmbeddedSpawner;

#[async_trait]
impl Spawner for EmbeddedSpawner {
    async fn spawn(&self, params: SpawnCommandParams, store: Store, run_id: String) -> Result<SpawnHandle, GobbyError> {
        use portable_pty::{native_pty_system, CommandBuilder, PtySize};

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize { rows: 40, cols: 160, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| GobbyError::Internal(format!("failed to allocate pty: {e}")))?;

        let mut builder = CommandBuilder::new(&params.binary);
        builder.args(&params.args);
        builder.cwd(&params.workspace_path);
        for (key, value) in &params.env {
            builder.env(key, value);
        }

        let mut child = pair.slave.spawn_command(builder).map_err(|e| GobbyError::Internal(format!("failed to spawn under pty: {e}")))?;
        drop(pair.slave);

        let mut reader = pair.master.try_clone_reader().map_err(|e| GobbyError::Internal(format!("failed to clone pty reader: {e}")))?;

        tokio::task::spawn_blocking(move || {
            let mut buf = Vec::new();
            let _ = std::io::Read::read_to_end(&mut reader, &mut buf);
            let exit_status = child.wait();
            (exit_status, buf)
        })
        .await
        .map(|(exit_status, buf)| {
            let status = match exit_status {
                Ok(status) if status.success() => AgentRunStatus::Completed,
                Ok(_) => AgentRunStatus::Error,
                Err(_) => AgentRunStatus::Error,
            };
            if let Err(error) = store.agent_runs().finish(&run_id, status, Some(serde_json::json!({"pty_output": String::from_utf8_lossy(&buf)}))) {
                tracing::error!(%error, run_id, "failed to record embedded agent completion");
            }
        })
        .map_err(|e| GobbyError::Internal(format!("embedded pty supervisor task failed: {e}")))?;

        Ok(SpawnHandle { pid: None, master_fd: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_command_sets_cwd_and_env() {
        let mut env = HashMap::new();
        env.insert("GOBBY_SESSION_ID".to_string(), "sess-1".to_string());
        let params = SpawnCommandParams {
            binary: "true".to_string(),
            args: vec![],
            workspace_path: std::env::temp_dir(),
            env,
            idle_timeout: Duration::from_secs(1),
        };
        let cmd = params.build_command();
        assert_eq!(cmd.as_std().get_current_dir(), Some(std::env::temp_dir().as_path()));
    }
}
