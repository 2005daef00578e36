//! Argument parsing: one `Cli` root and one `Commands` variant per
//! top-level noun, subcommands nested the way `cli-sub-agent` nests
//! `Session`/`Config`/`Todo` etc. under their own enum.

use clap::{Parser, Subcommand};
use gobby_core::OutputFormat;

#[derive(Parser)]
#[command(name = "gobby", version, about = "Local daemon coordinating AI coding CLIs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Project directory (defaults to the current working directory)
    #[arg(long, global = true)]
    pub cd: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the daemon's HTTP/MCP surface
    Start {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Stay attached instead of forking into the background
        #[arg(long)]
        foreground: bool,
    },
    /// Stop a running daemon
    Stop,
    /// Report whether the daemon is running
    Status,

    Tasks {
        #[command(subcommand)]
        cmd: TaskCommands,
    },
    Sessions {
        #[command(subcommand)]
        cmd: SessionCommands,
    },
    Workflows {
        #[command(subcommand)]
        cmd: WorkflowCommands,
    },
    Agents {
        #[command(subcommand)]
        cmd: AgentCommands,
    },
    Worktrees {
        #[command(subcommand)]
        cmd: WorktreeCommands,
    },
    Clones {
        #[command(subcommand)]
        cmd: CloneCommands,
    },
    Conductor {
        #[command(subcommand)]
        cmd: ConductorCommands,
    },
    Projects {
        #[command(subcommand)]
        cmd: ProjectCommands,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    List { project: Option<String> },
    Show { task: String },
    Create {
        project: Option<String>,
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        details: Option<String>,
        #[arg(long)]
        test_strategy: Option<String>,
        #[arg(long, default_value_t = 2)]
        priority: u8,
        #[arg(long, default_value = "task")]
        task_type: String,
        #[arg(long)]
        label: Vec<String>,
        #[arg(long)]
        validation_criteria: Option<String>,
        #[arg(long)]
        blocks: Vec<String>,
    },
    Update {
        task: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        details: Option<String>,
        #[arg(long)]
        priority: Option<u8>,
        #[arg(long)]
        label: Vec<String>,
    },
    Close {
        task: String,
        #[arg(long)]
        session: String,
        #[arg(long)]
        commit_sha: Option<String>,
        #[arg(long)]
        force: bool,
    },
    Reopen { task: String },
    Escalate {
        task: String,
        #[arg(long)]
        reason: String,
    },
    Delete { task: String },
    Dep {
        #[command(subcommand)]
        cmd: DepCommands,
    },
    Ready { project: Option<String> },
    Blocked { project: Option<String> },
    Expand {
        task: String,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long)]
        max_subtasks: Option<u32>,
    },
    Validate { task: String },
    Sync {
        project: Option<String>,
        #[arg(long)]
        out: Option<String>,
    },
    Compact { task: String },
}

#[derive(Subcommand)]
pub enum DepCommands {
    Add {
        task: String,
        depends_on: String,
        #[arg(long, default_value = "blocks")]
        dep_type: String,
    },
    Remove { task: String, depends_on: String },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    List { project: Option<String> },
    Show { session: String },
    Delete { session: String },
}

#[derive(Subcommand)]
pub enum WorkflowCommands {
    List { dir: Option<String> },
    Show { name: String, dir: Option<String> },
    Set { session: String, name: String, dir: Option<String> },
    Clear { session: String },
    Status { session: String },
    Phase { session: String, phase: String },
    Reset { session: String, name: String, dir: Option<String> },
    Disable { session: String },
    Enable { session: String, name: String, dir: Option<String> },
    Audit { session: String },
}

#[derive(Subcommand)]
pub enum AgentCommands {
    Start(AgentSpawnArgs),
    Spawn(AgentSpawnArgs),
    List,
    Show { run_id: String },
    Kill {
        run_id: String,
        #[arg(long, default_value_t = 15)]
        timeout_secs: u64,
    },
}

#[derive(clap::Args)]
pub struct AgentSpawnArgs {
    pub project: String,
    pub prompt: String,
    #[arg(long, default_value = "claude-code")]
    pub binary: String,
    #[arg(long, default_value = "current")]
    pub isolation: String,
    #[arg(long, default_value = "headless")]
    pub mode: String,
    #[arg(long)]
    pub task: Option<String>,
    #[arg(long)]
    pub workflow: Option<String>,
    #[arg(long, default_value_t = 600)]
    pub idle_timeout_secs: u64,
    #[arg(long, default_value = "gobby")]
    pub branch_prefix: String,
}

#[derive(Subcommand)]
pub enum WorktreeCommands {
    Create { project: String, branch: String },
    List { project: Option<String> },
    Show { worktree: String },
    Spawn(AgentSpawnArgs),
    Sync { worktree: String },
    Delete { worktree: String },
    Stale,
    Cleanup,
}

#[derive(Subcommand)]
pub enum CloneCommands {
    Create { project: String, branch: String },
    List { project: Option<String> },
    Spawn(AgentSpawnArgs),
    Sync { clone: String },
    Merge {
        clone: String,
        source_branch: String,
        target_branch: String,
    },
    Delete { clone: String },
    Cleanup {
        clone: String,
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    CleanupMerged,
}

#[derive(Subcommand)]
pub enum ConductorCommands {
    Start,
    Stop,
    Status,
    Chat { message: String },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    List,
    Show { project: String },
    Rename { project: String, new_name: String },
    Delete { project: String },
    Update {
        project: String,
        #[arg(long)]
        base_branch: Option<String>,
        #[arg(long)]
        github_url: Option<String>,
    },
    Repair { project: String },
}
