//! String<->enum conversions for the gobby-core enums that cross the SQL
//! boundary. `rusqlite`'s `ToSql`/`FromSql` can't be implemented directly
//! on foreign types from this crate (orphan rules), so managers call these
//! helpers explicitly at the row<->struct boundary.

use gobby_core::{
    AgentRunStatus, CliSource, CloneStatus, DependencyType, IsolationMode, SessionStatus,
    SpawnMode, TaskStatus, TaskType, WorktreeStatus,
};

pub fn session_status_to_str(s: SessionStatus) -> &'static str {
    match s {
        SessionStatus::Active => "active",
        SessionStatus::HandoffReady => "handoff_ready",
        SessionStatus::Expired => "expired",
    }
}

pub fn session_status_from_str(s: &str) -> SessionStatus {
    match s {
        "handoff_ready" => SessionStatus::HandoffReady,
        "expired" => SessionStatus::Expired,
        _ => SessionStatus::Active,
    }
}

pub fn task_status_to_str(s: TaskStatus) -> &'static str {
    match s {
        TaskStatus::Pending => "pending",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Review => "review",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Escalated => "escalated",
    }
}

pub fn task_status_from_str(s: &str) -> TaskStatus {
    match s {
        "in_progress" => TaskStatus::InProgress,
        "review" => TaskStatus::Review,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "escalated" => TaskStatus::Escalated,
        _ => TaskStatus::Pending,
    }
}

pub fn task_type_to_str(t: TaskType) -> &'static str {
    match t {
        TaskType::Bug => "bug",
        TaskType::Feature => "feature",
        TaskType::Task => "task",
        TaskType::Epic => "epic",
        TaskType::Chore => "chore",
    }
}

pub fn task_type_from_str(s: &str) -> TaskType {
    match s {
        "bug" => TaskType::Bug,
        "feature" => TaskType::Feature,
        "epic" => TaskType::Epic,
        "chore" => TaskType::Chore,
        _ => TaskType::Task,
    }
}

pub fn dep_type_to_str(t: DependencyType) -> &'static str {
    match t {
        DependencyType::Blocks => "blocks",
        DependencyType::Related => "related",
        DependencyType::DiscoveredFrom => "discovered-from",
    }
}

pub fn dep_type_from_str(s: &str) -> DependencyType {
    match s {
        "related" => DependencyType::Related,
        "discovered-from" => DependencyType::DiscoveredFrom,
        _ => DependencyType::Blocks,
    }
}

pub fn cli_source_to_str(s: CliSource) -> &'static str {
    s.as_str()
}

pub fn cli_source_from_str(s: &str) -> CliSource {
    s.parse().unwrap_or(CliSource::Generic)
}

pub fn isolation_to_str(i: IsolationMode) -> &'static str {
    match i {
        IsolationMode::Current => "current",
        IsolationMode::Worktree => "worktree",
        IsolationMode::Clone => "clone",
    }
}

pub fn isolation_from_str(s: &str) -> IsolationMode {
    match s {
        "worktree" => IsolationMode::Worktree,
        "clone" => IsolationMode::Clone,
        _ => IsolationMode::Current,
    }
}

pub fn spawn_mode_to_str(m: SpawnMode) -> &'static str {
    match m {
        SpawnMode::InProcess => "in_process",
        SpawnMode::Terminal => "terminal",
        SpawnMode::Embedded => "embedded",
        SpawnMode::Headless => "headless",
    }
}

pub fn spawn_mode_from_str(s: &str) -> SpawnMode {
    match s {
        "terminal" => SpawnMode::Terminal,
        "embedded" => SpawnMode::Embedded,
        "headless" => SpawnMode::Headless,
        _ => SpawnMode::InProcess,
    }
}

pub fn agent_run_status_to_str(s: AgentRunStatus) -> &'static str {
    match s {
        AgentRunStatus::Running => "running",
        AgentRunStatus::Completed => "completed",
        AgentRunStatus::Timeout => "timeout",
        AgentRunStatus::Error => "error",
        AgentRunStatus::Cancelled => "cancelled",
        AgentRunStatus::Killed => "killed",
    }
}

pub fn agent_run_status_from_str(s: &str) -> AgentRunStatus {
    match s {
        "completed" => AgentRunStatus::Completed,
        "timeout" => AgentRunStatus::Timeout,
        "error" => AgentRunStatus::Error,
        "cancelled" => AgentRunStatus::Cancelled,
        "killed" => AgentRunStatus::Killed,
        _ => AgentRunStatus::Running,
    }
}

pub fn worktree_status_to_str(s: WorktreeStatus) -> &'static str {
    match s {
        WorktreeStatus::Active => "active",
        WorktreeStatus::Stale => "stale",
        WorktreeStatus::Merged => "merged",
        WorktreeStatus::Abandoned => "abandoned",
    }
}

pub fn worktree_status_from_str(s: &str) -> WorktreeStatus {
    match s {
        "stale" => WorktreeStatus::Stale,
        "merged" => WorktreeStatus::Merged,
        "abandoned" => WorktreeStatus::Abandoned,
        _ => WorktreeStatus::Active,
    }
}

pub fn clone_status_to_str(s: CloneStatus) -> &'static str {
    match s {
        CloneStatus::Active => "active",
        CloneStatus::Synced => "synced",
        CloneStatus::Merged => "merged",
        CloneStatus::Abandoned => "abandoned",
    }
}

pub fn clone_status_from_str(s: &str) -> CloneStatus {
    match s {
        "synced" => CloneStatus::Synced,
        "merged" => CloneStatus::Merged,
        "abandoned" => CloneStatus::Abandoned,
        _ => CloneStatus::Active,
    }
}
