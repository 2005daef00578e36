//! Row structs for every entity in the data model. These are plain data;
//! the managers in sibling modules are the only writers of their tables.

use chrono::{DateTime, Utc};
use gobby_core::{
    AgentRunStatus, CliSource, CloneStatus, DependencyType, IsolationMode, SessionStatus,
    SpawnMode, TaskStatus, TaskType, WorktreeStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub repo_path: String,
    pub base_branch: String,
    pub github_url: Option<String>,
    pub is_orphaned: bool,
    pub protected: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project_id: String,
    pub source: CliSource,
    pub seq_num: i64,
    pub parent_session_id: Option<String>,
    pub spawned_by_agent_id: Option<String>,
    pub agent_depth: u32,
    pub status: SessionStatus,
    pub summary_markdown: Option<String>,
    pub terminal_context: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub parent_task_id: Option<String>,
    pub seq_num: i64,
    pub title: String,
    pub description: String,
    pub details: Option<String>,
    pub test_strategy: Option<String>,
    pub status: TaskStatus,
    pub priority: u8,
    pub task_type: TaskType,
    pub labels: Vec<String>,
    pub validation_criteria: Option<String>,
    pub validation_fail_count: u32,
    pub validation_status: Option<String>,
    pub validation_feedback: Option<String>,
    pub commits: Vec<String>,
    pub closed_in_session_id: Option<String>,
    pub closed_commit_sha: Option<String>,
    pub created_in_session_id: Option<String>,
    pub compacted_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskDependency {
    pub dep_type: DependencyType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStateRow {
    pub session_id: String,
    pub workflow_name: String,
    /// The workflow YAML as loaded at activation time, frozen for the
    /// session's lifetime.
    pub definition_snapshot: String,
    pub current_phase: String,
    pub phase_entered_at: DateTime<Utc>,
    pub phase_action_count: u32,
    pub total_action_count: u32,
    pub variables: BTreeMap<String, serde_json::Value>,
    pub artifacts: BTreeMap<String, String>,
    pub reflection_pending: bool,
    pub context_injected: bool,
    pub pending_approval: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    pub id: String,
    pub parent_session_id: String,
    pub child_session_id: Option<String>,
    pub workflow_name: Option<String>,
    pub provider: String,
    pub model: Option<String>,
    pub status: AgentRunStatus,
    pub prompt: String,
    pub isolation: IsolationMode,
    pub mode: SpawnMode,
    pub worktree_id: Option<String>,
    pub clone_id: Option<String>,
    pub result: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worktree {
    pub id: String,
    pub project_id: String,
    pub task_id: Option<String>,
    pub branch_name: String,
    pub worktree_path: String,
    pub base_branch: String,
    pub agent_session_id: Option<String>,
    pub status: WorktreeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clone {
    pub id: String,
    pub project_id: String,
    pub task_id: Option<String>,
    pub branch_name: String,
    pub clone_path: String,
    pub base_branch: String,
    pub remote_url: String,
    pub agent_session_id: Option<String>,
    pub status: CloneStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub cleanup_after: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    Normal,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterSessionMessage {
    pub id: String,
    pub from_session: String,
    pub to_session: String,
    pub content: String,
    pub priority: MessagePriority,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}
