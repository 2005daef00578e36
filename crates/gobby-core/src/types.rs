//! Shared enums for the entities in the data model.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which CLI produced a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CliSource {
    ClaudeCode,
    GeminiCli,
    Codex,
    Generic,
}

impl CliSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClaudeCode => "claude-code",
            Self::GeminiCli => "gemini-cli",
            Self::Codex => "codex",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for CliSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CliSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude-code" => Ok(Self::ClaudeCode),
            "gemini-cli" => Ok(Self::GeminiCli),
            "codex" => Ok(Self::Codex),
            "generic" => Ok(Self::Generic),
            other => Err(format!("unknown CLI source '{other}'")),
        }
    }
}

/// Lifecycle status of a `Session`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    HandoffReady,
    Expired,
}

/// Lifecycle status of a `Task`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Review,
    Completed,
    Failed,
    Escalated,
}

impl TaskStatus {
    /// A task in one of these states still needs work; used by ready-work
    /// selection, which only ever considers `Pending`.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Bug,
    Feature,
    Task,
    Epic,
    Chore,
}

/// Dependency edge type between two tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyType {
    Blocks,
    Related,
    DiscoveredFrom,
}

impl DependencyType {
    /// Only `Blocks` edges participate in the cycle check and readiness.
    pub fn participates_in_readiness(&self) -> bool {
        matches!(self, Self::Blocks)
    }
}

/// Isolation mode for a spawned agent's filesystem changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationMode {
    Current,
    Worktree,
    Clone,
}

/// Execution mode for a spawned agent process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnMode {
    InProcess,
    Terminal,
    Embedded,
    Headless,
}

/// Lifecycle status of an `AgentRun`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRunStatus {
    Running,
    Completed,
    Timeout,
    Error,
    Cancelled,
    Killed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorktreeStatus {
    Active,
    Stale,
    Merged,
    Abandoned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloneStatus {
    Active,
    Synced,
    Merged,
    Abandoned,
}

/// Priority on a 1 (highest) - 3 (lowest) scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Priority(pub u8);

impl Default for Priority {
    fn default() -> Self {
        Priority(2)
    }
}

/// Decision returned by the hook dispatcher / workflow engine for a tool call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
    Ask,
}

/// Output format for CLI responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_cli_source_roundtrip() {
        for src in [CliSource::ClaudeCode, CliSource::GeminiCli, CliSource::Codex, CliSource::Generic] {
            let s = src.to_string();
            assert_eq!(CliSource::from_str(&s).unwrap(), src);
        }
    }

    #[test]
    fn test_cli_source_invalid() {
        assert!(CliSource::from_str("unknown-tool").is_err());
    }

    #[test]
    fn test_task_status_open() {
        assert!(TaskStatus::Pending.is_open());
        assert!(TaskStatus::InProgress.is_open());
        assert!(!TaskStatus::Review.is_open());
        assert!(!TaskStatus::Completed.is_open());
    }

    #[test]
    fn test_task_status_terminal() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Escalated.is_terminal());
    }

    #[test]
    fn test_dependency_type_readiness() {
        assert!(DependencyType::Blocks.participates_in_readiness());
        assert!(!DependencyType::Related.participates_in_readiness());
        assert!(!DependencyType::DiscoveredFrom.participates_in_readiness());
    }

    #[test]
    fn test_priority_default() {
        assert_eq!(Priority::default(), Priority(2));
    }
}
