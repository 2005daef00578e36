//! The MCP/HTTP surface: a single hub exposing every namespaced tool
//! server behind progressive disclosure, plus the HTTP/WebSocket transport
//! the host UI and HTTP-preferring CLI adapters use to reach it.

pub mod addressable;
pub mod executor_tool;
pub mod http;
pub mod hub;
pub mod namespaces;
pub mod spec;

pub use addressable::{AddressableItem, AddressableStore, Scope};
pub use executor_tool::HubToolExecutor;
pub use http::{router, AppState};
pub use hub::McpHub;
pub use namespaces::{
    agents::AgentsNamespace, clones::ClonesNamespace, memory::MemoryNamespace, orchestration::OrchestrationNamespace, sessions::SessionsNamespace, skills::SkillsNamespace,
    tasks::TasksNamespace, workflows::WorkflowsNamespace, worktrees::WorktreesNamespace,
};
pub use spec::{ServerInfo, ToolSpec, ToolSummary};
