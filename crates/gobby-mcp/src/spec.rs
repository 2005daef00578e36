//! The shapes progressive disclosure is built from: a lightweight summary
//! cheap enough to hand a session up front, and the full schema fetched
//! only once a session commits to calling a tool.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ~100 tokens of metadata: enough for a session to decide whether it
/// wants the tool without paying for every server's full schema set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub category: String,
    pub parameters: Value,
}

impl ToolSpec {
    pub fn summary(&self) -> ToolSummary {
        ToolSummary { name: self.name.clone(), description: self.description.clone(), category: self.category.clone() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub tool_count: usize,
}
