//! One module per MCP server namespace named in the external interface
//! (`gobby-tasks`, `gobby-sessions`, ...). Each namespace owns a fixed
//! tool list and is the only place that turns a JSON argument blob into a
//! call against the store or orchestrator it wraps.

pub mod agents;
pub mod clones;
pub mod memory;
pub mod orchestration;
pub mod sessions;
pub mod skills;
pub mod tasks;
pub mod workflows;
pub mod worktrees;

use crate::spec::ToolSpec;
use async_trait::async_trait;
use gobby_core::GobbyError;
use serde_json::Value;

#[async_trait]
pub trait ToolNamespace: Send + Sync {
    fn name(&self) -> &'static str;
    fn specs(&self) -> &[ToolSpec];
    async fn call(&self, session_id: &str, tool: &str, args: Value) -> Result<Value, GobbyError>;

    fn find_spec(&self, tool: &str) -> Option<&ToolSpec> {
        self.specs().iter().find(|spec| spec.name == tool)
    }
}

/// Helper for namespace impls: pull a required string field out of the
/// call arguments with a consistent error shape.
pub(crate) fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, GobbyError> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| GobbyError::ConstraintViolation(format!("missing required field '{field}'")))
}

pub(crate) fn optional_str<'a>(args: &'a Value, field: &str) -> Option<&'a str> {
    args.get(field).and_then(Value::as_str)
}
