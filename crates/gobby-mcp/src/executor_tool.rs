//! Wires `McpHub` into `gobby_agents::executor::ToolExecutor` so an
//! in-process agent can call real tools instead of `NullToolExecutor`.
//! Tool names are flattened as `server.tool` (e.g. `gobby-tasks.create_task`)
//! since the in-process loop sees one flat tool list, not the server/tool
//! split the hub exposes to a true MCP client.

use crate::hub::McpHub;
use async_trait::async_trait;
use gobby_agents::executor::ToolExecutor;
use gobby_core::GobbyError;
use gobby_llm::ToolSchema;
use serde_json::Value;

pub struct HubToolExecutor<'a> {
    hub: &'a McpHub,
    session_id: String,
}

impl<'a> HubToolExecutor<'a> {
    pub fn new(hub: &'a McpHub, session_id: impl Into<String>) -> Self {
        Self { hub, session_id: session_id.into() }
    }

    fn split(name: &str) -> Result<(&str, &str), GobbyError> {
        name.split_once('.').ok_or_else(|| GobbyError::ConstraintViolation(format!("tool name '{name}' is not in 'server.tool' form")))
    }
}

#[async_trait]
impl<'a> ToolExecutor for HubToolExecutor<'a> {
    async fn call(&self, name: &str, args: &Value) -> Result<Value, GobbyError> {
        let (server, tool) = Self::split(name)?;
        self.hub.call_tool(&self.session_id, server, tool, args.clone()).await
    }

    fn schemas(&self) -> Vec<ToolSchema> {
        self.hub
            .list_mcp_servers()
            .into_iter()
            .flat_map(|server| {
                let server_name = server.name.clone();
                self.hub.list_tools(&self.session_id, &server.name).unwrap_or_default().into_iter().map(move |summary| ToolSchema {
                    name: format!("{}.{}", server_name, summary.name),
                    description: summary.description,
                    parameters: self.hub.get_tool_schema(&server_name, &summary.name).unwrap_or_else(|_| serde_json::json!({})),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::McpHub;
    use crate::namespaces::tasks::TasksNamespace;
    use gobby_core::{CliSource, DaemonConfig};
    use gobby_llm::NoopProvider;
    use gobby_store::Store;
    use gobby_tasks::TaskEngine;
    use gobby_workflow::WorkflowEngine;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_call_dispatches_through_hub() {
        let store = Store::open_in_memory().unwrap();
        let project = store.projects().create("demo", "/tmp/demo", "main").unwrap();
        let session = store.sessions().create(&project.id, CliSource::Generic, None, None).unwrap();
        let engine = Arc::new(WorkflowEngine::new(store.clone(), HashMap::new()));
        let task_engine = Arc::new(TaskEngine::new(store.clone(), DaemonConfig::default(), Arc::new(NoopProvider)));
        let mut hub = McpHub::new(engine);
        hub.register(Arc::new(TasksNamespace::new(store, task_engine)));

        let executor = HubToolExecutor::new(&hub, session.id);
        let args = serde_json::json!({"project_id": project.id, "title": "fix the thing"});
        let result = executor.call("gobby-tasks.create_task", &args).await.unwrap();
        assert_eq!(result["title"], "fix the thing");
    }
}
