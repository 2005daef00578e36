//! `McpHub`: the small hub every session talks to first —
//! `list_mcp_servers`, `list_tools`, `get_tool_schema`, `call_tool` —
//! instead of loading every namespace's full schema set up front. Every
//! listing and every call is filtered through `WorkflowEngine::list_allowed_tools`
//! so a session never sees, or executes, a tool its current phase blocks.

use crate::namespaces::ToolNamespace;
use crate::spec::{ServerInfo, ToolSummary};
use gobby_core::GobbyError;
use gobby_workflow::WorkflowEngine;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub struct McpHub {
    namespaces: HashMap<String, Arc<dyn ToolNamespace>>,
    engine: Arc<WorkflowEngine>,
}

impl McpHub {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { namespaces: HashMap::new(), engine }
    }

    pub fn register(&mut self, namespace: Arc<dyn ToolNamespace>) {
        self.namespaces.insert(namespace.name().to_string(), namespace);
    }

    pub fn list_mcp_servers(&self) -> Vec<ServerInfo> {
        let mut servers: Vec<ServerInfo> = self.namespaces.values().map(|ns| ServerInfo { name: ns.name().to_string(), tool_count: ns.specs().len() }).collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        servers
    }

    fn namespace(&self, server: &str) -> Result<&Arc<dyn ToolNamespace>, GobbyError> {
        self.namespaces.get(server).ok_or_else(|| GobbyError::not_found("mcp_server", server))
    }

    /// Lightweight per-tool metadata, filtered by the session's current
    /// workflow phase so a listing never advertises a blocked tool.
    pub fn list_tools(&self, session_id: &str, server: &str) -> Result<Vec<ToolSummary>, GobbyError> {
        let namespace = self.namespace(server)?;
        let universe: Vec<String> = namespace.specs().iter().map(|spec| spec.name.clone()).collect();
        let allowed = self.engine.list_allowed_tools(session_id, &universe)?;
        Ok(namespace.specs().iter().filter(|spec| allowed.contains(&spec.name)).map(|spec| spec.summary()).collect())
    }

    pub fn get_tool_schema(&self, server: &str, tool: &str) -> Result<Value, GobbyError> {
        let namespace = self.namespace(server)?;
        let spec = namespace.find_spec(tool).ok_or_else(|| GobbyError::not_found("tool", tool))?;
        Ok(serde_json::to_value(spec).map_err(|e| GobbyError::Internal(e.to_string()))?)
    }

    /// Re-checks the phase filter at call time, not just at listing time —
    /// a session could otherwise cache a listing from before a phase
    /// transition and call a tool that's since been blocked.
    pub async fn call_tool(&self, session_id: &str, server: &str, tool: &str, args: Value) -> Result<Value, GobbyError> {
        let namespace = self.namespace(server)?;
        let universe = vec![tool.to_string()];
        let allowed = self.engine.list_allowed_tools(session_id, &universe)?;
        if !allowed.iter().any(|t| t == tool) {
            return Err(GobbyError::PermissionDenied(format!("tool '{server}.{tool}' is blocked by the current workflow phase")));
        }
        namespace.call(session_id, tool, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::tasks::TasksNamespace;
    use gobby_core::{CliSource, DaemonConfig};
    use gobby_llm::NoopProvider;
    use gobby_store::Store;
    use gobby_tasks::TaskEngine;
    use std::collections::HashMap as StdHashMap;

    fn setup() -> (McpHub, String, String) {
        let store = Store::open_in_memory().unwrap();
        let project = store.projects().create("demo", "/tmp/demo", "main").unwrap();
        let session = store.sessions().create(&project.id, CliSource::Generic, None, None).unwrap();
        let engine = Arc::new(WorkflowEngine::new(store.clone(), StdHashMap::new()));
        let task_engine = Arc::new(TaskEngine::new(store.clone(), DaemonConfig::default(), Arc::new(NoopProvider)));
        let mut hub = McpHub::new(engine);
        hub.register(Arc::new(TasksNamespace::new(store, task_engine)));
        (hub, project.id, session.id)
    }

    #[test]
    fn test_list_servers_includes_registered_namespace() {
        let (hub, _project_id, _session_id) = setup();
        let servers = hub.list_mcp_servers();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "gobby-tasks");
    }

    #[test]
    fn test_list_tools_unfiltered_without_active_workflow() {
        let (hub, _project_id, session_id) = setup();
        let tools = hub.list_tools(&session_id, "gobby-tasks").unwrap();
        assert!(tools.iter().any(|t| t.name == "create_task"));
    }

    #[tokio::test]
    async fn test_call_tool_unknown_server_not_found() {
        let (hub, _project_id, session_id) = setup();
        let result = hub.call_tool(&session_id, "gobby-ghost", "noop", serde_json::json!({})).await;
        assert!(matches!(result, Err(GobbyError::NotFound { .. })));
    }
}
