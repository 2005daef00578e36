//! Shared setup every subcommand needs: open the store, load layered
//! config, and resolve "the current project" from `--cd`/cwd the same
//! way `HookDispatcher::resolve_or_create_project` does for a hook event.

use gobby_agents::AgentOrchestrator;
use gobby_core::config::{gobby_home, load_config};
use gobby_core::{DaemonConfig, GobbyError, OutputFormat};
use gobby_events::EventBus;
use gobby_git::ProcessGitOps;
use gobby_hooks::HookDispatcher;
use gobby_llm::{ApiProvider, LlmProvider, NoopProvider};
use gobby_store::models::Project;
use gobby_store::Store;
use gobby_workflow::{load_workflows, WorkflowEngine};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `GOBBY_LLM_API_KEY` selects `ApiProvider`; without it, task
/// expansion/validation/compaction run against `NoopProvider` (tasks
/// behave like they never pass validation, which is the honest behavior
/// with no model configured).
pub fn build_llm_provider() -> Arc<dyn LlmProvider> {
    match std::env::var("GOBBY_LLM_API_KEY") {
        Ok(api_key) => {
            let base_url = std::env::var("GOBBY_LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
            let model = std::env::var("GOBBY_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
            Arc::new(ApiProvider::new("api", base_url, api_key, model))
        }
        Err(_) => Arc::new(NoopProvider),
    }
}

pub struct CliContext {
    pub store: Store,
    pub config: DaemonConfig,
    pub cwd: PathBuf,
    pub format: OutputFormat,
}

impl CliContext {
    pub fn load(cd: Option<String>, format: OutputFormat) -> anyhow::Result<Self> {
        let cwd = match cd {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?,
        };
        let home = gobby_home();
        std::fs::create_dir_all(&home)?;
        let store = Store::open(home.join("gobby.db"))?;
        let config = load_config(Some(&cwd))?;
        Ok(Self { store, config, cwd, format })
    }

    /// A `.gobby/project.json` manifest under `self.cwd` wins; otherwise a
    /// project named after the directory is created (and a manifest
    /// written, so the next invocation finds it without re-creating).
    pub fn current_project(&self) -> Result<Project, GobbyError> {
        let manifest_path = self.cwd.join(".gobby").join("project.json");
        if let Ok(text) = std::fs::read_to_string(&manifest_path) {
            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                if let Some(id) = value.get("id").and_then(Value::as_str) {
                    if let Some(project) = self.store.projects().get(id).map_err(|e| GobbyError::Internal(e.to_string()))? {
                        return Ok(project);
                    }
                }
            }
        }
        let name = self.cwd.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "unnamed".to_string());
        if let Some(project) = self.store.projects().get_by_name(&name).map_err(|e| GobbyError::Internal(e.to_string()))? {
            return Ok(project);
        }
        let project = self
            .store
            .projects()
            .create(&name, &self.cwd.to_string_lossy(), "main")
            .map_err(|e| GobbyError::Internal(e.to_string()))?;
        write_manifest(&manifest_path, &project.id);
        Ok(project)
    }

    /// Resolve a project argument: an explicit name/id, or (if absent)
    /// [`Self::current_project`].
    pub fn resolve_project(&self, project: Option<&str>) -> Result<Project, GobbyError> {
        match project {
            Some(reference) => {
                if let Some(p) = self.store.projects().get(reference).map_err(|e| GobbyError::Internal(e.to_string()))? {
                    return Ok(p);
                }
                self.store
                    .projects()
                    .get_by_name(reference)
                    .map_err(|e| GobbyError::Internal(e.to_string()))?
                    .ok_or_else(|| GobbyError::not_found("project", reference))
            }
            None => self.current_project(),
        }
    }

    pub fn workflows_dir(&self, override_dir: Option<&str>) -> PathBuf {
        match override_dir {
            Some(dir) => PathBuf::from(dir),
            None => self.cwd.join(".gobby").join("workflows"),
        }
    }

    /// One-shot `AgentOrchestrator` for CLI commands that spawn/manage
    /// agents out of process. The daemon keeps its own long-lived instance
    /// sharing the hook dispatcher with the MCP surface; a CLI invocation
    /// has no persistent subscriber so it builds a disposable one against
    /// the same store instead of round-tripping through the daemon's HTTP
    /// API. `workflows_dir` feeds the dispatcher's workflow engine the
    /// same set `gobby workflows` commands load.
    pub fn build_orchestrator(&self, workflows_dir: Option<&str>) -> Result<Arc<AgentOrchestrator>, GobbyError> {
        let defs: HashMap<String, gobby_workflow::WorkflowDefinition> = load_workflows(&self.workflows_dir(workflows_dir)).unwrap_or_else(|_| gobby_workflow::builtin_definitions());
        let dispatcher_engine = WorkflowEngine::new(self.store.clone(), defs.clone());
        let dispatcher = Arc::new(HookDispatcher::new(self.store.clone(), dispatcher_engine, EventBus::new(), build_llm_provider()));
        let workflow_engine = Arc::new(WorkflowEngine::new(self.store.clone(), defs));
        let home = gobby_home();
        Ok(Arc::new(AgentOrchestrator::new(
            self.store.clone(),
            Arc::new(ProcessGitOps),
            build_llm_provider(),
            dispatcher,
            EventBus::new(),
            self.config.clone(),
            home.join("worktrees"),
            home.join("clones"),
            workflow_engine,
        )))
    }

    pub fn print<T: Serialize>(&self, value: &T) {
        let json = serde_json::to_value(value).unwrap_or(Value::Null);
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json).unwrap()),
            OutputFormat::Text => print_text(&json, 0),
        }
    }
}

fn write_manifest(path: &Path, project_id: &str) {
    if let Some(parent) = path.parent() {
        if std::fs::create_dir_all(parent).is_ok() {
            let body = serde_json::json!({"id": project_id});
            let _ = std::fs::write(path, serde_json::to_string_pretty(&body).unwrap_or_default());
        }
    }
}

fn print_text(value: &Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                println!("{pad}(none)");
            }
            for item in items {
                print_text(item, indent);
                if indent == 0 {
                    println!();
                }
            }
        }
        Value::Object(map) => {
            for (key, val) in map {
                match val {
                    Value::Object(inner) if !inner.is_empty() => {
                        println!("{pad}{key}:");
                        print_text(val, indent + 1);
                    }
                    Value::Array(inner) if !inner.is_empty() => {
                        println!("{pad}{key}:");
                        print_text(val, indent + 1);
                    }
                    _ => println!("{pad}{key}: {}", render_scalar(val)),
                }
            }
        }
        other => println!("{pad}{}", render_scalar(other)),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
