//! Loads every `*.yaml`/`*.yml` file in a workflows directory, resolves
//! `extends` chains and returns the fully merged, typed definitions keyed
//! by workflow name.

use crate::definition::WorkflowDefinition;
use crate::merge::{resolve_extends, ExtendsError};
use gobby_core::GobbyError;
use std::collections::HashMap;
use std::path::Path;

/// `worktree-agent`: the workflow `AgentOrchestrator::start_agent` activates
/// for worktree/clone isolation when no `workflow_name` override is given.
/// Restricts the tool surface to task bookkeeping, memory, and general file
/// tools, and blocks `spawn_agent` so nesting past `max_agent_depth` is an
/// explicit opt-out rather than an oversight.
const WORKTREE_AGENT_YAML: &str = r#"
name: worktree-agent
type: phase
phases:
  - name: execute
    allowed_tools: [get_task, update_task, close_task, remember, recall, list_memories, search_memories, Read, Write, Edit, MultiEdit, Glob, Grep, Bash]
    blocked_tools: [spawn_agent]
"#;

/// Definitions shipped with the binary rather than loaded from a project's
/// `.gobby/workflows/` directory. A project-level file with the same `name`
/// overrides its builtin counterpart.
pub fn builtin_definitions() -> HashMap<String, WorkflowDefinition> {
    let def: WorkflowDefinition = serde_yaml::from_str(WORKTREE_AGENT_YAML).expect("builtin workflow YAML is valid");
    let mut map = HashMap::new();
    map.insert(def.name.clone(), def);
    map
}

pub fn load_workflows(dir: &Path) -> Result<HashMap<String, WorkflowDefinition>, GobbyError> {
    let mut raw = HashMap::new();

    if !dir.exists() {
        return Ok(builtin_definitions());
    }

    let entries = std::fs::read_dir(dir).map_err(|e| GobbyError::Internal(e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| GobbyError::Internal(e.to_string()))?;
        let path = entry.path();
        let is_yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"));
        if !is_yaml {
            continue;
        }
        let text = std::fs::read_to_string(&path).map_err(|e| GobbyError::Internal(e.to_string()))?;
        let doc: serde_yaml::Value = serde_yaml::from_str(&text).map_err(|e| GobbyError::ConstraintViolation(format!("invalid workflow YAML at {}: {e}", path.display())))?;
        let name = doc
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GobbyError::ConstraintViolation(format!("workflow file {} is missing 'name'", path.display())))?
            .to_string();
        raw.insert(name, doc);
    }

    let mut resolved = builtin_definitions();
    for name in raw.keys() {
        let merged = resolve_extends(&raw, name).map_err(extends_to_gobby)?;
        let def: WorkflowDefinition = serde_yaml::from_value(merged).map_err(|e| GobbyError::ConstraintViolation(format!("workflow '{name}' failed to parse after merge: {e}")))?;
        resolved.insert(name.clone(), def);
    }
    Ok(resolved)
}

fn extends_to_gobby(err: ExtendsError) -> GobbyError {
    match err {
        ExtendsError::Cycle(path) => GobbyError::cycle(path),
        ExtendsError::NotFound(name) => GobbyError::not_found("workflow", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_workflows_resolves_extends() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("base.yaml"),
            "name: base\ntype: phase\nphases:\n  - name: plan\n    allowed_tools: [Read]\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("child.yaml"),
            "name: child\ntype: phase\nextends: base\nphases:\n  - name: plan\n    allowed_tools: [Read]\n  - name: execute\n    allowed_tools: all\n",
        )
        .unwrap();

        let workflows = load_workflows(dir.path()).unwrap();
        assert_eq!(workflows.len(), 3); // base + child + the builtin worktree-agent
        let child = &workflows["child"];
        assert_eq!(child.phases.len(), 2);
    }

    #[test]
    fn test_load_workflows_empty_dir_has_only_builtins() {
        let dir = tempdir().unwrap();
        let workflows = load_workflows(dir.path()).unwrap();
        assert_eq!(workflows.keys().collect::<Vec<_>>(), vec!["worktree-agent"]);
    }

    #[test]
    fn test_load_workflows_missing_dir_has_only_builtins() {
        let workflows = load_workflows(Path::new("/nonexistent/workflows")).unwrap();
        assert_eq!(workflows.keys().collect::<Vec<_>>(), vec!["worktree-agent"]);
    }

    #[test]
    fn test_builtin_worktree_agent_blocks_spawn_agent() {
        let def = &builtin_definitions()["worktree-agent"];
        let phase = def.phase("execute").unwrap();
        assert!(phase.blocked_tools.contains(&"spawn_agent".to_string()));
        assert!(phase.allowed_tools.permits("close_task"));
    }
}
