//! Skills and memories are, to the daemon, the same shape: a markdown file
//! with a small YAML frontmatter block, addressable by name, optionally
//! always-applied, and scoped to a project or global. This is deliberately
//! a thin filesystem index rather than a search backend — ranking and
//! embeddings are out of scope here, `search` is a substring match over
//! name, description and body.

use gobby_core::GobbyError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Project,
    Global,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressableItem {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub always_apply: bool,
    pub scope: Scope,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct Frontmatter {
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    always_apply: bool,
}

fn split_frontmatter(raw: &str) -> (Option<Frontmatter>, String) {
    let Some(rest) = raw.strip_prefix("---\n") else {
        return (None, raw.to_string());
    };
    let Some(end) = rest.find("\n---") else {
        return (None, raw.to_string());
    };
    let (yaml, body) = rest.split_at(end);
    let body = body.trim_start_matches("\n---").trim_start_matches('\n');
    match serde_yaml::from_str(yaml) {
        Ok(fm) => (Some(fm), body.to_string()),
        Err(_) => (None, raw.to_string()),
    }
}

fn load_file(path: &Path, default_name: &str, scope: Scope) -> Option<AddressableItem> {
    let raw = fs::read_to_string(path).ok()?;
    let (frontmatter, body) = split_frontmatter(&raw);
    let (name, description, always_apply) = match frontmatter {
        Some(fm) => (fm.name.unwrap_or_else(|| default_name.to_string()), fm.description.unwrap_or_default(), fm.always_apply),
        None => (default_name.to_string(), String::new(), false),
    };
    Some(AddressableItem { name, description, always_apply, scope, body })
}

/// Indexes one addressable kind (skills or memories) across an optional
/// project directory and the global `~/.gobby` directory. Project entries
/// shadow global entries of the same name.
pub struct AddressableStore {
    project_dir: Option<PathBuf>,
    global_dir: PathBuf,
}

impl AddressableStore {
    pub fn new(project_dir: Option<PathBuf>, global_dir: PathBuf) -> Self {
        Self { project_dir, global_dir }
    }

    fn entries_in(dir: &Path, scope: Scope) -> Vec<AddressableItem> {
        let Ok(read_dir) = fs::read_dir(dir) else { return vec![] };
        let mut items = Vec::new();
        for entry in read_dir.flatten() {
            let path = entry.path();
            let is_doc = path.extension().is_some_and(|ext| ext == "md" || ext == "yaml" || ext == "yml");
            if !path.is_file() || !is_doc {
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("unnamed");
            if let Some(item) = load_file(&path, stem, scope) {
                items.push(item);
            }
        }
        items
    }

    pub fn list(&self) -> Vec<AddressableItem> {
        let mut seen = std::collections::HashSet::new();
        let mut items = Vec::new();
        if let Some(dir) = &self.project_dir {
            for item in Self::entries_in(dir, Scope::Project) {
                seen.insert(item.name.clone());
                items.push(item);
            }
        }
        for item in Self::entries_in(&self.global_dir, Scope::Global) {
            if seen.insert(item.name.clone()) {
                items.push(item);
            }
        }
        items
    }

    pub fn get(&self, name: &str) -> Result<AddressableItem, GobbyError> {
        self.list().into_iter().find(|item| item.name == name).ok_or_else(|| GobbyError::not_found("addressable_item", name))
    }

    pub fn search(&self, query: &str) -> Vec<AddressableItem> {
        let needle = query.to_lowercase();
        self.list()
            .into_iter()
            .filter(|item| item.name.to_lowercase().contains(&needle) || item.description.to_lowercase().contains(&needle) || item.body.to_lowercase().contains(&needle))
            .collect()
    }

    /// Always writes to the project directory if one is set, else global.
    /// Used by the memory namespace's `remember` tool.
    pub fn save(&self, name: &str, description: &str, body: &str) -> Result<(), GobbyError> {
        let dir = self.project_dir.clone().unwrap_or_else(|| self.global_dir.clone());
        fs::create_dir_all(&dir).map_err(|e| GobbyError::Internal(format!("failed to create {}: {e}", dir.display())))?;
        let slug: String = name.chars().map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' }).collect();
        let path = dir.join(format!("{slug}.md"));
        let content = format!("---\nname: {name}\ndescription: {description}\n---\n{body}\n");
        fs::write(&path, content).map_err(|e| GobbyError::Internal(format!("failed to write {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_entry_shadows_global() {
        let project = tempfile::tempdir().unwrap();
        let global = tempfile::tempdir().unwrap();
        fs::write(project.path().join("retries.md"), "---\nname: retries\ndescription: project version\n---\nbody").unwrap();
        fs::write(global.path().join("retries.md"), "---\nname: retries\ndescription: global version\n---\nbody").unwrap();

        let store = AddressableStore::new(Some(project.path().to_path_buf()), global.path().to_path_buf());
        let item = store.get("retries").unwrap();
        assert_eq!(item.description, "project version");
        assert_eq!(item.scope, Scope::Project);
    }

    #[test]
    fn test_search_matches_description() {
        let global = tempfile::tempdir().unwrap();
        fs::write(global.path().join("git-flow.md"), "---\nname: git-flow\ndescription: branching and merge conventions\n---\n# git flow").unwrap();
        let store = AddressableStore::new(None, global.path().to_path_buf());
        assert_eq!(store.search("merge").len(), 1);
        assert_eq!(store.search("nonexistent").len(), 0);
    }

    #[test]
    fn test_save_then_get_round_trips() {
        let global = tempfile::tempdir().unwrap();
        let store = AddressableStore::new(None, global.path().to_path_buf());
        store.save("deploy-notes", "how we deploy", "use the staging flag").unwrap();
        let item = store.get("deploy-notes").unwrap();
        assert!(item.body.contains("staging flag"));
    }
}
