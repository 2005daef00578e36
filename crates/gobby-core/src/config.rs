//! Layered configuration: built-in defaults, then `~/.gobby/config.toml`,
//! then a project-level `.gobby/config.toml` override, then `GOBBY_*`
//! environment variables. Loading is pure: the same set of layers always
//! produces the same merged structure.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Deep merge two TOML values. The overlay wins for non-table values;
/// tables are merged key-by-key, recursively.
pub fn merge_toml_values(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_map), toml::Value::Table(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged_val = match base_map.remove(&key) {
                    Some(base_val) => merge_toml_values(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged_val);
            }
            toml::Value::Table(base_map)
        }
        (_, overlay) => overlay,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_max_agent_depth")]
    pub max_agent_depth: u32,
    #[serde(default = "default_max_validation_fails")]
    pub max_validation_fails: u32,
    #[serde(default)]
    pub create_fix_subtask: bool,
    #[serde(default)]
    pub use_external_validator: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_webhook_retries")]
    pub webhook_retry_count: u32,
    #[serde(default)]
    pub conductor_autonomous: bool,
    #[serde(default)]
    pub token_budget: Option<u64>,
    #[serde(default)]
    pub stealth: bool,
}

fn default_max_agent_depth() -> u32 {
    1
}
fn default_max_validation_fails() -> u32 {
    3
}
fn default_poll_interval_secs() -> u64 {
    5
}
fn default_webhook_retries() -> u32 {
    3
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            max_agent_depth: default_max_agent_depth(),
            max_validation_fails: default_max_validation_fails(),
            create_fix_subtask: true,
            use_external_validator: false,
            poll_interval_secs: default_poll_interval_secs(),
            webhook_retry_count: default_webhook_retries(),
            conductor_autonomous: false,
            token_budget: None,
            stealth: false,
        }
    }
}

/// Global gobby home directory, `~/.gobby` (overridable by `GOBBY_CONFIG`'s
/// parent, for tests).
pub fn gobby_home() -> PathBuf {
    if let Ok(over) = std::env::var("GOBBY_HOME") {
        return PathBuf::from(over);
    }
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".gobby"))
        .unwrap_or_else(|| PathBuf::from(".gobby"))
}

/// Load the layered config, given an optional project root (providing
/// `<project_root>/.gobby/config.toml`).
pub fn load_config(project_root: Option<&Path>) -> anyhow::Result<DaemonConfig> {
    let mut merged = toml::Value::Table(toml::map::Map::new());

    if let Some(global_path) = global_config_path() {
        if let Ok(text) = std::fs::read_to_string(&global_path) {
            let parsed: toml::Value = toml::from_str(&text)?;
            merged = merge_toml_values(merged, parsed);
        }
    }

    if let Some(root) = project_root {
        let project_path = root.join(".gobby").join("config.toml");
        if let Ok(text) = std::fs::read_to_string(&project_path) {
            let parsed: toml::Value = toml::from_str(&text)?;
            merged = merge_toml_values(merged, parsed);
        }
    }

    let env_overlay = env_overlay();
    merged = merge_toml_values(merged, env_overlay);

    Ok(merged.try_into().unwrap_or_default())
}

fn global_config_path() -> Option<PathBuf> {
    if let Ok(over) = std::env::var("GOBBY_CONFIG") {
        return Some(PathBuf::from(over));
    }
    Some(gobby_home().join("config.toml"))
}

fn env_overlay() -> toml::Value {
    let mut table = toml::map::Map::new();
    if let Ok(v) = std::env::var("GOBBY_CONDUCTOR_AUTONOMOUS") {
        table.insert("conductor_autonomous".into(), toml::Value::Boolean(v == "1" || v == "true"));
    }
    if let Ok(v) = std::env::var("GOBBY_TOKEN_BUDGET") {
        if let Ok(n) = v.parse::<i64>() {
            table.insert("token_budget".into(), toml::Value::Integer(n));
        }
    }
    toml::Value::Table(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overlay_wins_scalars() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml_values(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(1));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn test_merge_recurses_into_tables() {
        let base: toml::Value = toml::from_str("[x]\na = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[x]\nb = 9").unwrap();
        let merged = merge_toml_values(base, overlay);
        let x = merged.get("x").unwrap();
        assert_eq!(x.get("a").unwrap().as_integer(), Some(1));
        assert_eq!(x.get("b").unwrap().as_integer(), Some(9));
    }

    #[test]
    fn test_default_config() {
        let cfg = DaemonConfig::default();
        assert_eq!(cfg.max_agent_depth, 1);
        assert_eq!(cfg.max_validation_fails, 3);
        assert!(cfg.create_fix_subtask);
    }

    #[test]
    fn test_load_config_pure_with_no_files() {
        // SAFETY: test runs single-threaded with respect to these vars via
        // the default test harness; no other test in this crate touches them.
        unsafe {
            std::env::remove_var("GOBBY_CONFIG");
            std::env::set_var("GOBBY_HOME", "/nonexistent-gobby-home-for-tests");
        }
        let a = load_config(None).unwrap();
        let b = load_config(None).unwrap();
        assert_eq!(a.max_agent_depth, b.max_agent_depth);
        assert_eq!(a.poll_interval_secs, b.poll_interval_secs);
    }
}
