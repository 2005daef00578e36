//! `extends` resolution: deep merge of workflow YAML documents with cycle
//! detection, generalizing the table-recursive, overlay-wins algorithm used
//! for TOML config layering to YAML mappings.

use std::collections::HashMap;

/// A sequence wrapped as `{"!append": [...]}` is appended to the base
/// sequence at the same key instead of replacing it outright — the
/// `!append` annotation from the workflow YAML spec, expressed as an
/// ordinary mapping key since generic `Value` merging has no tag support.
const APPEND_KEY: &str = "!append";

pub fn merge_yaml_values(base: serde_yaml::Value, overlay: serde_yaml::Value) -> serde_yaml::Value {
    use serde_yaml::Value;
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                if let Value::Mapping(ref m) = overlay_val {
                    if m.len() == 1 {
                        if let Some(to_append) = m.get(Value::String(APPEND_KEY.to_string())) {
                            let mut merged_seq = match base_map.get(&key) {
                                Some(Value::Sequence(existing)) => existing.clone(),
                                _ => Vec::new(),
                            };
                            if let Value::Sequence(items) = to_append {
                                merged_seq.extend(items.clone());
                            }
                            base_map.insert(key, Value::Sequence(merged_seq));
                            continue;
                        }
                    }
                }
                let merged_val = match base_map.get(&key) {
                    Some(base_val) => merge_yaml_values(base_val.clone(), overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged_val);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtendsError {
    #[error("workflow '{0}' is not defined")]
    NotFound(String),
    #[error("cycle in 'extends' chain: {0}")]
    Cycle(String),
}

/// Resolve `name`'s full `extends` chain against `raw`, a name -> parsed
/// YAML document map, and return the fully merged document (base first,
/// each descendant overlaid on top, ending with `name` itself).
pub fn resolve_extends(raw: &HashMap<String, serde_yaml::Value>, name: &str) -> Result<serde_yaml::Value, ExtendsError> {
    let mut chain = Vec::new();
    let mut visited = Vec::new();
    let mut current = name.to_string();

    loop {
        if visited.contains(&current) {
            visited.push(current.clone());
            return Err(ExtendsError::Cycle(visited.join(" -> ")));
        }
        visited.push(current.clone());

        let doc = raw.get(&current).ok_or_else(|| ExtendsError::NotFound(current.clone()))?;
        chain.push(doc.clone());

        match doc.get("extends").and_then(|v| v.as_str()) {
            Some(parent) => current = parent.to_string(),
            None => break,
        }
    }

    chain.reverse();
    let mut merged = chain.remove(0);
    for overlay in chain {
        merged = merge_yaml_values(merged, overlay);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> serde_yaml::Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_merge_overlay_scalar_wins() {
        let base = doc("a: 1\nb: 2");
        let overlay = doc("b: 3");
        let merged = merge_yaml_values(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_i64(), Some(1));
        assert_eq!(merged.get("b").unwrap().as_i64(), Some(3));
    }

    #[test]
    fn test_merge_recurses_into_mappings() {
        let base = doc("settings:\n  x: 1\n  y: 2");
        let overlay = doc("settings:\n  y: 9");
        let merged = merge_yaml_values(base, overlay);
        let settings = merged.get("settings").unwrap();
        assert_eq!(settings.get("x").unwrap().as_i64(), Some(1));
        assert_eq!(settings.get("y").unwrap().as_i64(), Some(9));
    }

    #[test]
    fn test_merge_append_tag_extends_sequence() {
        let base = doc("blocked_tools: [Write]");
        let overlay = doc("blocked_tools:\n  \"!append\": [Edit]");
        let merged = merge_yaml_values(base, overlay);
        let list: Vec<String> = merged.get("blocked_tools").unwrap().as_sequence().unwrap().iter().map(|v| v.as_str().unwrap().to_string()).collect();
        assert_eq!(list, vec!["Write".to_string(), "Edit".to_string()]);
    }

    #[test]
    fn test_resolve_extends_chain() {
        let mut raw = HashMap::new();
        raw.insert("base".to_string(), doc("name: base\ntype: phase\nphases: []"));
        raw.insert("child".to_string(), doc("name: child\ntype: phase\nextends: base\nphases: []"));
        let merged = resolve_extends(&raw, "child").unwrap();
        assert_eq!(merged.get("name").unwrap().as_str(), Some("child"));
    }

    #[test]
    fn test_resolve_extends_detects_cycle() {
        let mut raw = HashMap::new();
        raw.insert("a".to_string(), doc("name: a\ntype: phase\nextends: b\nphases: []"));
        raw.insert("b".to_string(), doc("name: b\ntype: phase\nextends: a\nphases: []"));
        let err = resolve_extends(&raw, "a").unwrap_err();
        assert!(matches!(err, ExtendsError::Cycle(_)));
    }

    #[test]
    fn test_resolve_extends_missing_parent() {
        let mut raw = HashMap::new();
        raw.insert("child".to_string(), doc("name: child\ntype: phase\nextends: ghost\nphases: []"));
        let err = resolve_extends(&raw, "child").unwrap_err();
        assert!(matches!(err, ExtendsError::NotFound(_)));
    }
}
