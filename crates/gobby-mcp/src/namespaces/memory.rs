//! `gobby-memory`: addressable notes a session can write and later recall,
//! same filesystem shape as skills. Deliberately no ranking/embeddings —
//! `recall` is a substring search, same as `search_skills`.

use super::{optional_str, required_str, ToolNamespace};
use crate::addressable::AddressableStore;
use crate::spec::ToolSpec;
use async_trait::async_trait;
use gobby_core::GobbyError;
use serde_json::{json, Value};

pub struct MemoryNamespace {
    memories: AddressableStore,
    specs: Vec<ToolSpec>,
}

impl MemoryNamespace {
    pub fn new(memories: AddressableStore) -> Self {
        let specs = vec![
            ToolSpec {
                name: "remember".into(),
                description: "Save a named note for later sessions to recall.".into(),
                category: "memory".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {"name": {"type": "string"}, "description": {"type": "string"}, "body": {"type": "string"}},
                    "required": ["name", "body"]
                }),
            },
            ToolSpec {
                name: "recall".into(),
                description: "Fetch a remembered note by name.".into(),
                category: "memory".into(),
                parameters: json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}),
            },
            ToolSpec {
                name: "list_memories".into(),
                description: "List all remembered notes visible to this project.".into(),
                category: "memory".into(),
                parameters: json!({"type": "object", "properties": {}}),
            },
            ToolSpec {
                name: "search_memories".into(),
                description: "Substring search over remembered notes.".into(),
                category: "memory".into(),
                parameters: json!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]}),
            },
        ];
        Self { memories, specs }
    }
}

#[async_trait]
impl ToolNamespace for MemoryNamespace {
    fn name(&self) -> &'static str {
        "gobby-memory"
    }

    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn call(&self, _session_id: &str, tool: &str, args: Value) -> Result<Value, GobbyError> {
        match tool {
            "remember" => {
                let name = required_str(&args, "name")?;
                let body = required_str(&args, "body")?;
                let description = optional_str(&args, "description").unwrap_or_default();
                self.memories.save(name, description, body)?;
                Ok(json!({"saved": true}))
            }
            "recall" => {
                let name = required_str(&args, "name")?;
                let item = self.memories.get(name)?;
                Ok(serde_json::to_value(item).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            "list_memories" => {
                let items = self.memories.list();
                Ok(json!(items.into_iter().map(|i| json!({"name": i.name, "description": i.description})).collect::<Vec<_>>()))
            }
            "search_memories" => {
                let query = required_str(&args, "query")?;
                let results = self.memories.search(query);
                Ok(serde_json::to_value(results).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            other => Err(GobbyError::not_found("tool", other)),
        }
    }
}
