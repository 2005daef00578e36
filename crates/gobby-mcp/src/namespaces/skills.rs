//! `gobby-skills`: progressive disclosure over project and global skill
//! files, the same pattern `list_mcp_servers`/`list_tools` uses for tools.

use super::{required_str, ToolNamespace};
use crate::addressable::AddressableStore;
use crate::spec::ToolSpec;
use async_trait::async_trait;
use gobby_core::GobbyError;
use serde_json::{json, Value};

pub struct SkillsNamespace {
    skills: AddressableStore,
    specs: Vec<ToolSpec>,
}

impl SkillsNamespace {
    pub fn new(skills: AddressableStore) -> Self {
        let specs = vec![
            ToolSpec {
                name: "list_skills".into(),
                description: "List skill names and descriptions available to this project (project-scoped shadow global).".into(),
                category: "skills".into(),
                parameters: json!({"type": "object", "properties": {}}),
            },
            ToolSpec {
                name: "get_skill".into(),
                description: "Fetch a skill's full body by name.".into(),
                category: "skills".into(),
                parameters: json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}),
            },
            ToolSpec {
                name: "search_skills".into(),
                description: "Substring search over skill names, descriptions, and bodies.".into(),
                category: "skills".into(),
                parameters: json!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]}),
            },
        ];
        Self { skills, specs }
    }
}

#[async_trait]
impl ToolNamespace for SkillsNamespace {
    fn name(&self) -> &'static str {
        "gobby-skills"
    }

    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn call(&self, _session_id: &str, tool: &str, args: Value) -> Result<Value, GobbyError> {
        match tool {
            "list_skills" => {
                let skills = self.skills.list();
                Ok(json!(skills.into_iter().map(|s| json!({"name": s.name, "description": s.description, "always_apply": s.always_apply})).collect::<Vec<_>>()))
            }
            "get_skill" => {
                let name = required_str(&args, "name")?;
                let skill = self.skills.get(name)?;
                Ok(serde_json::to_value(skill).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            "search_skills" => {
                let query = required_str(&args, "query")?;
                let results = self.skills.search(query);
                Ok(serde_json::to_value(results).map_err(|e| GobbyError::Internal(e.to_string()))?)
            }
            other => Err(GobbyError::not_found("tool", other)),
        }
    }
}
