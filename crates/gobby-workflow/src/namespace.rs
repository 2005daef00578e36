//! The concrete restricted namespace rule/exit-condition/transition
//! expressions and templates evaluate against.

use crate::expr::{ExprError, Namespace, Value};
use serde_json::Value as Json;

#[derive(Debug, Clone, Default)]
pub struct SessionSignals {
    pub files_read: Vec<String>,
    pub files_modified: Vec<String>,
    pub errors: Vec<String>,
}

/// Everything a `when` expression or a template may see. Deliberately
/// narrow: there is no escape hatch to the rest of the process.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub tool: &'a str,
    pub args: &'a Json,
    pub session: &'a SessionSignals,
    pub phase_action_count: u32,
    pub total_action_count: u32,
    pub variables: &'a serde_json::Map<String, Json>,
    pub last_user_message: Option<&'a str>,
}

impl<'a> Namespace for EvalContext<'a> {
    fn resolve(&self, path: &[String]) -> Value {
        let Some((head, rest)) = path.split_first() else { return Value::Null };
        match head.as_str() {
            "tool" if rest.is_empty() => Value::Str(self.tool.to_string()),
            "args" => resolve_json_path(self.args, rest),
            "phase_action_count" if rest.is_empty() => Value::Num(self.phase_action_count as f64),
            "total_action_count" if rest.is_empty() => Value::Num(self.total_action_count as f64),
            "session" => match rest.first().map(String::as_str) {
                Some("files_read") => Value::List(self.session.files_read.iter().map(|s| Value::Str(s.clone())).collect()),
                Some("files_modified") => Value::List(self.session.files_modified.iter().map(|s| Value::Str(s.clone())).collect()),
                Some("errors") => Value::List(self.session.errors.iter().map(|s| Value::Str(s.clone())).collect()),
                _ => Value::Null,
            },
            "workflow_state" if rest.first().map(String::as_str) == Some("variables") => {
                resolve_json_path(&Json::Object(self.variables.clone()), &rest[1..])
            }
            _ => Value::Null,
        }
    }

    fn call_helper(&self, name: &str, args: &[Value]) -> Result<Value, ExprError> {
        match name {
            "command_contains" => {
                let [haystack, needle] = args else { return Err(ExprError::HelperArity(name.into())) };
                Ok(Value::Bool(haystack.as_str().unwrap_or("").contains(needle.as_str().unwrap_or(""))))
            }
            "file_is_plan" => {
                let [path] = args else { return Err(ExprError::HelperArity(name.into())) };
                let path = path.as_str().unwrap_or("").to_ascii_lowercase();
                Ok(Value::Bool(path.contains("plan") && path.ends_with(".md")))
            }
            "user_says" => {
                let [keyword] = args else { return Err(ExprError::HelperArity(name.into())) };
                let keyword = keyword.as_str().unwrap_or("").to_ascii_lowercase();
                let said = self.last_user_message.map(|m| m.to_ascii_lowercase()).unwrap_or_default();
                Ok(Value::Bool(said.contains(&keyword)))
            }
            other => Err(ExprError::UnknownHelper(other.into())),
        }
    }
}

fn resolve_json_path(root: &Json, path: &[String]) -> Value {
    let mut current = root;
    for key in path {
        match current.get(key) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    Value::from_json(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_args_subkey() {
        let args = json!({"command": "git push --force"});
        let vars = serde_json::Map::new();
        let session = SessionSignals::default();
        let ctx = EvalContext {
            tool: "Bash",
            args: &args,
            session: &session,
            phase_action_count: 0,
            total_action_count: 0,
            variables: &vars,
            last_user_message: None,
        };
        assert_eq!(ctx.resolve(&["args".into(), "command".into()]), Value::Str("git push --force".into()));
    }

    #[test]
    fn test_resolve_missing_path_is_null() {
        let args = json!({});
        let vars = serde_json::Map::new();
        let session = SessionSignals::default();
        let ctx = EvalContext {
            tool: "Bash",
            args: &args,
            session: &session,
            phase_action_count: 0,
            total_action_count: 0,
            variables: &vars,
            last_user_message: None,
        };
        assert_eq!(ctx.resolve(&["args".into(), "missing".into()]), Value::Null);
    }

    #[test]
    fn test_file_is_plan_helper() {
        let args = json!({});
        let vars = serde_json::Map::new();
        let session = SessionSignals::default();
        let ctx = EvalContext {
            tool: "Write",
            args: &args,
            session: &session,
            phase_action_count: 0,
            total_action_count: 0,
            variables: &vars,
            last_user_message: None,
        };
        let result = ctx.call_helper("file_is_plan", &[Value::Str("docs/PLAN.md".into())]).unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn test_user_says_helper() {
        let args = json!({});
        let vars = serde_json::Map::new();
        let session = SessionSignals::default();
        let ctx = EvalContext {
            tool: "Bash",
            args: &args,
            session: &session,
            phase_action_count: 0,
            total_action_count: 0,
            variables: &vars,
            last_user_message: Some("yes, approved"),
        };
        let result = ctx.call_helper("user_says", &[Value::Str("approved".into())]).unwrap();
        assert_eq!(result, Value::Bool(true));
    }
}
