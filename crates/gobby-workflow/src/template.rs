//! A Jinja-like renderer restricted to the same safe namespace as rule
//! expressions, plus caller-supplied extra variables (`artifacts`,
//! `task_list`, and whatever a specific action passes in).
//!
//! Supports `{{ expression }}` interpolation and single-level
//! `{% if expression %} ... {% endif %}` blocks. A missing or unresolved
//! variable renders as empty and is logged rather than failing the render.

use crate::expr::{eval, parse, Namespace, Value};
use regex::Regex;
use std::sync::OnceLock;

fn if_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{%\s*if\s+(?P<cond>[^%]+?)\s*%\}(?P<body>.*?)\{%\s*endif\s*%\}").unwrap())
}

fn interp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*(?P<expr>[^}]+?)\s*\}\}").unwrap())
}

/// Render `template` against `ns`. Never fails: evaluation errors and
/// missing names both degrade to an empty string for that fragment.
pub fn render(template: &str, ns: &dyn Namespace) -> String {
    let after_blocks = if_block_re()
        .replace_all(template, |caps: &regex::Captures| {
            let cond = &caps["cond"];
            let body = &caps["body"];
            match parse(cond).and_then(|ast| eval(&ast, ns)) {
                Ok(value) if value.truthy() => body.to_string(),
                Ok(_) => String::new(),
                Err(error) => {
                    tracing::warn!(%error, cond, "template if-condition failed to evaluate, treating as false");
                    String::new()
                }
            }
        })
        .into_owned();

    interp_re()
        .replace_all(&after_blocks, |caps: &regex::Captures| {
            let expr_src = &caps["expr"];
            match parse(expr_src).and_then(|ast| eval(&ast, ns)) {
                Ok(Value::Null) => {
                    tracing::debug!(expr_src, "template variable resolved to null, rendering empty");
                    String::new()
                }
                Ok(value) => value.to_string(),
                Err(error) => {
                    tracing::warn!(%error, expr_src, "template expression failed to evaluate, rendering empty");
                    String::new()
                }
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprError;
    use std::collections::HashMap;

    struct TestNs(HashMap<String, Value>);

    impl Namespace for TestNs {
        fn resolve(&self, path: &[String]) -> Value {
            self.0.get(&path.join(".")).cloned().unwrap_or(Value::Null)
        }
        fn call_helper(&self, name: &str, _args: &[Value]) -> Result<Value, ExprError> {
            Err(ExprError::UnknownHelper(name.into()))
        }
    }

    #[test]
    fn test_simple_interpolation() {
        let mut vars = HashMap::new();
        vars.insert("tool".into(), Value::Str("Edit".into()));
        let ns = TestNs(vars);
        assert_eq!(render("tool is {{ tool }}", &ns), "tool is Edit");
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let ns = TestNs(HashMap::new());
        assert_eq!(render("value: [{{ missing }}]", &ns), "value: []");
    }

    #[test]
    fn test_if_block_true_branch() {
        let mut vars = HashMap::new();
        vars.insert("phase_action_count".into(), Value::Num(5.0));
        let ns = TestNs(vars);
        let rendered = render("{% if phase_action_count > 3 %}over budget{% endif %}", &ns);
        assert_eq!(rendered, "over budget");
    }

    #[test]
    fn test_if_block_false_branch_omitted() {
        let mut vars = HashMap::new();
        vars.insert("phase_action_count".into(), Value::Num(1.0));
        let ns = TestNs(vars);
        let rendered = render("{% if phase_action_count > 3 %}over budget{% endif %}", &ns);
        assert_eq!(rendered, "");
    }
}
