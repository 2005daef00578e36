//! The workflow engine: loads phase/step/lifecycle definitions, evaluates
//! their rules and transitions against a restricted expression language,
//! and is the single authority for which tools a session may call.

pub mod definition;
pub mod effects;
pub mod engine;
pub mod expr;
pub mod loader;
pub mod merge;
pub mod namespace;
pub mod template;

pub use definition::{Action, AllowedTools, Phase, Rule, RuleAction, Transition, WorkflowDefinition, WorkflowKind};
pub use effects::{ContextSource, Effect};
pub use engine::{Decision, DecisionOutcome, WorkflowEngine};
pub use expr::{eval, parse, Expr, ExprError, Namespace, Value};
pub use loader::{builtin_definitions, load_workflows};
pub use namespace::{EvalContext, SessionSignals};
pub use template::render;
