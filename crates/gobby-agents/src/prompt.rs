//! Builds the prompt a spawned agent actually sees: the task description
//! plus the situational facts it needs to behave — where it is, what
//! branch it's on, when to stop. Kept as plain string assembly rather than
//! a template engine; the richer `!extends`/expression templating lives in
//! `gobby-workflow` for workflow YAML, not agent prompts.

use crate::isolation::IsolationPrep;
use gobby_core::IsolationMode;

pub struct TaskRef {
    pub seq_num: i64,
    pub title: String,
}

/// Everything `build_enhanced_prompt` needs beyond the base instructions,
/// gathered from the spawn-flow steps that ran before it.
pub struct PromptContext<'a> {
    pub isolation: &'a IsolationPrep,
    pub isolation_mode: IsolationMode,
    pub task: Option<TaskRef>,
}

/// Wrap `base_prompt` (the agent definition's instructions, with any
/// config overrides already merged in) with the workspace, branch, task,
/// and stop-condition facts the spec requires every spawned agent to see.
pub fn build_enhanced_prompt(base_prompt: &str, ctx: &PromptContext) -> String {
    let mut sections = vec![base_prompt.trim_end().to_string()];

    sections.push(format!("Workspace: {}", ctx.isolation.workspace_path.display()));

    if let Some(branch) = &ctx.isolation.branch_name {
        sections.push(format!("Branch: {branch}"));
    }

    if let Some(task) = &ctx.task {
        sections.push(format!("Linked task: #{} {}", task.seq_num, task.title));
    }

    sections.push("Stop as soon as the task is done: call the `complete` tool with your output, a status, and any files you changed. Do not keep working past that point.".to_string());

    if matches!(ctx.isolation_mode, IsolationMode::Clone) {
        sections.push("Your commits stay local to this clone until it is synced back to the main repository; do not push or rely on the remote reflecting your work.".to_string());
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn prep(branch: Option<&str>) -> IsolationPrep {
        IsolationPrep {
            workspace_path: PathBuf::from("/tmp/ws"),
            branch_name: branch.map(String::from),
            worktree_id: None,
            clone_id: None,
        }
    }

    #[test]
    fn test_includes_workspace_and_branch() {
        let isolation = prep(Some("task-1-fix-bug"));
        let ctx = PromptContext { isolation: &isolation, isolation_mode: IsolationMode::Worktree, task: None };
        let prompt = build_enhanced_prompt("Fix the bug.", &ctx);
        assert!(prompt.contains("Workspace: /tmp/ws"));
        assert!(prompt.contains("Branch: task-1-fix-bug"));
        assert!(prompt.contains("call the `complete` tool"));
    }

    #[test]
    fn test_clone_mode_adds_local_commit_note() {
        let isolation = prep(Some("task-1-fix-bug"));
        let ctx = PromptContext { isolation: &isolation, isolation_mode: IsolationMode::Clone, task: None };
        let prompt = build_enhanced_prompt("Fix the bug.", &ctx);
        assert!(prompt.contains("stay local to this clone"));
    }

    #[test]
    fn test_current_mode_has_no_branch_or_clone_note() {
        let isolation = prep(None);
        let ctx = PromptContext { isolation: &isolation, isolation_mode: IsolationMode::Current, task: None };
        let prompt = build_enhanced_prompt("Fix the bug.", &ctx);
        assert!(!prompt.contains("Branch:"));
        assert!(!prompt.contains("stay local"));
    }

    #[test]
    fn test_task_ref_included() {
        let isolation = prep(Some("task-7-add-retries"));
        let ctx = PromptContext {
            isolation: &isolation,
            isolation_mode: IsolationMode::Worktree,
            task: Some(TaskRef { seq_num: 7, title: "Add retries".to_string() }),
        };
        let prompt = build_enhanced_prompt("Fix the bug.", &ctx);
        assert!(prompt.contains("Linked task: #7 Add retries"));
    }
}
