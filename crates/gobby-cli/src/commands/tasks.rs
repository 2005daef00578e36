//! `gobby tasks ...`: thin CLI wrapper over `gobby_tasks::TaskEngine`.

use crate::cli::{DepCommands, TaskCommands};
use crate::context::{build_llm_provider, CliContext};
use gobby_core::{DependencyType, GobbyError, TaskType};
use gobby_git::{GitOps, ProcessGitOps};
use gobby_tasks::TaskEngine;
use std::path::PathBuf;

fn parse_task_type(raw: &str) -> TaskType {
    match raw {
        "bug" => TaskType::Bug,
        "feature" => TaskType::Feature,
        "epic" => TaskType::Epic,
        "chore" => TaskType::Chore,
        _ => TaskType::Task,
    }
}

fn parse_dep_type(raw: &str) -> DependencyType {
    match raw {
        "related" => DependencyType::Related,
        "discovered-from" => DependencyType::DiscoveredFrom,
        _ => DependencyType::Blocks,
    }
}

fn engine(ctx: &CliContext) -> TaskEngine {
    TaskEngine::new(ctx.store.clone(), ctx.config.clone(), build_llm_provider())
}

pub async fn handle(ctx: &CliContext, cmd: TaskCommands) -> Result<(), GobbyError> {
    let engine = engine(ctx);
    let git: Box<dyn GitOps> = Box::new(ProcessGitOps);
    match cmd {
        TaskCommands::List { project } => {
            let project = ctx.resolve_project(project.as_deref())?;
            let tasks = ctx.store.tasks().list_by_project(&project.id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&tasks);
        }
        TaskCommands::Show { task } => {
            let project = ctx.current_project().ok();
            let id = ctx.store.resolve_task_ref(&task, project.as_ref().map(|p| p.id.as_str()))?;
            let found = ctx.store.tasks().get(&id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("task", task.clone()))?;
            ctx.print(&found);
        }
        TaskCommands::Create { project, title, description, parent, details, test_strategy, priority, task_type, label, validation_criteria, blocks } => {
            let project = ctx.resolve_project(project.as_deref())?;
            let created = engine.create_task(
                &project.id,
                parent.as_deref(),
                &title,
                description.as_deref().unwrap_or(""),
                details.as_deref(),
                test_strategy.as_deref(),
                priority,
                parse_task_type(&task_type),
                label,
                validation_criteria.as_deref(),
                &blocks,
            )?;
            ctx.print(&created);
        }
        TaskCommands::Update { task, title, description, details, priority, label } => {
            let project = ctx.current_project().ok();
            let id = ctx.store.resolve_task_ref(&task, project.as_ref().map(|p| p.id.as_str()))?;
            let labels = if label.is_empty() { None } else { Some(label) };
            ctx.store
                .tasks()
                .update(&id, title.as_deref(), description.as_deref(), details.as_deref(), priority, labels.as_deref())
                .map_err(|e| GobbyError::Internal(e.to_string()))?;
            let updated = ctx.store.tasks().get(&id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("task", task.clone()))?;
            ctx.print(&updated);
        }
        TaskCommands::Close { task, session, commit_sha, force } => {
            let project = ctx.current_project().ok();
            let id = ctx.store.resolve_task_ref(&task, project.as_ref().map(|p| p.id.as_str()))?;
            let session_id = ctx.store.resolve_session_ref(&session, project.as_ref().map(|p| p.id.as_str()))?;
            let session_row = ctx.store.sessions().get(&session_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("session", session.clone()))?;
            let status = engine.close_task(&id, session_row.agent_depth, commit_sha.as_deref(), &session_id, force)?;
            ctx.print(&serde_json::json!({"task_id": id, "status": status}));
        }
        TaskCommands::Reopen { task } => {
            let project = ctx.current_project().ok();
            let id = ctx.store.resolve_task_ref(&task, project.as_ref().map(|p| p.id.as_str()))?;
            engine.reopen_task(&id)?;
            ctx.print(&serde_json::json!({"task_id": id, "reopened": true}));
        }
        TaskCommands::Escalate { task, reason } => {
            let project = ctx.current_project().ok();
            let id = ctx.store.resolve_task_ref(&task, project.as_ref().map(|p| p.id.as_str()))?;
            engine.escalate_task(&id, &reason)?;
            ctx.print(&serde_json::json!({"task_id": id, "status": "escalated"}));
        }
        TaskCommands::Delete { task } => {
            let project = ctx.current_project().ok();
            let id = ctx.store.resolve_task_ref(&task, project.as_ref().map(|p| p.id.as_str()))?;
            ctx.store.tasks().delete_hard(&id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&serde_json::json!({"task_id": id, "deleted": true}));
        }
        TaskCommands::Dep { cmd } => handle_dep(ctx, &engine, cmd)?,
        TaskCommands::Ready { project } => {
            let project = ctx.resolve_project(project.as_deref())?;
            let ready = engine.list_ready_tasks(&project.id)?;
            ctx.print(&ready);
        }
        TaskCommands::Blocked { project } => {
            let project = ctx.resolve_project(project.as_deref())?;
            let open = ctx.store.tasks().list_open_by_project(&project.id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            let ready = engine.list_ready_tasks(&project.id)?;
            let blocked: Vec<_> = open.into_iter().filter(|t| !ready.iter().any(|r| r.id == t.id)).collect();
            ctx.print(&blocked);
        }
        TaskCommands::Expand { task, strategy, max_subtasks } => {
            let project = ctx.current_project().ok();
            let id = ctx.store.resolve_task_ref(&task, project.as_ref().map(|p| p.id.as_str()))?;
            let created = engine.expand_task(&id, strategy.as_deref(), max_subtasks).await?;
            ctx.print(&created);
        }
        TaskCommands::Validate { task } => {
            let project = ctx.current_project().ok();
            let id = ctx.store.resolve_task_ref(&task, project.as_ref().map(|p| p.id.as_str()))?;
            let outcome = engine.validate_task(&id, git.as_ref()).await?;
            ctx.print(&serde_json::json!({
                "passed": outcome.passed,
                "feedback": outcome.feedback,
                "fail_count": outcome.fail_count,
                "task_failed": outcome.task_failed,
                "fix_subtask_id": outcome.fix_subtask_id,
            }));
        }
        TaskCommands::Sync { project, out } => {
            let project = ctx.resolve_project(project.as_deref())?;
            let out_path: PathBuf = out.map(PathBuf::from).unwrap_or_else(|| ctx.cwd.join("tasks.jsonl"));
            gobby_tasks::jsonl::export_to_jsonl(&ctx.store, &project.id, &out_path)?;
            ctx.print(&serde_json::json!({"project_id": project.id, "exported_to": out_path.to_string_lossy()}));
        }
        TaskCommands::Compact { task } => {
            let project = ctx.current_project().ok();
            let id = ctx.store.resolve_task_ref(&task, project.as_ref().map(|p| p.id.as_str()))?;
            engine.compact_task(&id).await?;
            let compacted = ctx.store.tasks().get(&id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("task", task.clone()))?;
            ctx.print(&compacted);
        }
    }
    Ok(())
}

fn handle_dep(ctx: &CliContext, engine: &TaskEngine, cmd: DepCommands) -> Result<(), GobbyError> {
    let project = ctx.current_project().ok();
    let pid = project.as_ref().map(|p| p.id.as_str());
    match cmd {
        DepCommands::Add { task, depends_on, dep_type } => {
            let task_id = ctx.store.resolve_task_ref(&task, pid)?;
            let depends_on_id = ctx.store.resolve_task_ref(&depends_on, pid)?;
            engine.add_dependency(&task_id, &depends_on_id, parse_dep_type(&dep_type))?;
            ctx.print(&serde_json::json!({"task_id": task_id, "depends_on": depends_on_id, "added": true}));
        }
        DepCommands::Remove { task, depends_on } => {
            let task_id = ctx.store.resolve_task_ref(&task, pid)?;
            let depends_on_id = ctx.store.resolve_task_ref(&depends_on, pid)?;
            ctx.store.tasks().remove_dependency(&task_id, &depends_on_id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            ctx.print(&serde_json::json!({"task_id": task_id, "depends_on": depends_on_id, "removed": true}));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_type_defaults_to_task() {
        assert_eq!(parse_task_type("bug"), TaskType::Bug);
        assert_eq!(parse_task_type("nonsense"), TaskType::Task);
    }

    #[test]
    fn test_parse_dep_type_defaults_to_blocks() {
        assert_eq!(parse_dep_type("related"), DependencyType::Related);
        assert_eq!(parse_dep_type("discovered-from"), DependencyType::DiscoveredFrom);
        assert_eq!(parse_dep_type("nonsense"), DependencyType::Blocks);
    }
}
