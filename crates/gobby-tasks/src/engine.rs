//! Task graph operations and the work-selection policy. Wraps a `Store`
//! and adds the semantics the raw CRUD in `gobby-store` doesn't know
//! about: cycle checks, the close/review/validate lifecycle, and expansion.

use crate::graph::DependencyGraph;
use gobby_core::{DaemonConfig, DependencyType, GobbyError, TaskStatus, TaskType};
use gobby_git::GitOps;
use gobby_llm::{CompletionRequest, LlmProvider, Message};
use gobby_store::models::Task;
use gobby_store::Store;
use std::path::Path;
use std::sync::Arc;

pub struct TaskEngine {
    store: Store,
    config: DaemonConfig,
    llm: Arc<dyn LlmProvider>,
}

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub feedback: Option<String>,
    pub fail_count: u32,
    pub task_failed: bool,
    pub fix_subtask_id: Option<String>,
}

impl TaskEngine {
    pub fn new(store: Store, config: DaemonConfig, llm: Arc<dyn LlmProvider>) -> Self {
        Self { store, config, llm }
    }

    fn blocks_graph(&self, project_id: &str) -> Result<DependencyGraph, GobbyError> {
        let edges = self
            .store
            .tasks()
            .list_dependencies_for_project(project_id)
            .map_err(|e| GobbyError::Internal(e.to_string()))?
            .into_iter()
            .filter(|(_, _, dep)| dep.dep_type == DependencyType::Blocks)
            .map(|(task_id, depends_on, _)| (task_id, depends_on))
            .collect::<Vec<_>>();
        Ok(DependencyGraph::from_edges(edges))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_task(
        &self,
        project_id: &str,
        parent_task_id: Option<&str>,
        title: &str,
        description: &str,
        details: Option<&str>,
        test_strategy: Option<&str>,
        priority: u8,
        task_type: TaskType,
        labels: Vec<String>,
        validation_criteria: Option<&str>,
        blocks: &[String],
    ) -> Result<Task, GobbyError> {
        let tasks = self.store.tasks();
        for dep in blocks {
            tasks
                .get(dep)
                .map_err(|e| GobbyError::Internal(e.to_string()))?
                .ok_or_else(|| GobbyError::not_found("task", dep))?;
        }

        let task = tasks
            .create(project_id, parent_task_id, title, description, details, test_strategy, priority, task_type, labels, validation_criteria)
            .map_err(|e| GobbyError::Internal(e.to_string()))?;

        let graph = self.blocks_graph(project_id)?;
        for dep in blocks {
            if graph.would_cycle(&task.id, dep) {
                tasks.delete_hard(&task.id).map_err(|e| GobbyError::Internal(e.to_string()))?;
                return Err(GobbyError::cycle(format!("{} -> {}", task.id, dep)));
            }
        }
        for dep in blocks {
            tasks
                .add_dependency(&task.id, dep, DependencyType::Blocks)
                .map_err(|e| GobbyError::Internal(e.to_string()))?;
        }
        Ok(task)
    }

    pub fn add_dependency(&self, task_id: &str, depends_on: &str, dep_type: DependencyType) -> Result<(), GobbyError> {
        if task_id == depends_on {
            return Err(GobbyError::ConstraintViolation("a task cannot depend on itself".into()));
        }
        let tasks = self.store.tasks();
        let task = tasks.get(task_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("task", task_id))?;
        tasks.get(depends_on).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("task", depends_on))?;

        if dep_type == DependencyType::Blocks {
            let graph = self.blocks_graph(&task.project_id)?;
            if graph.would_cycle(task_id, depends_on) {
                return Err(GobbyError::cycle(format!("{task_id} -> {depends_on}")));
            }
        }
        tasks.add_dependency(task_id, depends_on, dep_type).map_err(|e| GobbyError::Internal(e.to_string()))
    }

    /// A task is ready iff it is open and every `blocks` dependency is
    /// completed. Ordered by priority asc, then created_at asc.
    pub fn list_ready_tasks(&self, project_id: &str) -> Result<Vec<Task>, GobbyError> {
        let tasks = self.store.tasks();
        let open = tasks.list_open_by_project(project_id).map_err(|e| GobbyError::Internal(e.to_string()))?;
        let mut ready = Vec::new();
        for task in open {
            let deps = tasks.dependencies_of(&task.id).map_err(|e| GobbyError::Internal(e.to_string()))?;
            let mut blocked = false;
            for (dep_id, dep) in &deps {
                if dep.dep_type != DependencyType::Blocks {
                    continue;
                }
                let dep_task = tasks.get(dep_id).map_err(|e| GobbyError::Internal(e.to_string()))?;
                if dep_task.map(|t| t.status != TaskStatus::Completed).unwrap_or(true) {
                    blocked = true;
                    break;
                }
            }
            // A parent is blocked by every non-completed child.
            if !blocked {
                let children = tasks.list_by_project(project_id).map_err(|e| GobbyError::Internal(e.to_string()))?;
                blocked = children
                    .iter()
                    .any(|c| c.parent_task_id.as_deref() == Some(task.id.as_str()) && c.status != TaskStatus::Completed);
            }
            if !blocked {
                ready.push(task);
            }
        }
        ready.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
        Ok(ready)
    }

    /// `force_complete` skips the review detour regardless of caller depth.
    pub fn close_task(&self, task_id: &str, session_agent_depth: u32, commit_sha: Option<&str>, session_id: &str, force_complete: bool) -> Result<TaskStatus, GobbyError> {
        let tasks = self.store.tasks();
        let task = tasks.get(task_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("task", task_id))?;

        if let Some(sha) = commit_sha {
            tasks.append_commit(task_id, sha).map_err(|e| GobbyError::Internal(e.to_string()))?;
        }

        if session_agent_depth > 0 && !force_complete {
            tasks.set_status(task_id, TaskStatus::Review).map_err(|e| GobbyError::Internal(e.to_string()))?;
            return Ok(TaskStatus::Review);
        }

        if task.validation_criteria.is_some() {
            // Validation happens out-of-band via `validate_task`; closing here
            // without a prior pass leaves status untouched per the spec's
            // "validation loop errors do not automatically close tasks" rule.
            if task.validation_status.as_deref() != Some("passed") {
                return Err(GobbyError::ConstraintViolation("task has unmet validation_criteria; call validate_task first".into()));
            }
        }

        tasks.close(task_id, session_id, commit_sha).map_err(|e| GobbyError::Internal(e.to_string()))?;
        Ok(TaskStatus::Completed)
    }

    pub fn reopen_task(&self, task_id: &str) -> Result<(), GobbyError> {
        let tasks = self.store.tasks();
        let task = tasks.get(task_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("task", task_id))?;
        if !matches!(task.status, TaskStatus::Review | TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Escalated) {
            return Err(GobbyError::ConstraintViolation(format!("cannot reopen task in status {:?}", task.status)));
        }
        tasks.reopen(task_id).map_err(|e| GobbyError::Internal(e.to_string()))
    }

    /// Move a task out of the normal flow into `Escalated` — e.g. an agent
    /// hit something it can't resolve itself. Only an open task can be
    /// escalated; [`Self::reopen_task`] is the way back to `Pending`.
    pub fn escalate_task(&self, task_id: &str, reason: &str) -> Result<(), GobbyError> {
        let tasks = self.store.tasks();
        let task = tasks.get(task_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("task", task_id))?;
        if !task.status.is_open() {
            return Err(GobbyError::ConstraintViolation(format!("cannot escalate task in status {:?}", task.status)));
        }
        tracing::warn!(task_id, reason, "task escalated");
        tasks.set_status(task_id, TaskStatus::Escalated).map_err(|e| GobbyError::Internal(e.to_string()))
    }

    /// Run the validation loop: ask the provider whether `validation_criteria`
    /// is met given the diff and files touched by the task's own recorded
    /// commits, gathered here via `git` rather than trusted from the caller.
    /// Feedback from a failed pass becomes a fix subtask.
    pub async fn validate_task(&self, task_id: &str, git: &dyn GitOps) -> Result<ValidationOutcome, GobbyError> {
        let tasks = self.store.tasks();
        let task = tasks.get(task_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("task", task_id))?;
        let criteria = task
            .validation_criteria
            .clone()
            .ok_or_else(|| GobbyError::ConstraintViolation("task has no validation_criteria".into()))?;

        let project = self.store.projects().get(&task.project_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("project", &task.project_id))?;
        let repo_path = Path::new(&project.repo_path);
        let diff = git.diff(repo_path, &task.commits)?;
        let files = git.files_touched(repo_path, &task.commits)?;
        let context = format!("Files touched:\n{}\n\nDiff:\n{diff}", files.join("\n"));

        let prompt = format!(
            "Validation criteria: {criteria}\n\nContext:\n{context}\n\nRespond with strict JSON: {{\"passed\": bool, \"issues\": [string]}}"
        );
        let request = CompletionRequest { messages: vec![Message::system("You are a strict code reviewer."), Message::user(prompt)], ..Default::default() };
        let response = self.llm.complete(request).await?;
        let raw = response.text.unwrap_or_default();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap_or(serde_json::json!({"passed": false, "issues": ["validator returned non-JSON output"]}));
        let passed = parsed["passed"].as_bool().unwrap_or(false);
        let issues: Vec<String> = parsed["issues"].as_array().map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect()).unwrap_or_default();

        if passed {
            return Ok(ValidationOutcome { passed: true, feedback: None, fail_count: task.validation_fail_count, task_failed: false, fix_subtask_id: None });
        }

        let feedback = issues.join("; ");
        let fail_count = tasks.record_validation_failure(task_id, &feedback).map_err(|e| GobbyError::Internal(e.to_string()))?;

        let mut fix_subtask_id = None;
        if self.config.create_fix_subtask {
            let fix = tasks
                .create(&task.project_id, Some(task_id), &format!("Fix: {}", task.title), &feedback, None, None, task.priority, TaskType::Bug, vec![], None)
                .map_err(|e| GobbyError::Internal(e.to_string()))?;
            fix_subtask_id = Some(fix.id);
        }

        let task_failed = fail_count >= self.config.max_validation_fails;
        if task_failed {
            tasks.set_status(task_id, TaskStatus::Failed).map_err(|e| GobbyError::Internal(e.to_string()))?;
        }

        Ok(ValidationOutcome { passed: false, feedback: Some(feedback), fail_count, task_failed, fix_subtask_id })
    }

    /// Ask the provider to propose a subtask breakdown and wire each one
    /// in as `parent_task_id` + `blocks` per its declared dependency
    /// indices. The whole expansion rolls back if it would introduce a
    /// cycle anywhere in the project's `blocks` graph.
    pub async fn expand_task(&self, task_id: &str, strategy: Option<&str>, max_subtasks: Option<u32>) -> Result<Vec<Task>, GobbyError> {
        let tasks = self.store.tasks();
        let task = tasks.get(task_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("task", task_id))?;
        let strategy = strategy.unwrap_or("sequential");
        let limit = max_subtasks.unwrap_or(8);

        let prompt = format!(
            "Break the following task into at most {limit} subtasks using a {strategy} strategy.\n\
             Title: {}\nDescription: {}\n\
             Respond with strict JSON: {{\"subtasks\": [{{\"title\": string, \"description\": string, \"blocks_index\": [int]}}]}}\n\
             `blocks_index` lists indices (0-based, into this same array) of sibling subtasks this one is blocked by.",
            task.title, task.description
        );
        let request = CompletionRequest { messages: vec![Message::system("You split work into an ordered, dependency-aware subtask list."), Message::user(prompt)], ..Default::default() };
        let response = self.llm.complete(request).await?;
        let raw = response.text.unwrap_or_default();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap_or(serde_json::json!({"subtasks": []}));
        let proposals = parsed["subtasks"].as_array().cloned().unwrap_or_default();

        let mut created = Vec::new();
        for proposal in proposals.iter().take(limit as usize) {
            let title = proposal["title"].as_str().unwrap_or("untitled subtask");
            let description = proposal["description"].as_str().unwrap_or("");
            let subtask = tasks
                .create(&task.project_id, Some(task_id), title, description, None, None, task.priority, TaskType::Task, vec![], None)
                .map_err(|e| GobbyError::Internal(e.to_string()))?;
            created.push(subtask);
        }

        for (i, proposal) in proposals.iter().take(created.len()).enumerate() {
            let blocks_index = proposal["blocks_index"].as_array().cloned().unwrap_or_default();
            for idx in blocks_index {
                if let Some(j) = idx.as_u64().map(|n| n as usize) {
                    if let Some(dep) = created.get(j) {
                        if let Err(e) = self.add_dependency(&created[i].id, &dep.id, DependencyType::Blocks) {
                            for t in &created {
                                tasks.delete_hard(&t.id).ok();
                            }
                            return Err(e);
                        }
                    }
                }
            }
        }
        Ok(created)
    }

    /// Replace a task's `description` with an LLM summary once it has been
    /// closed for long enough; title and id are preserved.
    pub async fn compact_task(&self, task_id: &str) -> Result<(), GobbyError> {
        let tasks = self.store.tasks();
        let task = tasks.get(task_id).map_err(|e| GobbyError::Internal(e.to_string()))?.ok_or_else(|| GobbyError::not_found("task", task_id))?;
        if !task.status.is_terminal() {
            return Err(GobbyError::ConstraintViolation("only terminal tasks may be compacted".into()));
        }
        let prompt = format!("Summarize this closed task in one paragraph, preserving anything a future reader needs:\n{}\n{}", task.title, task.description);
        let request = CompletionRequest { messages: vec![Message::user(prompt)], ..Default::default() };
        let response = self.llm.complete(request).await?;
        let summary = response.text.unwrap_or_else(|| task.description.clone());
        tasks.compact(task_id, &summary).map_err(|e| GobbyError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gobby_git::MergeAttempt;
    use gobby_llm::NoopProvider;

    /// `validate_task`'s own tests never need real git state; this stub
    /// returns fixed diff/files and panics if anything else is called.
    struct StubGitOps {
        diff: String,
        files: Vec<String>,
    }

    impl GitOps for StubGitOps {
        fn create_worktree(&self, _: &Path, _: &Path, _: &str, _: &str) -> Result<(), GobbyError> { unimplemented!() }
        fn remove_worktree(&self, _: &Path, _: &Path) -> Result<(), GobbyError> { unimplemented!() }
        fn shallow_clone(&self, _: &str, _: &str, _: &str, _: &Path) -> Result<(), GobbyError> { unimplemented!() }
        fn resolve_remote_url(&self, _: &Path) -> Result<String, GobbyError> { unimplemented!() }
        fn commit_all(&self, _: &Path, _: &str) -> Result<Option<String>, GobbyError> { unimplemented!() }
        fn push(&self, _: &Path, _: &str) -> Result<(), GobbyError> { unimplemented!() }
        fn fetch_branch(&self, _: &Path, _: &str) -> Result<(), GobbyError> { unimplemented!() }
        fn diff(&self, _: &Path, _: &[String]) -> Result<String, GobbyError> { Ok(self.diff.clone()) }
        fn files_touched(&self, _: &Path, _: &[String]) -> Result<Vec<String>, GobbyError> { Ok(self.files.clone()) }
        fn attempt_merge(&self, _: &Path, _: &str, _: &str) -> Result<MergeAttempt, GobbyError> { unimplemented!() }
        fn abort_merge(&self, _: &Path) -> Result<(), GobbyError> { unimplemented!() }
    }

    fn setup() -> (TaskEngine, String) {
        let store = Store::open_in_memory().unwrap();
        let project = store.projects().create("demo", "/tmp", "main").unwrap();
        let engine = TaskEngine::new(store, DaemonConfig::default(), Arc::new(NoopProvider));
        (engine, project.id)
    }

    #[test]
    fn test_ready_work_dag_scenario() {
        let (engine, pid) = setup();
        let t1 = engine.create_task(&pid, None, "T1", "", None, None, 2, TaskType::Task, vec![], None, &[]).unwrap();
        let t2 = engine.create_task(&pid, None, "T2", "", None, None, 2, TaskType::Task, vec![], None, &[t1.id.clone()]).unwrap();
        let t3 = engine.create_task(&pid, None, "T3", "", None, None, 2, TaskType::Task, vec![], None, &[t2.id.clone()]).unwrap();

        let ready = engine.list_ready_tasks(&pid).unwrap();
        assert_eq!(ready.iter().map(|t| t.id.clone()).collect::<Vec<_>>(), vec![t1.id.clone()]);

        engine.close_task(&t1.id, 0, None, "sess-1", true).unwrap();
        let ready = engine.list_ready_tasks(&pid).unwrap();
        assert_eq!(ready.iter().map(|t| t.id.clone()).collect::<Vec<_>>(), vec![t2.id.clone()]);

        engine.close_task(&t2.id, 0, None, "sess-1", true).unwrap();
        let ready = engine.list_ready_tasks(&pid).unwrap();
        assert_eq!(ready.iter().map(|t| t.id.clone()).collect::<Vec<_>>(), vec![t3.id.clone()]);

        let err = engine.add_dependency(&t1.id, &t3.id, DependencyType::Blocks).unwrap_err();
        assert!(matches!(err, GobbyError::ConstraintViolation(_)));
    }

    #[test]
    fn test_close_from_depth_zero_completes_directly() {
        let (engine, pid) = setup();
        let t = engine.create_task(&pid, None, "T1", "", None, None, 2, TaskType::Task, vec![], None, &[]).unwrap();
        let status = engine.close_task(&t.id, 0, Some("abc"), "sess-1", false).unwrap();
        assert_eq!(status, TaskStatus::Completed);
    }

    #[test]
    fn test_close_from_subagent_enters_review() {
        let (engine, pid) = setup();
        let t = engine.create_task(&pid, None, "T1", "", None, None, 2, TaskType::Task, vec![], None, &[]).unwrap();
        let status = engine.close_task(&t.id, 1, None, "sess-1", false).unwrap();
        assert_eq!(status, TaskStatus::Review);
    }

    #[test]
    fn test_create_task_with_missing_dependency_fails() {
        let (engine, pid) = setup();
        let err = engine
            .create_task(&pid, None, "T1", "", None, None, 2, TaskType::Task, vec![], None, &["gt-zzzzzz".to_string()])
            .unwrap_err();
        assert!(matches!(err, GobbyError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_validate_task_without_criteria_errors() {
        let (engine, pid) = setup();
        let t = engine.create_task(&pid, None, "T1", "", None, None, 2, TaskType::Task, vec![], None, &[]).unwrap();
        let git = StubGitOps { diff: String::new(), files: vec![] };
        let err = engine.validate_task(&t.id, &git).await.unwrap_err();
        assert!(matches!(err, GobbyError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_validate_task_feeds_diff_and_files_touched_to_the_provider() {
        struct CapturingProvider {
            last_prompt: std::sync::Mutex<Option<String>>,
        }

        #[async_trait::async_trait]
        impl LlmProvider for CapturingProvider {
            async fn complete(&self, request: CompletionRequest) -> Result<gobby_llm::CompletionResponse, GobbyError> {
                *self.last_prompt.lock().unwrap() = request.messages.last().map(|m| m.content.clone());
                Ok(gobby_llm::CompletionResponse { text: Some(r#"{"passed": true, "issues": []}"#.to_string()), tool_calls: vec![], stop_reason: gobby_llm::StopReason::EndTurn })
            }
            fn name(&self) -> &str { "capturing" }
        }

        let store = Store::open_in_memory().unwrap();
        let project = store.projects().create("demo", "/tmp", "main").unwrap();
        let provider = Arc::new(CapturingProvider { last_prompt: std::sync::Mutex::new(None) });
        let engine = TaskEngine::new(store, DaemonConfig::default(), provider.clone());
        let t = engine
            .create_task(&project.id, None, "T1", "", None, None, 2, TaskType::Task, vec![], Some("tests must pass"), &[])
            .unwrap();

        let git = StubGitOps { diff: "+added a line".to_string(), files: vec!["src/lib.rs".to_string()] };
        let outcome = engine.validate_task(&t.id, &git).await.unwrap();

        assert!(outcome.passed);
        let prompt = provider.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("src/lib.rs"));
        assert!(prompt.contains("+added a line"));
    }

    #[test]
    fn test_reopen_rejects_non_terminal_status() {
        let (engine, pid) = setup();
        let t = engine.create_task(&pid, None, "T1", "", None, None, 2, TaskType::Task, vec![], None, &[]).unwrap();
        let err = engine.reopen_task(&t.id).unwrap_err();
        assert!(matches!(err, GobbyError::ConstraintViolation(_)));
    }

    #[test]
    fn test_escalate_then_reopen_round_trips_to_pending() {
        let (engine, pid) = setup();
        let t = engine.create_task(&pid, None, "T1", "", None, None, 2, TaskType::Task, vec![], None, &[]).unwrap();
        engine.escalate_task(&t.id, "blocked on missing credentials").unwrap();
        let escalated = engine.store.tasks().get(&t.id).unwrap().unwrap();
        assert_eq!(escalated.status, TaskStatus::Escalated);

        let err = engine.escalate_task(&t.id, "again").unwrap_err();
        assert!(matches!(err, GobbyError::ConstraintViolation(_)));

        engine.reopen_task(&t.id).unwrap();
        let reopened = engine.store.tasks().get(&t.id).unwrap().unwrap();
        assert_eq!(reopened.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_expand_task_with_noop_provider_creates_nothing() {
        let (engine, pid) = setup();
        let t = engine.create_task(&pid, None, "Epic", "big feature", None, None, 2, TaskType::Epic, vec![], None, &[]).unwrap();
        let subtasks = engine.expand_task(&t.id, Some("sequential"), Some(5)).await.unwrap();
        assert!(subtasks.is_empty());
    }

    #[tokio::test]
    async fn test_compact_task_requires_terminal_status() {
        let (engine, pid) = setup();
        let t = engine.create_task(&pid, None, "T1", "desc", None, None, 2, TaskType::Task, vec![], None, &[]).unwrap();
        let err = engine.compact_task(&t.id).await.unwrap_err();
        assert!(matches!(err, GobbyError::ConstraintViolation(_)));

        engine.close_task(&t.id, 0, None, "sess-1", true).unwrap();
        engine.compact_task(&t.id).await.unwrap();
    }
}
