//! Conflict resolution escalation for `merge_start`. Tier order per
//! `ops::GitOps::attempt_merge`'s conflict list: a clean merge never reaches
//! this module at all; everything here resolves conflicted hunks with
//! escalating amounts of LLM help before giving up to a human.

use crate::ops::ConflictedFile;
use gobby_llm::{CompletionRequest, LlmProvider, Message};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MergeTier {
    GitAuto,
    ConflictOnlyAi,
    FullFileAi,
    HumanReview,
}

impl fmt::Display for MergeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MergeTier::GitAuto => "git_auto",
            MergeTier::ConflictOnlyAi => "conflict_only_ai",
            MergeTier::FullFileAi => "full_file_ai",
            MergeTier::HumanReview => "human_review",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct ConflictFile {
    pub path: String,
    pub ours: String,
    pub theirs: String,
    pub resolved: Option<String>,
}

#[derive(Debug, Clone)]
pub enum MergeOutcome {
    /// No conflicts at all; the caller's `attempt_merge` already committed.
    Clean,
    /// Every conflicted file was resolved by some tier at or below
    /// `reached_tier`.
    Resolved { reached_tier: MergeTier, files: Vec<ConflictFile> },
    /// Escalated all the way to a human; `files` carries the raw conflict
    /// markers for the review task.
    NeedsHuman { files: Vec<ConflictFile> },
}

pub struct MergeResolution {
    pub outcome: MergeOutcome,
}

/// Looks like resolved source: no leftover conflict markers, and the bytes
/// are valid UTF-8 (checked by the caller constructing the `String`).
fn looks_resolved(content: &str) -> bool {
    !content.contains("<<<<<<<") && !content.contains("=======") && !content.contains(">>>>>>>")
}

fn conflict_only_prompt(path: &str, ours: &str, theirs: &str) -> String {
    format!(
        "Resolve this git merge conflict in `{path}`. Output ONLY the resolved file content for the conflicted region, with no markers and no explanation.\n\n--- ours ---\n{ours}\n--- theirs ---\n{theirs}\n"
    )
}

fn full_file_prompt(path: &str, base: &str, ours: &str, theirs: &str) -> String {
    format!(
        "Resolve this git merge conflict by producing the full merged content of `{path}`. Output ONLY the file content, no markers, no explanation.\n\n--- base ---\n{base}\n--- ours ---\n{ours}\n--- theirs ---\n{theirs}\n"
    )
}

async fn ask_llm(provider: &dyn LlmProvider, prompt: String) -> Option<String> {
    let request = CompletionRequest {
        messages: vec![
            Message::system("You resolve git merge conflicts. Respond with only the resolved source, never markdown fences or commentary."),
            Message::user(prompt),
        ],
        tools: vec![],
        model: None,
        max_tokens: None,
        temperature: Some(0.0),
    };
    match provider.complete(request).await {
        Ok(response) => response.text,
        Err(error) => {
            tracing::warn!(%error, "merge resolution completion failed");
            None
        }
    }
}

/// Escalate through `conflict_only_ai` then `full_file_ai` for every
/// conflicted file; any file that fails both drops the whole merge to
/// `human_review` so reviewers see the conflicted set together.
pub async fn resolve_merge(conflicts: Vec<ConflictedFile>, provider: &dyn LlmProvider) -> MergeResolution {
    if conflicts.is_empty() {
        return MergeResolution { outcome: MergeOutcome::Clean };
    }

    let mut resolved = Vec::with_capacity(conflicts.len());
    let mut highest_tier = MergeTier::ConflictOnlyAi;
    let mut any_unresolved = false;

    for conflict in conflicts {
        let conflict_only = ask_llm(provider, conflict_only_prompt(&conflict.path, &conflict.ours, &conflict.theirs)).await;
        if let Some(candidate) = conflict_only.filter(|c| looks_resolved(c)) {
            resolved.push(ConflictFile { path: conflict.path, ours: conflict.ours, theirs: conflict.theirs, resolved: Some(candidate) });
            continue;
        }

        highest_tier = MergeTier::FullFileAi;
        let full_file = ask_llm(provider, full_file_prompt(&conflict.path, "", &conflict.ours, &conflict.theirs)).await;
        if let Some(candidate) = full_file.filter(|c| looks_resolved(c)) {
            resolved.push(ConflictFile { path: conflict.path, ours: conflict.ours, theirs: conflict.theirs, resolved: Some(candidate) });
            continue;
        }

        any_unresolved = true;
        resolved.push(ConflictFile { path: conflict.path, ours: conflict.ours, theirs: conflict.theirs, resolved: None });
    }

    if any_unresolved {
        MergeResolution { outcome: MergeOutcome::NeedsHuman { files: resolved } }
    } else {
        MergeResolution { outcome: MergeOutcome::Resolved { reached_tier: highest_tier, files: resolved } }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gobby_core::GobbyError;
    use gobby_llm::{CompletionResponse, StopReason};

    struct EchoProvider {
        answer: String,
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn complete(&self, _req: CompletionRequest) -> Result<CompletionResponse, GobbyError> {
            Ok(CompletionResponse { text: Some(self.answer.clone()), tool_calls: vec![], stop_reason: StopReason::EndTurn })
        }
        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_resolve_merge_empty_is_clean() {
        let provider = EchoProvider { answer: "resolved".into() };
        let resolution = resolve_merge(vec![], &provider).await;
        assert!(matches!(resolution.outcome, MergeOutcome::Clean));
    }

    #[tokio::test]
    async fn test_conflict_only_tier_succeeds_when_response_has_no_markers() {
        let provider = EchoProvider { answer: "fn main() {}".into() };
        let conflicts = vec![ConflictedFile { path: "main.rs".into(), ours: "a".into(), theirs: "b".into() }];
        let resolution = resolve_merge(conflicts, &provider).await;
        match resolution.outcome {
            MergeOutcome::Resolved { reached_tier, files } => {
                assert_eq!(reached_tier, MergeTier::ConflictOnlyAi);
                assert_eq!(files[0].resolved.as_deref(), Some("fn main() {}"));
            }
            other => panic!("expected Resolved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_all_tiers_failing_escalates_to_human() {
        let provider = EchoProvider { answer: "<<<<<<< still broken".into() };
        let conflicts = vec![ConflictedFile { path: "main.rs".into(), ours: "a".into(), theirs: "b".into() }];
        let resolution = resolve_merge(conflicts, &provider).await;
        assert!(matches!(resolution.outcome, MergeOutcome::NeedsHuman { .. }));
    }
}
