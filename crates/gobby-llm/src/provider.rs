//! The capability trait every model backend implements. Callers (the
//! validation loop, task expansion, the in-process agent executor, summary
//! generation) depend only on this trait, never on a concrete provider.

use crate::types::{CompletionRequest, CompletionResponse};
use async_trait::async_trait;
use gobby_core::GobbyError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one completion turn. A request with `tools` set may return
    /// `stop_reason = tool_use`; the caller executes the calls and feeds
    /// their results back as `Message::role = Tool` in the next request.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, GobbyError>;

    /// The provider name as it appears in `AgentRun.provider` and config.
    fn name(&self) -> &str;
}
