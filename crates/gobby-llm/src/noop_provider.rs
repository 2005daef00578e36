//! A provider that never calls out, for tests and for `gobby status` style
//! commands that must not require credentials to run.

use crate::provider::LlmProvider;
use crate::types::{CompletionRequest, CompletionResponse, StopReason};
use async_trait::async_trait;
use gobby_core::GobbyError;

#[derive(Default)]
pub struct NoopProvider;

#[async_trait]
impl LlmProvider for NoopProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, GobbyError> {
        Ok(CompletionResponse { text: Some(String::new()), tool_calls: Vec::new(), stop_reason: StopReason::EndTurn })
    }

    fn name(&self) -> &str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_returns_empty_text() {
        let provider = NoopProvider;
        let resp = provider.complete(CompletionRequest::default()).await.unwrap();
        assert_eq!(resp.text.as_deref(), Some(""));
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
    }
}
