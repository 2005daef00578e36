//! The LLMProvider contract: a narrow trait any model backend implements,
//! so the task validator, expansion agent, and in-process executor depend
//! on a capability, not a vendor SDK.

pub mod api_provider;
pub mod noop_provider;
pub mod provider;
pub mod types;

pub use api_provider::ApiProvider;
pub use noop_provider::NoopProvider;
pub use provider::LlmProvider;
pub use types::{CompletionRequest, CompletionResponse, Message, MessageRole, StopReason, ToolCall, ToolSchema};
