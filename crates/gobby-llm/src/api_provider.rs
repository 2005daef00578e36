//! A generic OpenAI-chat-completions-shaped provider. Works against any
//! endpoint exposing that wire format (the common denominator across most
//! hosted and self-hosted model servers).

use crate::provider::LlmProvider;
use crate::types::{CompletionRequest, CompletionResponse, MessageRole, StopReason, ToolCall};
use async_trait::async_trait;
use gobby_core::GobbyError;
use serde_json::{json, Value};

pub struct ApiProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl ApiProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    fn role_str(role: &MessageRole) -> &'static str {
        match role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

#[async_trait]
impl LlmProvider for ApiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, GobbyError> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({"role": Self::role_str(&m.role), "content": m.content}))
            .collect();
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {"name": t.name, "description": t.description, "parameters": t.parameters}
                })
            })
            .collect();

        let mut body = json!({"model": model, "messages": messages});
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GobbyError::ProviderError(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GobbyError::ProviderError(e.to_string()))?;
        if !status.is_success() {
            return Err(GobbyError::ProviderError(format!("{} request failed: {status} {text}", self.name)));
        }
        parse_completion(&text)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn parse_completion(body: &str) -> Result<CompletionResponse, GobbyError> {
    let parsed: Value = serde_json::from_str(body).map_err(|e| GobbyError::ProviderError(e.to_string()))?;
    let choice = parsed["choices"].get(0).ok_or_else(|| GobbyError::ProviderError("empty choices".into()))?;
    let message = &choice["message"];
    let text = message["content"].as_str().map(String::from);

    let tool_calls: Vec<ToolCall> = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|c| {
                    let id = c["id"].as_str()?.to_string();
                    let name = c["function"]["name"].as_str()?.to_string();
                    let args_raw = c["function"]["arguments"].as_str().unwrap_or("{}");
                    let arguments = serde_json::from_str(args_raw).unwrap_or(Value::Null);
                    Some(ToolCall { id, name, arguments })
                })
                .collect()
        })
        .unwrap_or_default();

    let stop_reason = if !tool_calls.is_empty() {
        StopReason::ToolUse
    } else {
        match choice["finish_reason"].as_str() {
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        }
    };

    Ok(CompletionResponse { text, tool_calls, stop_reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion_text() {
        let body = r#"{"choices":[{"message":{"content":"hello"},"finish_reason":"stop"}]}"#;
        let resp = parse_completion(body).unwrap();
        assert_eq!(resp.text.as_deref(), Some("hello"));
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
    }

    #[test]
    fn test_parse_completion_tool_call() {
        let body = r#"{"choices":[{"message":{"content":null,"tool_calls":[
            {"id":"c1","function":{"name":"create_task","arguments":"{\"title\":\"x\"}"}}
        ]},"finish_reason":"tool_calls"}]}"#;
        let resp = parse_completion(body).unwrap();
        assert_eq!(resp.stop_reason, StopReason::ToolUse);
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "create_task");
    }
}
