//! OpenAI-compatible chat-completion backend.
//!
//! Works with OpenAI, OpenRouter, Groq, Ollama and any other provider that
//! implements the chat completions API.

use crate::model::{AssistantTurn, FinishReason, ModelClient};
use ensemble_core::{EnsembleError, EnsembleResult, Message, Role, ToolCall, ToolSpecification};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Connection settings for an OpenAI-compatible provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier, e.g. `gpt-4o-mini`.
    pub model_id: String,

    /// Bearer token sent with every request.
    #[serde(default)]
    pub api_key: String,

    /// Provider base URL; `/v1/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sampling temperature; omitted from the request when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Completion token budget per request (default: 4096).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

impl ModelConfig {
    /// Creates a config for the given model with default settings.
    pub fn new(model_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            api_key: api_key.into(),
            base_url: default_base_url(),
            temperature: None,
            max_tokens: default_max_tokens(),
        }
    }

    /// Points the backend at a different provider base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Non-streaming chat-completion client for OpenAI-compatible APIs.
pub struct OpenAiModel {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiModel {
    /// Creates a client from the given config.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_messages(&self, messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::System => serde_json::json!({
                    "role": "system",
                    "content": m.content,
                }),
                Role::User => serde_json::json!({
                    "role": "user",
                    "content": m.content,
                }),
                Role::Assistant if !m.tool_calls.is_empty() => serde_json::json!({
                    "role": "assistant",
                    "content": m.content,
                    "tool_calls": m.tool_calls.iter().map(|tc| {
                        serde_json::json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments.to_string(),
                            }
                        })
                    }).collect::<Vec<_>>(),
                }),
                Role::Assistant => serde_json::json!({
                    "role": "assistant",
                    "content": m.content,
                }),
                Role::Tool => serde_json::json!({
                    "role": "tool",
                    "tool_call_id": m.tool_call_id,
                    "content": m.content,
                }),
            })
            .collect()
    }

    fn build_tools(&self, tools: &[ToolSpecification]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.to_json_schema(),
                    }
                })
            })
            .collect()
    }
}

#[async_trait]
impl ModelClient for OpenAiModel {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSpecification],
    ) -> EnsembleResult<AssistantTurn> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "messages": self.build_messages(messages),
        });
        if let Some(temperature) = self.config.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if !tools.is_empty() {
            body["tools"] = serde_json::json!(self.build_tools(tools));
        }

        debug!(model = %self.config.model_id, tools = tools.len(), "Chat completion request");

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EnsembleError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EnsembleError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(EnsembleError::Http(format!(
                "chat completions API error {status}: {resp_body}"
            )));
        }

        parse_turn(&resp_body)
    }
}

/// Parses one chat-completion response body into an assistant turn.
pub fn parse_turn(body: &serde_json::Value) -> EnsembleResult<AssistantTurn> {
    let choice = body
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| EnsembleError::Model("response carries no choices".into()))?;
    let message = &choice["message"];

    let content = message["content"].as_str().unwrap_or_default().to_string();

    let tool_calls: Vec<ToolCall> = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|tc| {
                    let id = tc["id"].as_str()?;
                    let name = tc["function"]["name"].as_str()?;
                    // Arguments arrive as a JSON-encoded string on the wire.
                    let arguments = tc["function"]["arguments"]
                        .as_str()
                        .and_then(|raw| serde_json::from_str(raw).ok())
                        .unwrap_or(serde_json::Value::Null);
                    Some(ToolCall::new(id, name, arguments))
                })
                .collect()
        })
        .unwrap_or_default();

    let finish_reason = match choice["finish_reason"].as_str() {
        Some(reason) => FinishReason::from_wire(reason),
        None if tool_calls.is_empty() => FinishReason::Stop,
        None => FinishReason::ToolCalls,
    };

    Ok(AssistantTurn {
        content,
        tool_calls,
        finish_reason,
    })
}
