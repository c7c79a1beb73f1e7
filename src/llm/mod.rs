//! LLM client abstraction.
//!
//! The agent talks to the model through [`LlmClient`]; the production
//! implementation is [`OpenAiClient`], which streams Chat Completions over
//! server-sent events.

mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::{OpenAiClient, SearchAnswer, UrlSource};

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A chat message in provider wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant turn, optionally carrying tool calls.
    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function name plus raw JSON arguments, as the provider sends them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Tool schema advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// How hard a reasoning-capable model should think.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

/// Amount of retrieved web context the hosted search may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchContextSize {
    Low,
    Medium,
    High,
}

/// Everything needed for one model call.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub reasoning_effort: Option<ReasoningEffort>,
    /// System instructions for this call only.
    pub instructions: &'a str,
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolSchema],
}

/// Incremental output surfaced while a completion streams.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionDelta {
    Text(String),
    Reasoning(String),
}

/// A finished model call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Sink for streamed deltas.
pub type DeltaSink<'a> = &'a (dyn Fn(CompletionDelta) + Send + Sync);

/// Chat completion with tool calling.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion, reporting deltas as they arrive and returning the
    /// assembled result.
    async fn complete(
        &self,
        request: CompletionRequest<'_>,
        on_delta: DeltaSink<'_>,
    ) -> anyhow::Result<Completion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_without_tool_calls_omits_field() {
        let msg = ChatMessage::assistant(Some("hi".into()), vec![]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "assistant");
        assert!(value.get("tool_calls").is_none());
    }

    #[test]
    fn tool_call_serializes_in_provider_shape() {
        let call = ToolCall::new("call_1", "generate_sketch", "{}");
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "generate_sketch");
        assert_eq!(value["function"]["arguments"], "{}");
    }
}
