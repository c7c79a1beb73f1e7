//! OpenAI Chat Completions client.

use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{retry::Never, Event, EventSource};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    ChatMessage, Completion, CompletionDelta, CompletionRequest, DeltaSink, LlmClient,
    SearchContextSize, TokenUsage, ToolCall,
};

/// Streaming Chat Completions client. Build once and share; cloning the
/// inner `reqwest::Client` reuses its connection pool.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Answer from the hosted web search, with the pages it cited.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchAnswer {
    pub answer: String,
    pub sources: Vec<UrlSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlSource {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: &str, http: reqwest::Client) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Ask a search-enabled model and collect its URL citations.
    pub async fn web_search(
        &self,
        model: &str,
        query: &str,
        context_size: SearchContextSize,
    ) -> anyhow::Result<SearchAnswer> {
        let body = json!({
            "model": model,
            "messages": [ChatMessage::user(query)],
            "web_search_options": { "search_context_size": context_size },
        });

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("web search request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI web search error ({}): {}", status, text);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .context("Failed to parse web search response")?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .context("web search returned no choices")?
            .message;

        let mut sources: Vec<UrlSource> = Vec::new();
        for annotation in message.annotations.unwrap_or_default() {
            if let Some(citation) = annotation.url_citation {
                if !sources.iter().any(|s| s.url == citation.url) {
                    sources.push(citation);
                }
            }
        }

        Ok(SearchAnswer {
            answer: message.content.unwrap_or_default(),
            sources,
        })
    }
}

/// Only reasoning models accept `reasoning_effort`; others reject the request.
fn supports_reasoning(model: &str) -> bool {
    ["o1", "o3", "o4", "gpt-5"]
        .iter()
        .any(|prefix| model.starts_with(prefix))
}

fn request_body(request: &CompletionRequest<'_>) -> serde_json::Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(ChatMessage::system(request.instructions));
    messages.extend(request.messages.iter().cloned());

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "stream": true,
        "stream_options": { "include_usage": true },
    });

    if !request.tools.is_empty() {
        body["tools"] = json!(request.tools);
        body["tool_choice"] = json!("auto");
    }

    if let Some(effort) = request.reasoning_effort {
        if supports_reasoning(request.model) {
            body["reasoning_effort"] = json!(effort);
        }
    }

    body
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        request: CompletionRequest<'_>,
        on_delta: DeltaSink<'_>,
    ) -> anyhow::Result<Completion> {
        let body = request_body(&request);
        let builder = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body);

        let mut source = EventSource::new(builder).context("Failed to open completion stream")?;
        source.set_retry_policy(Box::new(Never));

        let mut acc = StreamAccumulator::default();

        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => {
                    tracing::trace!(model = request.model, "completion stream opened");
                }
                Ok(Event::Message(message)) => {
                    if message.data.trim() == "[DONE]" {
                        break;
                    }
                    let chunk: StreamChunk = serde_json::from_str(&message.data)
                        .with_context(|| format!("Malformed completion chunk: {}", message.data))?;
                    acc.apply(chunk, on_delta);
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    source.close();
                    let text = response.text().await.unwrap_or_default();
                    anyhow::bail!("OpenAI API error ({}): {}", status, text);
                }
                Err(e) => {
                    source.close();
                    return Err(anyhow::anyhow!("Completion stream failed: {}", e));
                }
            }
        }
        source.close();

        Ok(acc.finish())
    }
}

// OpenAI streaming types
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

// Web search response types
#[derive(Debug, Deserialize)]
struct SearchResponse {
    choices: Vec<SearchChoice>,
}

#[derive(Debug, Deserialize)]
struct SearchChoice {
    message: SearchMessage,
}

#[derive(Debug, Deserialize)]
struct SearchMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    annotations: Option<Vec<Annotation>>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(default)]
    url_citation: Option<UrlSource>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Reassembles streamed chunks into a [`Completion`].
#[derive(Debug, Default)]
struct StreamAccumulator {
    content: String,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    finish_reason: Option<String>,
    usage: Option<TokenUsage>,
}

impl StreamAccumulator {
    fn apply(&mut self, chunk: StreamChunk, on_delta: DeltaSink<'_>) {
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        for choice in chunk.choices {
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
            let Some(delta) = choice.delta else {
                continue;
            };

            if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
                on_delta(CompletionDelta::Reasoning(reasoning));
            }
            if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                self.content.push_str(&text);
                on_delta(CompletionDelta::Text(text));
            }
            for call in delta.tool_calls.unwrap_or_default() {
                let entry = self.tool_calls.entry(call.index).or_default();
                if let Some(id) = call.id {
                    entry.id = id;
                }
                if let Some(function) = call.function {
                    if let Some(name) = function.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        entry.arguments.push_str(&arguments);
                    }
                }
            }
        }
    }

    fn finish(self) -> Completion {
        let tool_calls = self
            .tool_calls
            .into_values()
            .filter(|call| !call.name.is_empty())
            .map(|call| ToolCall::new(call.id, call.name, call.arguments))
            .collect();

        Completion {
            content: if self.content.is_empty() {
                None
            } else {
                Some(self.content)
            },
            tool_calls,
            finish_reason: self.finish_reason,
            usage: self.usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ReasoningEffort, ToolSchema};
    use std::sync::Mutex;

    fn chunk(value: serde_json::Value) -> StreamChunk {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn accumulator_joins_text_and_fragmented_tool_calls() {
        let seen = Mutex::new(Vec::new());
        let sink = |d: CompletionDelta| seen.lock().unwrap().push(d);
        let mut acc = StreamAccumulator::default();

        acc.apply(chunk(json!({"choices": [{"delta": {"content": "Here "}}]})), &sink);
        acc.apply(chunk(json!({"choices": [{"delta": {"content": "you go"}}]})), &sink);
        acc.apply(
            chunk(json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "id": "call_a", "function": {"name": "generate_sketch", "arguments": "{\"se"}}
            ]}}]})),
            &sink,
        );
        acc.apply(
            chunk(json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "ed\":1}"}}
            ]}, "finish_reason": "tool_calls"}]})),
            &sink,
        );
        acc.apply(
            chunk(json!({"choices": [], "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}})),
            &sink,
        );

        let completion = acc.finish();
        assert_eq!(completion.content.as_deref(), Some("Here you go"));
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].id, "call_a");
        assert_eq!(completion.tool_calls[0].function.arguments, "{\"seed\":1}");
        assert_eq!(completion.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(completion.usage.unwrap().total_tokens, 7);
        assert_eq!(
            seen.into_inner().unwrap(),
            vec![
                CompletionDelta::Text("Here ".into()),
                CompletionDelta::Text("you go".into())
            ]
        );
    }

    #[test]
    fn null_fields_in_chunks_are_tolerated() {
        let sink = |_: CompletionDelta| {};
        let mut acc = StreamAccumulator::default();
        acc.apply(
            chunk(json!({"choices": [{"delta": {"content": null, "tool_calls": null}, "finish_reason": null}], "usage": null})),
            &sink,
        );
        assert_eq!(acc.finish(), Completion::default());
    }

    #[test]
    fn reasoning_effort_only_sent_to_reasoning_models() {
        let tools: Vec<ToolSchema> = Vec::new();
        let messages = vec![ChatMessage::user("draw a circle")];
        let mut request = CompletionRequest {
            model: "gpt-4o-mini",
            reasoning_effort: Some(ReasoningEffort::Low),
            instructions: "be Seed",
            messages: &messages,
            tools: &tools,
        };

        let body = request_body(&request);
        assert!(body.get("reasoning_effort").is_none());
        assert!(body.get("tools").is_none());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be Seed");
        assert_eq!(body["messages"][1]["content"], "draw a circle");

        request.model = "gpt-5-mini";
        assert_eq!(request_body(&request)["reasoning_effort"], "low");
    }

    #[test]
    fn debug_redacts_api_key() {
        let client = OpenAiClient::new(
            "sk-secret".into(),
            "https://example.test/v1/",
            reqwest::Client::new(),
        );
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("sk-secret"));
        assert_eq!(client.completions_url(), "https://example.test/v1/chat/completions");
    }
}
