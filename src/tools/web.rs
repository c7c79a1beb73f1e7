//! Hosted web search.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolOutput};
use crate::llm::{OpenAiClient, SearchAnswer, SearchContextSize};

pub const WEB_SEARCH: &str = "web_search";

/// A hosted search capability.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(
        &self,
        query: &str,
        context_size: SearchContextSize,
    ) -> anyhow::Result<SearchAnswer>;
}

/// Hosted search through an OpenAI search-enabled model.
pub struct OpenAiSearch {
    client: OpenAiClient,
    model: &'static str,
}

impl OpenAiSearch {
    pub fn new(client: OpenAiClient, model: &'static str) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl SearchClient for OpenAiSearch {
    async fn search(
        &self,
        query: &str,
        context_size: SearchContextSize,
    ) -> anyhow::Result<SearchAnswer> {
        self.client.web_search(self.model, query, context_size).await
    }
}

/// Search the web for time-sensitive information.
pub struct WebSearch {
    client: Arc<dyn SearchClient>,
    context_size: SearchContextSize,
}

impl WebSearch {
    pub fn new(client: Arc<dyn SearchClient>, context_size: SearchContextSize) -> Self {
        Self {
            client,
            context_size,
        }
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        WEB_SEARCH
    }

    fn description(&self) -> &str {
        "Search the web for current, real-time information such as recent p5.js releases, current generative art trends or artists, dates and news. Do not use it for p5.js or creative-coding knowledge you already have."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolOutput> {
        let query = args["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;

        tracing::info!(query, "Running web search");
        let answer = self.client.search(query, self.context_size).await?;

        Ok(ToolOutput {
            value: serde_json::to_value(&answer)?,
            sources: answer.sources,
        })
    }
}
