//! Process-wide agent construction.

use std::sync::Arc;

use crate::config::Config;
use crate::llm::{LlmClient, OpenAiClient};
use crate::tools::{GenerateSketch, OpenAiSearch, SearchClient, ToolRegistry, WebSearch};

use super::agent_loop::{AgentError, SeedAgent, AGENT_SETTINGS};

/// Builds [`SeedAgent`]s from clients constructed once at startup.
///
/// Handlers hold the factory by reference and call [`AgentFactory::create_agent`]
/// per request; nothing here is rebuilt per request.
#[derive(Clone)]
pub struct AgentFactory {
    llm: Option<Arc<dyn LlmClient>>,
    tools: Arc<ToolRegistry>,
}

impl AgentFactory {
    /// Build the provider clients from configuration.
    ///
    /// A missing API key is not an error here; it surfaces from
    /// [`AgentFactory::create_agent`].
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let Some(api_key) = config.openai_api_key.clone() else {
            tracing::warn!("OPENAI_API_KEY is not set; chat requests will be rejected");
            return Ok(Self {
                llm: None,
                tools: Arc::new(build_tools(None)),
            });
        };

        let http = reqwest::Client::builder()
            .user_agent(concat!("seed/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let client = OpenAiClient::new(api_key, &config.openai_base_url, http);
        let search: Arc<dyn SearchClient> =
            Arc::new(OpenAiSearch::new(client.clone(), AGENT_SETTINGS.search_model));

        Ok(Self {
            llm: Some(Arc::new(client)),
            tools: Arc::new(build_tools(Some(search))),
        })
    }

    /// Factory over caller-supplied clients.
    pub fn with_clients(llm: Arc<dyn LlmClient>, search: Option<Arc<dyn SearchClient>>) -> Self {
        Self {
            llm: Some(llm),
            tools: Arc::new(build_tools(search)),
        }
    }

    /// Factory with no credential; every `create_agent` call fails.
    pub fn without_credential() -> Self {
        Self {
            llm: None,
            tools: Arc::new(build_tools(None)),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.llm.is_some()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Create the Seed agent. Takes no configuration: model, reasoning and
    /// search settings are fixed in [`AGENT_SETTINGS`].
    pub fn create_agent(&self) -> Result<SeedAgent, AgentError> {
        let llm = self.llm.clone().ok_or(AgentError::MissingCredential)?;
        Ok(SeedAgent::new(llm, self.tools.clone(), AGENT_SETTINGS))
    }
}

fn build_tools(search: Option<Arc<dyn SearchClient>>) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(GenerateSketch));

    if AGENT_SETTINGS.web_search_enabled {
        if let Some(search) = search {
            tools.register(Arc::new(WebSearch::new(
                search,
                AGENT_SETTINGS.search_context_size,
            )));
        }
    }

    tools
}
