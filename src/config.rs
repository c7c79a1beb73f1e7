//! Configuration management for Seed.
//!
//! Configuration can be set via environment variables:
//! - `OPENAI_API_KEY` - Optional at startup. Requests fail with a distinct error while unset.
//! - `OPENAI_BASE_URL` - Optional. Provider base URL. Defaults to `https://api.openai.com/v1`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//!
//! Model selection, reasoning effort and search settings are not configurable;
//! see [`crate::agent::AGENT_SETTINGS`].

use thiserror::Error;

/// Environment variable holding the provider credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Server configuration.
#[derive(Clone)]
pub struct Config {
    /// OpenAI API key. `None` keeps the server up but rejects chat requests.
    pub openai_api_key: Option<String>,

    /// Base URL for the OpenAI-compatible API
    pub openai_base_url: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("openai_base_url", &self.openai_base_url)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `PORT` is not a valid port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let openai_api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty());

        let openai_base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_port(std::env::var("PORT").ok().as_deref())?;

        Ok(Self {
            openai_api_key,
            openai_base_url,
            host,
            port,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(openai_api_key: Option<String>) -> Self {
        Self {
            openai_api_key,
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }

    /// Whether a provider credential is present.
    pub fn has_api_key(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

fn parse_port(value: Option<&str>) -> Result<u16, ConfigError> {
    value
        .unwrap_or("3000")
        .trim()
        .parse()
        .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))
}
