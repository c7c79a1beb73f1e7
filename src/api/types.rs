//! API request and response types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::UiMessage;
use crate::config::API_KEY_ENV;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<UiMessage>,
}

/// Error body returned with a 400.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Short category, e.g. "Invalid request".
    pub error: String,
    /// Human-readable detail.
    pub message: String,
}

/// Failures detected before the stream starts.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Could not parse request body as JSON.")]
    UnparsableBody,

    #[error("The 'messages' field must be an array.")]
    MessagesNotArray,

    #[error("Invalid message in 'messages': {0}")]
    InvalidMessage(String),

    #[error("The {} environment variable is not set. Please add it to your .env file.", API_KEY_ENV)]
    MissingCredential,
}

impl ChatError {
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::UnparsableBody
            | ChatError::MessagesNotArray
            | ChatError::InvalidMessage(_) => "Invalid request",
            ChatError::MissingCredential => "API key missing",
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        tracing::debug!(error = self.kind(), message = %self, "Rejected chat request");
        let body = ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}
