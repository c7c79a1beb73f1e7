//! HTTP API.
//!
//! - `POST /api/chat` streams one agent turn as server-sent events
//! - `GET /api/health` reports liveness

mod chat;
pub mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::AgentFactory;
use crate::config::Config;

pub use chat::{parse_chat_request, UI_MESSAGE_STREAM_HEADER};
use types::HealthResponse;

/// Shared state; built once at startup.
pub struct AppState {
    pub agents: AgentFactory,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(chat::chat))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        agents: AgentFactory::from_config(&config)?,
    });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
