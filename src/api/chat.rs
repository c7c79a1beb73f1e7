//! `POST /api/chat`: run one agent turn and stream its parts over SSE.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderName;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::types::{ChatError, ChatRequest};
use super::AppState;
use crate::agent::AgentEvent;

/// Marks the body as a UI message stream for the studio client.
pub const UI_MESSAGE_STREAM_HEADER: HeaderName =
    HeaderName::from_static("x-vercel-ai-ui-message-stream");

/// Validate the body: JSON first, then the `messages` shape, then each message.
pub fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, ChatError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ChatError::UnparsableBody)?;

    if !value.get("messages").is_some_and(Value::is_array) {
        return Err(ChatError::MessagesNotArray);
    }

    serde_json::from_value(value).map_err(|e| ChatError::InvalidMessage(e.to_string()))
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ChatError> {
    let request = parse_chat_request(&body)?;

    if !state.agents.has_credential() {
        return Err(ChatError::MissingCredential);
    }
    // The factory only fails when the credential is absent.
    let agent = state
        .agents
        .create_agent()
        .map_err(|_| ChatError::MissingCredential)?;

    let stream_id = Uuid::new_v4();
    tracing::info!(
        stream_id = %stream_id,
        messages = request.messages.len(),
        "Chat stream opened"
    );

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = agent.run(&request.messages, &tx, &task_cancel).await {
            tracing::error!(stream_id = %stream_id, error = %e, "Agent turn failed");
            let _ = tx.send(AgentEvent::Error {
                error_text: e.to_string(),
            });
        }
    });

    // Dropping the response stream (client abort) cancels the turn.
    let drop_guard = cancel.drop_guard();

    let stream = async_stream::stream! {
        let _guard = drop_guard;
        while let Some(event) = rx.recv().await {
            tracing::trace!(stream_id = %stream_id, event = event.event_name(), "Chat SSE event");
            match Event::default().json_data(&event) {
                Ok(sse) => yield Ok::<_, Infallible>(sse),
                Err(e) => {
                    tracing::error!(
                        stream_id = %stream_id,
                        event = event.event_name(),
                        error = %e,
                        "Failed to serialize SSE event; dropping"
                    );
                }
            }
        }
        yield Ok(Event::default().data("[DONE]"));
        tracing::info!(stream_id = %stream_id, "Chat stream closed");
    };

    let sse = Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keepalive"),
    );
    Ok(([(UI_MESSAGE_STREAM_HEADER, "v1")], sse))
}
