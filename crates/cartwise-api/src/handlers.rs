//! Route handler functions for all API endpoints.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use cartwise_core::events::StreamEvent;
use cartwise_core::types::{Message, Session};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub user_id: String,
    #[serde(default)]
    pub persona_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub catalog_size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session: Session,
    /// Opening line of the session's persona.
    pub greeting: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Run a synchronous SQLite call on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> cartwise_core::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("storage task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let products = state.products.clone();
    let catalog_size = blocking(move || products.count())
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = ?e, "Catalog count failed");
            0
        });

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        catalog_size,
    })
}

/// POST /sessions - open a conversation.
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let user_id = body.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("userId must not be empty".to_string()));
    }

    let session = state
        .coordinator
        .open_session(user_id, body.persona_id.as_deref())
        .await?;
    let greeting = state
        .config
        .persona(Some(&session.persona_id))
        .map(|p| p.greeting.clone())
        .unwrap_or_default();

    Ok((StatusCode::CREATED, Json(SessionResponse { session, greeting })))
}

/// GET /sessions/{id}/messages - full transcript, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let conversations = state.conversations.clone();
    let messages = blocking(move || {
        if conversations.get_session(id)?.is_none() {
            return Ok(None);
        }
        conversations.list_messages(id).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("session not found: {}", id)))?;
    Ok(Json(MessagesResponse { messages }))
}

/// POST /sessions/{id}/chat - run one turn, streaming frames as SSE.
///
/// Invalid requests are rejected with a JSON error before the stream opens.
/// Closing the connection cancels frame delivery; the turn itself finishes
/// in the background.
pub async fn chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ChatRequest>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let handle = state.coordinator.start_turn(id, &body.message).await?;
    let guard = handle.cancel.drop_guard();

    let stream = ReceiverStream::new(handle.events).map(move |event| {
        let _connected = &guard;
        Ok(frame_event(&event))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// SSE event named after the frame type, carrying the frame as JSON.
pub fn frame_event(frame: &StreamEvent) -> Event {
    let data = serde_json::to_string(frame).unwrap_or_default();
    Event::default().event(frame.event_name()).data(data)
}
