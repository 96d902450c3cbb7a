//! Route handler functions for all API endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{ApiError, INTERNAL_ERROR, NOT_INITIALIZED, NO_MESSAGE};
use crate::state::AppState;

/// The embedded single-page chat client.
pub const CHAT_PAGE_HTML: &str = include_str!("../assets/chat.html");

// =============================================================================
// Request / response types
// =============================================================================

/// Request body for POST /chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
}

/// Response body for POST /chat.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub pipeline_ready: bool,
    pub schema_fields: usize,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /chat - answer one question.
///
/// The pipeline runs in its own task so a panic inside it becomes a 500
/// instead of a dropped connection.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let orchestrator = state
        .orchestrator
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable(NOT_INITIALIZED.to_string()))?;

    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let message = body
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(NO_MESSAGE.to_string()))?;

    info!(chars = message.chars().count(), "Chat message received");

    let reply = tokio::spawn(async move { orchestrator.handle_message(&message).await })
        .await
        .map_err(|e| {
            error!(error = %e, "Chat pipeline task aborted");
            ApiError::Internal(INTERNAL_ERROR.to_string())
        })??;

    info!(kind = ?reply.kind, results = reply.result_count, "Chat reply sent");
    Ok(Json(ChatResponse {
        response: reply.response,
    }))
}

/// GET /health - liveness plus pipeline readiness.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let schema_fields = state
        .orchestrator
        .as_ref()
        .map(|o| o.schema().field_count())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pipeline_ready: state.is_ready(),
        schema_fields,
    })
}

/// GET / - serve the chat page.
pub async fn index() -> impl IntoResponse {
    Html(CHAT_PAGE_HTML)
}
