//! HTTP handlers for chat, session reset, and status.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::classifier::classify;
use crate::error::ApiError;
use crate::format::format_response;
use crate::llm::LlmError;
use crate::prompt::{PartsRecord, build_prompt};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponseBody {
    pub response: String,
    pub raw_response: String,
    pub conversation_id: String,
    pub session_id: String,
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionRef {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// One chat exchange: classify, assemble context, optionally look up parts,
/// call the model, format, record the exchange.
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ChatResponseBody>, ApiError> {
    let message = body.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::EmptyMessage);
    }

    // Configuration errors surface before any upstream call.
    let backend = state.backend.as_ref().ok_or(ApiError::MissingConfig)?;

    let session_id = body
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let classification = classify(&message);
    let context = state
        .context
        .assemble(&message, state.config.context_max_chars)
        .await;

    let parts = lookup_parts(&state, &classification).await;

    let history = state.sessions.history(&session_id).await;
    let messages = build_prompt(&message, &history, &context, parts.as_deref());

    let raw_response = backend.complete(&messages).await?;

    // The formatter is total, but fall back to the raw text if it ever
    // produced nothing for a non-empty reply.
    let formatted = format_response(&raw_response);
    let response = if formatted.is_empty() && !raw_response.trim().is_empty() {
        warn!("formatter returned empty output, serving raw response");
        raw_response.clone()
    } else {
        formatted
    };

    let conversation_id = state
        .sessions
        .append_exchange(&session_id, &message, &raw_response)
        .await;

    info!(
        %conversation_id,
        parts_intent = classification.is_topic_match,
        "chat exchange completed"
    );

    Ok(Json(ChatResponseBody {
        response,
        raw_response,
        conversation_id,
        session_id,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// Parts lookup is optional enrichment: any miss or failure becomes `None`.
async fn lookup_parts(
    state: &AppState,
    classification: &crate::classifier::Classification,
) -> Option<Vec<PartsRecord>> {
    if !classification.is_topic_match {
        return None;
    }
    let entity = classification.extracted_entity.as_deref()?;
    let finder = state.parts.as_ref()?;
    finder.find(entity).await
}

/// Clear the session's history and conversation id.
pub async fn new_conversation_handler(
    State(state): State<AppState>,
    body: Option<Json<SessionRef>>,
) -> Json<Value> {
    if let Some(session_id) = body.and_then(|Json(b)| b.session_id) {
        state.sessions.clear(&session_id).await;
    }
    Json(json!({ "message": "New conversation started" }))
}

/// Validate configuration, probe the upstream service, report session state.
pub async fn status_handler(
    State(state): State<AppState>,
    Query(query): Query<SessionRef>,
) -> (StatusCode, Json<Value>) {
    let missing = state.config.missing_required();
    if !missing.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": format!("Missing environment variables: {}", missing.join(", ")),
            })),
        );
    }

    let Some(backend) = state.backend.as_ref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "error",
                "message": "Model backend is not configured",
            })),
        );
    };

    let session_id = query.session_id.unwrap_or_default();
    let conversation_id = state
        .sessions
        .conversation_id(&session_id)
        .await
        .unwrap_or_else(|| "none".to_string());
    let messages_count = state.sessions.message_count(&session_id).await;

    match backend.probe().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "message": "Connected successfully",
                "model": backend.model(),
                "conversation_id": conversation_id,
                "messages_count": messages_count,
            })),
        ),
        Err(LlmError::Auth) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "status": "error",
                "message": "Invalid API key",
            })),
        ),
        Err(LlmError::RateLimited) => (
            StatusCode::OK,
            Json(json!({
                "status": "warning",
                "message": "API rate limit reached but connection is valid",
                "model": backend.model(),
                "conversation_id": conversation_id,
                "messages_count": messages_count,
            })),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "error",
                "message": format!("Failed to connect to the model service: {err}"),
            })),
        ),
    }
}
