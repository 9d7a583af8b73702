//! Route handlers.

use std::time::Instant;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use parley_core::ThreadId;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::ApiError;
use crate::health::{self, HealthResponse};
use crate::server::AppState;

/// `POST /message` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    /// Prompt text; required and non-blank.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Conversation key; `"default"` when absent.
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// `POST /message` success body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    /// Agent reply.
    pub result: String,
    /// Echo of the resolved thread.
    pub thread_id: ThreadId,
    /// Agent-reported duration.
    pub duration_ms: u64,
}

/// `POST /message`.
///
/// Auth and admission are checked before the body is read, so rejected
/// callers never cost a body read.
pub async fn message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<MessageResponse>, ApiError> {
    if !authorized(&headers, &state.config.api_key) {
        return Err(ApiError::Unauthorized);
    }

    let permit = state.bridge.admit()?;

    let bytes = axum::body::to_bytes(body, state.config.max_body_bytes)
        .await
        .map_err(|_| ApiError::InvalidBody)?;
    let request: MessageRequest =
        serde_json::from_slice(&bytes).map_err(|_| ApiError::InvalidBody)?;

    let prompt = request
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or(ApiError::MissingPrompt)?
        .to_string();
    let thread = ThreadId::or_default(request.thread_id);

    let started = Instant::now();
    info!(thread_id = %thread, prompt_len = prompt.len(), "message received");

    match state.bridge.handle_admitted(permit, thread.clone(), prompt).await {
        Ok(reply) => {
            info!(
                thread_id = %thread,
                duration_ms = reply.duration_ms,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "message answered"
            );
            Ok(Json(MessageResponse {
                result: reply.result,
                thread_id: reply.thread_id,
                duration_ms: reply.duration_ms,
            }))
        }
        Err(e) => {
            warn!(thread_id = %thread, error = %e, "message failed");
            Err(e.into())
        }
    }
}

/// `GET /health`.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let limiter = state.bridge.limiter();
    Json(health::health_check(
        state.start_time,
        limiter.active(),
        limiter.max(),
        state.bridge.cache().len(),
    ))
}

/// Fallback for unknown routes and methods.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

fn authorized(headers: &HeaderMap, api_key: &str) -> bool {
    if api_key.is_empty() {
        return false;
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == api_key)
}
