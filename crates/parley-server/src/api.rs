//! Shared API types and the session inspection handlers.

use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parley_history::StoredEntry;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    /// An upstream provider failed and the request cannot be completed.
    #[error("upstream failure: {0}")]
    BadGateway(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Handler for `GET /`.
pub async fn index_handler() -> &'static str {
    "Parley voice relay is running."
}

/// Health check handler.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Response body for the name lookup.
#[derive(Debug, Serialize)]
pub struct SessionNameResponse {
    pub session_key: String,
    pub name: Option<String>,
}

/// Handler for `GET /api/sessions/{key}/name`.
pub async fn session_name_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(session_key): Path<String>,
) -> Json<SessionNameResponse> {
    let name = state.history.latest_name(&session_key).await;
    Json(SessionNameResponse { session_key, name })
}

/// Response body for the history listing.
#[derive(Debug, Serialize)]
pub struct SessionHistoryResponse {
    pub session_key: String,
    pub entries: Vec<StoredEntry>,
}

/// Handler for `GET /api/sessions/{key}/history`.
///
/// Lists durable rows in replay order. Writes still in the queue are not
/// visible yet.
pub async fn session_history_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(session_key): Path<String>,
) -> Result<Json<SessionHistoryResponse>, ApiError> {
    let entries = state
        .history
        .durable_history(&session_key)
        .await
        .map_err(|e| {
            tracing::error!(session_key = %session_key, error = %e, "history listing failed");
            ApiError::InternalServerError("failed to read conversation history".to_string())
        })?;
    Ok(Json(SessionHistoryResponse {
        session_key,
        entries,
    }))
}
