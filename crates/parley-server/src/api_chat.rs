//! Browser chat and standalone synthesis handlers.

use crate::api::ApiError;
use crate::AppState;
use axum::extract::{Extension, Json};
use parley_types::{session_key_or, WEB_CHAT_SESSION_KEY};
use parley_voice::VoiceError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body for `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_key: Option<String>,
}

/// Response body for `POST /chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub audio_url: String,
}

/// Request body for `POST /generate-voice`.
#[derive(Debug, Deserialize)]
pub struct GenerateVoiceRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Response body for `POST /generate-voice`.
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateVoiceResponse {
    pub audio_url: String,
}

pub(crate) fn synthesis_failed(error: VoiceError) -> ApiError {
    tracing::error!(error = %error, "batch synthesis failed");
    ApiError::BadGateway("speech synthesis failed".to_string())
}

/// Handler for `POST /chat`.
pub async fn chat_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = payload.message.unwrap_or_default();
    if message.trim().is_empty() {
        return Err(ApiError::BadRequest("No message provided".to_string()));
    }
    let session_key = session_key_or(payload.session_key.as_deref(), WEB_CHAT_SESSION_KEY);

    let reply = state.conversation.respond(&session_key, &message).await;
    let audio_url = state
        .speech
        .synthesize(&reply)
        .await
        .map_err(synthesis_failed)?;

    Ok(Json(ChatResponse { reply, audio_url }))
}

/// Handler for `POST /generate-voice`.
pub async fn generate_voice_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<GenerateVoiceRequest>,
) -> Result<Json<GenerateVoiceResponse>, ApiError> {
    let text = payload.text.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest("No text provided".to_string()));
    }

    let audio_url = state
        .speech
        .synthesize(&text)
        .await
        .map_err(synthesis_failed)?;
    Ok(Json(GenerateVoiceResponse { audio_url }))
}
