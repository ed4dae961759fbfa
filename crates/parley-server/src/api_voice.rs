//! Telephony speech webhook.
//!
//! The transport posts each recognised utterance as a form and plays back
//! whatever the returned markup document instructs.

use crate::api::ApiError;
use crate::api_chat::synthesis_failed;
use crate::AppState;
use axum::{
    extract::{Extension, Form},
    http::header,
    response::{IntoResponse, Response},
};
use parley_types::{session_key_or, UNKNOWN_SESSION_KEY};
use parley_voice::markup::escape_xml;
use serde::Deserialize;
use std::sync::Arc;

const REPEAT_PROMPT: &str = "I didn't catch that. Can you say it again?";

/// Form fields posted by the telephony transport.
#[derive(Debug, Default, Deserialize)]
pub struct VoiceWebhookForm {
    #[serde(rename = "SpeechResult", default)]
    pub speech_result: Option<String>,
    #[serde(rename = "From", default)]
    pub from: Option<String>,
}

fn xml_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

/// Markup asking the caller to repeat themselves.
pub fn repeat_document() -> String {
    format!("<Response><Say>{REPEAT_PROMPT}</Say></Response>")
}

/// Markup playing `audio_url`, optionally listening for the next utterance.
pub fn play_document(audio_url: &str, regather: bool) -> String {
    let mut doc = format!("<Response><Play>{}</Play>", escape_xml(audio_url));
    if regather {
        doc.push_str(r#"<Gather input="speech" action="/voice" method="POST"/>"#);
    }
    doc.push_str("</Response>");
    doc
}

/// Handler for `POST /voice`.
pub async fn voice_webhook_handler(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<VoiceWebhookForm>,
) -> Result<Response, ApiError> {
    let speech = form.speech_result.unwrap_or_default();
    if speech.trim().is_empty() {
        tracing::debug!("webhook received no speech, asking caller to repeat");
        return Ok(xml_response(repeat_document()));
    }
    let session_key = session_key_or(form.from.as_deref(), UNKNOWN_SESSION_KEY);

    let reply = state.conversation.respond(&session_key, &speech).await;
    let audio_url = state
        .speech
        .synthesize(&reply)
        .await
        .map_err(synthesis_failed)?;

    tracing::info!(session_key = %session_key, audio_url = %audio_url, "webhook reply ready");
    Ok(xml_response(play_document(&audio_url, state.webhook.regather)))
}
