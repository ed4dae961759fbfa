//! Wire shapes of the telephony media stream.
//!
//! The transport sends JSON text frames tagged by an `event` field. Only
//! four kinds are acted on (`start`, `media`, `stop`, `close`); anything
//! else deserializes to [`StreamEvent::Unknown`] and is ignored by the
//! session, so new transport events never break an active call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key under `customParameters` that carries the caller identity.
pub const CALLER_PARAMETER: &str = "caller";

/// An inbound media stream event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Stream setup. Carries the caller identity.
    Start { start: StartMetadata },
    /// A chunk of base64-encoded inbound audio.
    Media { media: MediaPayload },
    /// End of one caller utterance.
    Stop,
    /// End of the stream.
    Close,
    /// Any event kind this relay does not act on.
    #[serde(other)]
    Unknown,
}

/// Setup parameters delivered with a `start` event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StartMetadata {
    /// Transport-assigned stream identifier, echoed on outbound frames.
    #[serde(rename = "streamSid", default)]
    pub stream_sid: Option<String>,
    /// Free-form parameters configured on the call.
    #[serde(rename = "customParameters", default)]
    pub custom_parameters: HashMap<String, String>,
}

impl StartMetadata {
    /// Returns the caller identity, if one was supplied.
    pub fn caller(&self) -> Option<&str> {
        self.custom_parameters
            .get(CALLER_PARAMETER)
            .map(String::as_str)
    }
}

/// Inbound audio payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded audio bytes.
    pub payload: String,
}

/// An outbound audio frame sent back over the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// Always `"media"`.
    pub event: String,
    #[serde(rename = "streamSid", skip_serializing_if = "Option::is_none", default)]
    pub stream_sid: Option<String>,
    pub media: OutboundMedia,
}

/// Body of an [`OutboundFrame`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMedia {
    /// Base64-encoded audio chunk.
    pub payload: String,
}

impl OutboundFrame {
    /// Builds a media frame around an already base64-encoded chunk.
    pub fn media(stream_sid: Option<String>, payload: String) -> Self {
        Self {
            event: "media".to_string(),
            stream_sid,
            media: OutboundMedia { payload },
        }
    }
}
