use crate::audio::wav_container;
use crate::config::SttConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

/// Maximum audio input size for STT (10 MiB). Prevents OOM from oversized payloads.
const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Turns one utterance of raw stream audio into text.
///
/// Never fails: any internal error yields an empty transcript.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> String;
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Client for an OpenAI-compatible `POST {base_url}/audio/transcriptions`.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    http: reqwest::Client,
    config: SttConfig,
}

impl WhisperTranscriber {
    pub fn new(config: SttConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub async fn try_transcribe(&self, audio: &[u8]) -> Result<String, VoiceError> {
        if audio.is_empty() {
            return Ok(String::new());
        }
        if audio.len() > MAX_STT_INPUT_BYTES {
            return Err(VoiceError::Stt(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                audio.len(),
                MAX_STT_INPUT_BYTES
            )));
        }

        let wav = wav_container(audio, self.config.inbound_encoding, self.config.sample_rate)?;
        let timeout = std::time::Duration::from_secs(self.config.timeout_secs);
        tokio::time::timeout(timeout, self.upload(wav))
            .await
            .map_err(|_| VoiceError::Timeout("transcription", self.config.timeout_secs))?
    }

    async fn upload(&self, wav: Vec<u8>) -> Result<String, VoiceError> {
        let url = format!(
            "{}/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        );
        let file = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .text("model", self.config.model.clone())
            .part("file", file);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VoiceError::from_response("transcription provider", response).await);
        }

        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text.trim().to_string())
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> String {
        match self.try_transcribe(audio).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(bytes = audio.len(), error = %e, "transcription failed");
                String::new()
            }
        }
    }
}
