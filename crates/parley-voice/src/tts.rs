use crate::config::{TtsConfig, VoiceSettings};
use crate::error::VoiceError;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use serde::Serialize;

/// Maximum text input size for TTS (64 KiB). Prevents resource exhaustion from
/// oversized synthesis requests.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Lazy, finite, non-restartable sequence of audio chunks.
pub type AudioStream = BoxStream<'static, Result<Bytes, VoiceError>>;

/// Produces the complete audio for a text in one response.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes, VoiceError>;
}

/// Produces audio chunk by chunk as the provider generates it.
#[async_trait]
pub trait StreamingSynthesizer: Send + Sync {
    async fn synthesize_stream(&self, text: &str) -> Result<AudioStream, VoiceError>;
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// ElevenLabs text-to-speech client.
#[derive(Debug, Clone)]
pub struct ElevenLabsClient {
    http: reqwest::Client,
    config: TtsConfig,
}

impl ElevenLabsClient {
    pub fn new(config: TtsConfig) -> Result<Self, VoiceError> {
        if config.voice_id.trim().is_empty() {
            return Err(VoiceError::Config("tts.voice_id must be set".to_string()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            config,
        })
    }

    pub fn config(&self) -> &TtsConfig {
        &self.config
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.voice_id,
            suffix
        )
    }

    async fn send(
        &self,
        url: String,
        query: &[(&str, String)],
        body: SpeechRequest<'_>,
    ) -> Result<reqwest::Response, VoiceError> {
        if body.text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                body.text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        let response = self
            .http
            .post(url)
            .header("xi-api-key", &self.config.api_key)
            .query(query)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VoiceError::from_response("speech provider", response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str) -> Result<Bytes, VoiceError> {
        let body = SpeechRequest {
            text,
            model_id: &self.config.batch_model,
            voice_settings: self.config.batch_voice,
        };
        let query = [("output_format", self.config.batch_output_format.clone())];

        let request = async {
            let response = self.send(self.endpoint(""), &query, body).await?;
            Ok::<_, VoiceError>(response.bytes().await?)
        };
        tokio::time::timeout(self.config.timeout(), request)
            .await
            .map_err(|_| VoiceError::Timeout("speech synthesis", self.config.timeout_secs))?
    }
}

#[async_trait]
impl StreamingSynthesizer for ElevenLabsClient {
    async fn synthesize_stream(&self, text: &str) -> Result<AudioStream, VoiceError> {
        let body = SpeechRequest {
            text,
            model_id: &self.config.stream_model,
            voice_settings: self.config.stream_voice,
        };
        let query = [
            ("output_format", self.config.output_format.clone()),
            (
                "optimize_streaming_latency",
                self.config.streaming_latency.to_string(),
            ),
        ];

        let response = tokio::time::timeout(
            self.config.timeout(),
            self.send(self.endpoint("/stream"), &query, body),
        )
        .await
        .map_err(|_| VoiceError::Timeout("speech stream", self.config.timeout_secs))??;

        Ok(response
            .bytes_stream()
            .map_err(VoiceError::from)
            .try_filter(|chunk| futures_util::future::ready(!chunk.is_empty()))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_voice_id_is_a_config_error() {
        assert!(matches!(
            ElevenLabsClient::new(TtsConfig::default()),
            Err(VoiceError::Config(_))
        ));
    }

    #[test]
    fn endpoints_include_voice() {
        let client = ElevenLabsClient::new(TtsConfig {
            base_url: "https://tts.example/".to_string(),
            voice_id: "rachel".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.endpoint("/stream"),
            "https://tts.example/v1/text-to-speech/rachel/stream"
        );
    }
}
