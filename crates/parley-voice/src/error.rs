use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned {status}: {body}")]
    Provider {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("{0} timed out after {1} seconds")]
    Timeout(&'static str, u64),

    #[error("Audio encoding error: {0}")]
    Audio(#[from] hound::Error),

    #[error("Audio storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl VoiceError {
    /// Reads a failed response body into a [`VoiceError::Provider`].
    pub(crate) async fn from_response(provider: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Self::Provider {
            provider,
            status,
            body,
        }
    }
}
