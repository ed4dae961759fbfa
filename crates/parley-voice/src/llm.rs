//! Reply generation over an OpenAI-compatible chat completion API.

use crate::config::LlmConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Turns a fully assembled prompt into reply text.
///
/// Implementations never fail: provider errors are folded into a
/// human-readable placeholder so callers always have something to say.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> String;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    http: reqwest::Client,
    config: LlmConfig,
    system_prompt: String,
}

impl ChatCompletionClient {
    pub fn new(config: LlmConfig, system_prompt: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), config, system_prompt)
    }

    pub fn with_client(
        http: reqwest::Client,
        config: LlmConfig,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            http,
            config,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Performs one completion, bounded by `timeout_secs`.
    pub async fn complete(&self, prompt: &str) -> Result<String, VoiceError> {
        tokio::time::timeout(self.config.timeout(), self.request(prompt))
            .await
            .map_err(|_| VoiceError::Timeout("completion", self.config.timeout_secs))?
    }

    async fn request(&self, prompt: &str) -> Result<String, VoiceError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VoiceError::from_response("completion provider", response).await);
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| VoiceError::Llm("response contained no choices".to_string()))
    }
}

#[async_trait]
impl ReplyGenerator for ChatCompletionClient {
    async fn generate(&self, prompt: &str) -> String {
        match self.complete(prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(model = %self.config.model, error = %e, "reply generation failed");
                format!("(reply service error: {e})")
            }
        }
    }
}
