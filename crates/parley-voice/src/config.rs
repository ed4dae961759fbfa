use crate::audio::InboundEncoding;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_LLM_URL: &str = "https://router.huggingface.co/v1";
pub const DEFAULT_GROQ_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_ELEVENLABS_URL: &str = "https://api.elevenlabs.io";

fn default_llm_url() -> String {
    DEFAULT_LLM_URL.to_string()
}

fn default_llm_model() -> String {
    "google/gemma-2-2b-it".to_string()
}

fn default_llm_temperature() -> f32 {
    0.2
}

fn default_llm_max_tokens() -> u32 {
    400
}

fn default_timeout_secs() -> u64 {
    30
}

/// Settings for an OpenAI-compatible chat completion endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    /// Upper bound on one completion request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            api_key: String::new(),
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Short, fast replies for live calls.
    pub fn low_latency() -> Self {
        Self {
            base_url: DEFAULT_GROQ_URL.to_string(),
            api_key: String::new(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.6,
            max_tokens: 60,
            timeout_secs: 15,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_stt_url() -> String {
    DEFAULT_GROQ_URL.to_string()
}

fn default_stt_model() -> String {
    "whisper-large-v3".to_string()
}

fn default_sample_rate() -> u32 {
    8_000
}

/// Settings for an OpenAI-compatible transcription endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default = "default_stt_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_stt_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Encoding of the raw bytes accumulated from the media stream.
    #[serde(default)]
    pub inbound_encoding: InboundEncoding,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: default_stt_url(),
            api_key: String::new(),
            model: default_stt_model(),
            timeout_secs: default_timeout_secs(),
            inbound_encoding: InboundEncoding::default(),
            sample_rate: default_sample_rate(),
        }
    }
}

impl fmt::Debug for SttConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SttConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("inbound_encoding", &self.inbound_encoding)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// ElevenLabs voice tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
}

fn default_batch_voice() -> VoiceSettings {
    VoiceSettings {
        stability: 0.4,
        similarity_boost: 0.9,
    }
}

fn default_stream_voice() -> VoiceSettings {
    VoiceSettings {
        stability: 0.3,
        similarity_boost: 0.85,
    }
}

fn default_tts_url() -> String {
    DEFAULT_ELEVENLABS_URL.to_string()
}

fn default_batch_model() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_stream_model() -> String {
    "eleven_turbo_v2_5".to_string()
}

fn default_batch_format() -> String {
    "mp3_44100_128".to_string()
}

fn default_stream_format() -> String {
    "ulaw_8000".to_string()
}

fn default_streaming_latency() -> u8 {
    4
}

fn default_markup() -> bool {
    true
}

fn default_chunk_timeout_secs() -> u64 {
    10
}

/// Settings for the ElevenLabs text-to-speech API.
#[derive(Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_tts_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default)]
    pub voice_id: String,
    #[serde(default = "default_batch_model")]
    pub batch_model: String,
    #[serde(default = "default_stream_model")]
    pub stream_model: String,
    #[serde(default = "default_batch_voice")]
    pub batch_voice: VoiceSettings,
    #[serde(default = "default_stream_voice")]
    pub stream_voice: VoiceSettings,
    /// Format of stored batch audio.
    #[serde(default = "default_batch_format")]
    pub batch_output_format: String,
    /// Format of streamed audio. Must match what the telephony transport plays.
    #[serde(default = "default_stream_format")]
    pub output_format: String,
    /// Provider latency optimisation level (0-4).
    #[serde(default = "default_streaming_latency")]
    pub streaming_latency: u8,
    /// Wrap batch text in prosody markup with sentence pauses.
    #[serde(default = "default_markup")]
    pub markup: bool,
    /// Upper bound on a batch request, and on the start of a streamed one.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on the wait for each streamed chunk.
    #[serde(default = "default_chunk_timeout_secs")]
    pub chunk_timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: default_tts_url(),
            api_key: String::new(),
            voice_id: String::new(),
            batch_model: default_batch_model(),
            stream_model: default_stream_model(),
            batch_voice: default_batch_voice(),
            stream_voice: default_stream_voice(),
            batch_output_format: default_batch_format(),
            output_format: default_stream_format(),
            streaming_latency: default_streaming_latency(),
            markup: default_markup(),
            timeout_secs: default_timeout_secs(),
            chunk_timeout_secs: default_chunk_timeout_secs(),
        }
    }
}

impl TtsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }

    /// File extension matching `batch_output_format`.
    pub fn batch_extension(&self) -> &str {
        self.batch_output_format
            .split('_')
            .next()
            .filter(|codec| !codec.is_empty())
            .unwrap_or("mp3")
    }
}

impl fmt::Debug for TtsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtsConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("voice_id", &self.voice_id)
            .field("batch_model", &self.batch_model)
            .field("stream_model", &self.stream_model)
            .field("output_format", &self.output_format)
            .field("markup", &self.markup)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}
