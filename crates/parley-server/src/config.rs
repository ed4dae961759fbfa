//! Server configuration loading from file and environment variables.

use parley_history::cache::{DEFAULT_CAPACITY, DEFAULT_MAX_SESSIONS};
use parley_history::prompt::DEFAULT_WINDOW;
use parley_history::writer::{DEFAULT_MAX_ATTEMPTS, DEFAULT_QUEUE_CAPACITY};
use parley_voice::{LlmConfig, SttConfig, TtsConfig};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    /// Completion settings for webhook and chat replies.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Completion settings for live media stream replies.
    #[serde(default = "LlmConfig::low_latency")]
    pub stream_llm: LlmConfig,
    #[serde(default)]
    pub stt: SttConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL, used in audio links handed to the
    /// telephony transport. Defaults to `http://{host}:{port}`.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl ServerConfig {
    pub fn public_url(&self) -> String {
        match self.public_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("http://{}:{}", self.host, self.port),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "parley_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Bounds on in-memory history and the durable write queue.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Entries kept per session.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Sessions kept in memory before least recently used ones are evicted.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u64,
    /// Conversational entries rendered into each prompt.
    #[serde(default = "default_prompt_window")]
    pub prompt_window: usize,
    #[serde(default = "default_persist_queue_capacity")]
    pub persist_queue_capacity: usize,
    #[serde(default = "default_persist_max_attempts")]
    pub persist_max_attempts: u32,
}

/// Who the relay speaks as.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_persona_name")]
    pub name: String,
    /// System message sent with every completion request.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Instructions placed at the top of each assembled prompt.
    #[serde(default = "default_directive")]
    pub directive: String,
    /// Opening line for callers with no known name.
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Opening line for known callers. `{name}` is replaced by their name.
    #[serde(default = "default_named_greeting")]
    pub named_greeting: String,
}

/// Where batch audio files are written.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_audio_dir")]
    pub dir: String,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

/// Telephony webhook behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Re-open a speech gathering turn after playing each reply.
    #[serde(default = "default_regather")]
    pub regather: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    5000
}

fn default_db_path() -> String {
    "parley.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cache_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_max_sessions() -> u64 {
    DEFAULT_MAX_SESSIONS
}

fn default_prompt_window() -> usize {
    DEFAULT_WINDOW
}

fn default_persist_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_persist_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_persona_name() -> String {
    "Emily".to_string()
}

fn default_system_prompt() -> String {
    "You are Emily, a warm and playful companion on a phone call. \
     Keep the conversation light and friendly, and answer in one or two short sentences."
        .to_string()
}

fn default_directive() -> String {
    "The following is a friendly conversation between Emily and the user. \
     Stay true to her personality and tone."
        .to_string()
}

fn default_greeting() -> String {
    "Hey, it's Emily. How are you? It's great to finally chat. How's your day going?".to_string()
}

fn default_named_greeting() -> String {
    "Hey {name}, it's Emily. How are you? It's great to finally chat. How's your day going?"
        .to_string()
}

fn default_audio_dir() -> String {
    "static".to_string()
}

fn default_file_prefix() -> String {
    "reply".to_string()
}

fn default_regather() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            history: HistoryConfig::default(),
            persona: PersonaConfig::default(),
            llm: LlmConfig::default(),
            stream_llm: LlmConfig::low_latency(),
            stt: SttConfig::default(),
            tts: TtsConfig::default(),
            audio: AudioConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            max_sessions: default_max_sessions(),
            prompt_window: default_prompt_window(),
            persist_queue_capacity: default_persist_queue_capacity(),
            persist_max_attempts: default_persist_max_attempts(),
        }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: default_persona_name(),
            system_prompt: default_system_prompt(),
            directive: default_directive(),
            greeting: default_greeting(),
            named_greeting: default_named_greeting(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            dir: default_audio_dir(),
            file_prefix: default_file_prefix(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            regather: default_regather(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parses configuration from TOML text. Environment overrides are not applied.
pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(contents)?)
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `PARLEY_HOST`, `PARLEY_PORT`, `PARLEY_PUBLIC_URL` override `[server]`
/// - `PARLEY_DB_PATH` overrides `database.path`
/// - `PARLEY_LOG_LEVEL` overrides `logging.level`
/// - `PARLEY_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `PARLEY_LLM_API_KEY`, `PARLEY_STREAM_LLM_API_KEY`, `PARLEY_STT_API_KEY`
///   and `PARLEY_TTS_API_KEY` set provider credentials
/// - `PARLEY_TTS_VOICE_ID` overrides `tts.voice_id`
/// - `PARLEY_AUDIO_DIR` overrides `audio.dir`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => parse_config(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Applies `PARLEY_*` overrides read through `var`.
pub fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("PARLEY_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("PARLEY_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(url) = var("PARLEY_PUBLIC_URL") {
        config.server.public_url = Some(url);
    }
    if let Some(db_path) = var("PARLEY_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("PARLEY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("PARLEY_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(key) = var("PARLEY_LLM_API_KEY") {
        config.llm.api_key = key;
    }
    if let Some(key) = var("PARLEY_STREAM_LLM_API_KEY") {
        config.stream_llm.api_key = key;
    }
    if let Some(key) = var("PARLEY_STT_API_KEY") {
        config.stt.api_key = key;
    }
    if let Some(key) = var("PARLEY_TTS_API_KEY") {
        config.tts.api_key = key;
    }
    if let Some(voice) = var("PARLEY_TTS_VOICE_ID") {
        config.tts.voice_id = voice;
    }
    if let Some(dir) = var("PARLEY_AUDIO_DIR") {
        config.audio.dir = dir;
    }

    // Live completions and transcription share a provider account by default.
    if config.stt.api_key.is_empty() && config.stt.base_url == config.stream_llm.base_url {
        config.stt.api_key = config.stream_llm.api_key.clone();
    }
}
