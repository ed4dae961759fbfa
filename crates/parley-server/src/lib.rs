//! Parley server library logic.
//!
//! HTTP and websocket surface of the voice relay: the telephony speech
//! webhook, browser chat, standalone synthesis, session inspection and the
//! live media stream.

pub mod api;
pub mod api_chat;
pub mod api_stream;
pub mod api_voice;
pub mod background;
pub mod config;
pub mod conversation;

use api_stream::StreamServices;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use config::{Config, WebhookConfig};
use conversation::{Conversation, Greetings};
use parley_db::DbPool;
use parley_history::{
    persist_queue, ConversationHistory, ConversationStore, PersistWorker, PromptAssembler,
    SessionCache, SqliteConversationStore,
};
use parley_voice::{
    AudioStore, BatchSpeech, ChatCompletionClient, ElevenLabsClient, VoiceError,
    WhisperTranscriber,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session cache in front of the durable conversation store.
    pub history: ConversationHistory,
    /// Reply pipeline for webhook and chat requests.
    pub conversation: Conversation,
    /// Collaborators for live media stream sessions.
    pub stream: StreamServices,
    /// Batch synthesis into served audio files.
    pub speech: BatchSpeech,
    pub webhook: WebhookConfig,
    /// Directory served under `/static`.
    pub audio_dir: PathBuf,
}

/// Builds the application state from configuration.
///
/// Returns the history writer alongside the state; it must be spawned for
/// durable writes to happen.
///
/// # Errors
///
/// Returns `VoiceError::Config` when a provider cannot be configured.
pub fn build_state(config: &Config, pool: DbPool) -> Result<(AppState, PersistWorker), VoiceError> {
    let store: Arc<dyn ConversationStore> = Arc::new(SqliteConversationStore::new(pool));
    let (queue, worker) = persist_queue(
        Arc::clone(&store),
        config.history.persist_queue_capacity,
        config.history.persist_max_attempts,
    );
    let cache = SessionCache::new(config.history.cache_capacity, config.history.max_sessions);
    let history = ConversationHistory::new(cache, store, queue);

    let persona = &config.persona;
    let assembler = PromptAssembler::new(
        persona.name.clone(),
        persona.directive.clone(),
        config.history.prompt_window,
    );
    let greetings = Greetings {
        generic: persona.greeting.clone(),
        named: persona.named_greeting.clone(),
    };
    let conversation = Conversation::new(
        history.clone(),
        assembler,
        Arc::new(ChatCompletionClient::new(
            config.llm.clone(),
            persona.system_prompt.clone(),
        )),
        greetings,
    );
    let live_conversation = conversation.with_generator(Arc::new(ChatCompletionClient::new(
        config.stream_llm.clone(),
        persona.system_prompt.clone(),
    )));

    let tts = Arc::new(ElevenLabsClient::new(config.tts.clone())?);
    let audio_dir = PathBuf::from(&config.audio.dir);
    let speech = BatchSpeech::new(
        tts.clone(),
        AudioStore::new(
            audio_dir.clone(),
            config.server.public_url(),
            config.audio.file_prefix.clone(),
        ),
        config.tts.batch_extension(),
        config.tts.markup,
    );

    let stream = StreamServices {
        conversation: live_conversation,
        transcriber: Arc::new(WhisperTranscriber::new(config.stt.clone())),
        synthesizer: tts,
        chunk_timeout: config.tts.chunk_timeout(),
    };

    let state = AppState {
        history,
        conversation,
        stream,
        speech,
        webhook: config.webhook.clone(),
        audio_dir,
    };
    Ok((state, worker))
}

/// Maximum request body size (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let audio_dir = state.audio_dir.clone();
    tracing::info!(path = %audio_dir.display(), "serving generated audio at /static");

    Router::new()
        .route("/", get(api::index_handler))
        .route("/health", get(api::health))
        .route("/voice", post(api_voice::voice_webhook_handler))
        .route("/chat", post(api_chat::chat_handler))
        .route("/generate-voice", post(api_chat::generate_voice_handler))
        .route(
            "/api/sessions/{key}/name",
            get(api::session_name_handler),
        )
        .route(
            "/api/sessions/{key}/history",
            get(api::session_history_handler),
        )
        .route("/stream", get(api_stream::stream_handler))
        .nest_service("/static", ServeDir::new(audio_dir))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
