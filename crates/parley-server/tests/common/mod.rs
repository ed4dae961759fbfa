//! In-process fakes and a state builder shared by the server tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use parley_db::{create_pool, run_migrations, DbRuntimeSettings};
use parley_history::{
    persist_queue, ConversationHistory, ConversationStore, PromptAssembler, SessionCache,
    SqliteConversationStore, StoredEntry,
};
use parley_server::api_stream::StreamServices;
use parley_server::config::WebhookConfig;
use parley_server::conversation::{Conversation, Greetings};
use parley_server::AppState;
use parley_voice::{
    AudioStore, AudioStream, BatchSpeech, ReplyGenerator, SpeechSynthesizer,
    StreamingSynthesizer, Transcriber, VoiceError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Records prompts and answers with a numbered reply.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl ReplyGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> String {
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        format!("reply {}", prompts.len())
    }
}

/// Returns a fixed transcript and records the audio it was given.
pub struct FixedTranscriber {
    pub text: String,
    pub received: Mutex<Vec<Vec<u8>>>,
}

impl FixedTranscriber {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            received: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> String {
        self.received.lock().unwrap().push(audio.to_vec());
        self.text.clone()
    }
}

/// Synthesizer whose streams yield `chunks` chunks. On the first call only it
/// can fail after `fail_after` of them, or go silent after `stall_after`.
pub struct ScriptedSynth {
    pub chunks: usize,
    pub fail_after: Option<usize>,
    pub stall_after: Option<usize>,
    pub batch_fails: bool,
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
}

impl ScriptedSynth {
    pub fn new(chunks: usize) -> Self {
        Self {
            chunks,
            fail_after: None,
            stall_after: None,
            batch_fails: false,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_after(chunks: usize, fail_after: usize) -> Self {
        Self {
            fail_after: Some(fail_after),
            ..Self::new(chunks)
        }
    }

    pub fn stalling_after(chunks: usize, stall_after: usize) -> Self {
        Self {
            stall_after: Some(stall_after),
            ..Self::new(chunks)
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamingSynthesizer for ScriptedSynth {
    async fn synthesize_stream(&self, text: &str) -> Result<AudioStream, VoiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());

        let fail_at = if call == 0 { self.fail_after } else { None };
        let items: Vec<Result<Bytes, VoiceError>> = (0..self.chunks)
            .map(|i| match fail_at {
                Some(limit) if i == limit => Err(VoiceError::Tts("provider dropped".to_string())),
                _ => Ok(Bytes::from(vec![call as u8, i as u8])),
            })
            .collect();

        match self.stall_after.filter(|_| call == 0) {
            Some(limit) => {
                let head: Vec<_> = items.into_iter().take(limit).collect();
                Ok(futures_util::stream::iter(head)
                    .chain(futures_util::stream::pending())
                    .boxed())
            }
            None => Ok(futures_util::stream::iter(items).boxed()),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynth {
    async fn synthesize(&self, text: &str) -> Result<Bytes, VoiceError> {
        self.texts.lock().unwrap().push(text.to_string());
        if self.batch_fails {
            return Err(VoiceError::Provider {
                provider: "speech provider",
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(Bytes::from_static(b"ID3-fake-mp3"))
    }
}

pub struct Harness {
    pub state: AppState,
    pub store: Arc<SqliteConversationStore>,
    pub generator: Arc<ScriptedGenerator>,
    pub transcriber: Arc<FixedTranscriber>,
    pub synth: Arc<ScriptedSynth>,
    pub dir: TempDir,
}

pub const PUBLIC_URL: &str = "http://relay.test";

/// Builds application state over a temporary database and audio directory.
/// Must be called inside a tokio runtime.
pub fn harness(synth: ScriptedSynth, transcript: &str) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("parley.db");
    let pool = create_pool(db_path.to_str().unwrap(), DbRuntimeSettings::default()).unwrap();
    run_migrations(&pool.get().unwrap()).unwrap();

    let store = Arc::new(SqliteConversationStore::new(pool));
    let (queue, worker) = persist_queue(store.clone(), 256, 3);
    tokio::spawn(worker.run());
    let history = ConversationHistory::new(SessionCache::new(50, 1_000), store.clone(), queue);

    let generator = Arc::new(ScriptedGenerator::default());
    let conversation = Conversation::new(
        history.clone(),
        PromptAssembler::new("Emily", "You are Emily.", 10),
        generator.clone(),
        Greetings {
            generic: "Hey, it's Emily.".to_string(),
            named: "Hey {name}, it's Emily.".to_string(),
        },
    );

    let synth = Arc::new(synth);
    let transcriber = Arc::new(FixedTranscriber::new(transcript));
    let audio_dir = dir.path().join("static");
    let speech = BatchSpeech::new(
        synth.clone(),
        AudioStore::new(audio_dir.clone(), PUBLIC_URL, "reply"),
        "mp3",
        false,
    );

    let state = AppState {
        history,
        conversation: conversation.clone(),
        stream: StreamServices {
            conversation,
            transcriber: transcriber.clone(),
            synthesizer: synth.clone(),
            chunk_timeout: Duration::from_secs(2),
        },
        speech,
        webhook: WebhookConfig { regather: true },
        audio_dir,
    };

    Harness {
        state,
        store,
        generator,
        transcriber,
        synth,
        dir,
    }
}

/// Polls the durable store until `count` rows exist for `key`.
pub async fn wait_for_rows(
    store: &SqliteConversationStore,
    key: &str,
    count: usize,
) -> Vec<StoredEntry> {
    for _ in 0..100 {
        let rows = store.load_history(key).unwrap();
        if rows.len() >= count {
            return rows;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {count} durable rows for {key}");
}
