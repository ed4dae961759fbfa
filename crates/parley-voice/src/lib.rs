//! Provider adapters for the Parley relay.
//!
//! All language understanding, transcription and speech synthesis is done
//! by third-party services. This crate wraps each one behind a small trait
//! so the conversation pipeline and the media stream session never see a
//! provider's wire format:
//!
//! - [`ReplyGenerator`]: prompt in, reply text out. Never fails; provider
//!   errors become a placeholder reply.
//! - [`Transcriber`]: caller audio in, transcript out. Never fails; errors
//!   become an empty transcript.
//! - [`SpeechSynthesizer`] / [`BatchSpeech`]: complete audio, stored as a
//!   file and returned as a URL. Errors are fatal for the request.
//! - [`StreamingSynthesizer`]: audio chunks yielded as the provider produces
//!   them, for low first-byte latency on live calls.

pub mod audio;
pub mod batch;
pub mod config;
pub mod error;
pub mod llm;
pub mod markup;
pub mod stt;
pub mod tts;

pub use audio::InboundEncoding;
pub use batch::{AudioStore, BatchSpeech};
pub use config::{LlmConfig, SttConfig, TtsConfig, VoiceSettings};
pub use error::VoiceError;
pub use llm::{ChatCompletionClient, ReplyGenerator};
pub use stt::{Transcriber, WhisperTranscriber};
pub use tts::{AudioStream, ElevenLabsClient, SpeechSynthesizer, StreamingSynthesizer};
