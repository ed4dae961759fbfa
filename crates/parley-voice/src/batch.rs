//! Batch synthesis: complete audio written to disk and served by URL.

use crate::error::VoiceError;
use crate::markup::prosody_markup;
use crate::tts::SpeechSynthesizer;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory of generated audio files, published under `<public_base>/static`.
#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
    public_base: String,
    prefix: String,
}

impl AudioStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        public_base: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Unique, time-derived file name: `<prefix>_<unix_millis>_<short uuid>.<ext>`.
    fn file_name(&self, extension: &str) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("{}_{}_{}.{}", self.prefix, millis, &id[..8], extension)
    }

    /// Writes `audio` and returns its public URL.
    pub async fn save(&self, audio: &[u8], extension: &str) -> Result<String, VoiceError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let name = self.file_name(extension);
        tokio::fs::write(self.dir.join(&name), audio).await?;
        Ok(format!("{}/static/{}", self.public_base, name))
    }
}

/// Text in, audio URL out.
#[derive(Clone)]
pub struct BatchSpeech {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: AudioStore,
    extension: String,
    markup: bool,
}

impl BatchSpeech {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: AudioStore,
        extension: impl Into<String>,
        markup: bool,
    ) -> Self {
        Self {
            synthesizer,
            store,
            extension: extension.into(),
            markup,
        }
    }

    /// Synthesizes `text` and stores it. Any failure is fatal for the caller.
    pub async fn synthesize(&self, text: &str) -> Result<String, VoiceError> {
        let input = if self.markup {
            prosody_markup(text)
        } else {
            text.to_string()
        };

        let audio = self.synthesizer.synthesize(&input).await?;
        if audio.is_empty() {
            return Err(VoiceError::Tts("provider returned no audio".to_string()));
        }

        let url = self.store.save(&audio, &self.extension).await?;
        tracing::debug!(bytes = audio.len(), url = %url, "stored synthesized audio");
        Ok(url)
    }
}
