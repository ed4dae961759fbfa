//! The history-aware reply pipeline shared by every entry point.

use parley_history::{detect_name, ConversationHistory, PromptAssembler};
use parley_types::Role;
use parley_voice::ReplyGenerator;
use std::sync::Arc;

/// Placeholder replaced by the caller's name in the named greeting.
const NAME_PLACEHOLDER: &str = "{name}";

/// Opening lines spoken when a live stream starts.
#[derive(Debug, Clone)]
pub struct Greetings {
    pub generic: String,
    /// Template containing `{name}`.
    pub named: String,
}

impl Greetings {
    pub fn for_name(&self, name: Option<&str>) -> String {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => self.named.replace(NAME_PLACEHOLDER, name),
            None => self.generic.clone(),
        }
    }
}

/// One session-scoped reply pipeline.
///
/// Webhook, chat and live stream replies all run through [`Conversation::respond`];
/// they differ only in the [`ReplyGenerator`] behind it.
#[derive(Clone)]
pub struct Conversation {
    history: ConversationHistory,
    assembler: PromptAssembler,
    generator: Arc<dyn ReplyGenerator>,
    greetings: Greetings,
}

impl Conversation {
    pub fn new(
        history: ConversationHistory,
        assembler: PromptAssembler,
        generator: Arc<dyn ReplyGenerator>,
        greetings: Greetings,
    ) -> Self {
        Self {
            history,
            assembler,
            generator,
            greetings,
        }
    }

    /// Same history and prompt shape, different generator.
    pub fn with_generator(&self, generator: Arc<dyn ReplyGenerator>) -> Self {
        Self {
            generator,
            ..self.clone()
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Produces the next reply for `session_key` and records the exchange.
    ///
    /// The prompt is built from the history as it was before this turn. The
    /// user turn and any detected name are recorded before the model is
    /// called, the reply after.
    pub async fn respond(&self, session_key: &str, utterance: &str) -> String {
        let recent = self.history.entries(session_key).await;

        let detected = detect_name(utterance);
        let name = match &detected {
            Some(name) => Some(name.clone()),
            None => self.history.latest_name(session_key).await,
        };
        let prompt = self.assembler.assemble(&recent, name.as_deref(), utterance);

        self.history.append(session_key, Role::User, utterance).await;
        if let Some(name) = &detected {
            tracing::info!(session_key = %session_key, name = %name, "detected user name");
            self.history.append(session_key, Role::Name, name).await;
        }

        let reply = self.generator.generate(&prompt).await;
        self.history
            .append(session_key, Role::Assistant, &reply)
            .await;
        reply
    }

    /// Greeting for a newly connected caller, personalised when a name is known.
    pub async fn greeting(&self, session_key: &str) -> String {
        let name = self.history.latest_name(session_key).await;
        self.greetings.for_name(name.as_deref())
    }
}
