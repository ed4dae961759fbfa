//! Prompt assembly and user-name detection.

use parley_types::HistoryEntry;

/// Default number of conversational entries rendered into a prompt.
pub const DEFAULT_WINDOW: usize = 10;

/// Phrases that introduce a user's name, checked in order.
const NAME_TRIGGERS: [&str; 2] = ["my name is", "i am"];

/// Looks for a self-introduction in a user utterance.
///
/// The match is a case-insensitive literal search; the name is the single
/// whitespace-delimited token following the first trigger found, taken
/// verbatim (trailing punctuation included). `"my name is Alex, hi"` yields
/// `"Alex,"`.
pub fn detect_name(utterance: &str) -> Option<String> {
    // ASCII lowering keeps byte offsets aligned with `utterance`.
    let lowered = utterance.to_ascii_lowercase();
    NAME_TRIGGERS.iter().find_map(|trigger| {
        let start = lowered.find(trigger)? + trigger.len();
        utterance[start..].split_whitespace().next().map(str::to_string)
    })
}

/// Builds bounded-size prompts from a session's history.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    persona_name: String,
    directive: String,
    window: usize,
}

impl PromptAssembler {
    /// * `persona_name` - who replies ("Emily").
    /// * `directive` - fixed persona instructions placed at the top.
    /// * `window` - maximum number of conversational entries rendered.
    pub fn new(persona_name: impl Into<String>, directive: impl Into<String>, window: usize) -> Self {
        Self {
            persona_name: persona_name.into(),
            directive: directive.into(),
            window,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Renders the prompt for a new user utterance.
    ///
    /// Only the last `window` user/assistant entries of `history` are
    /// rendered; `name` entries never appear in the conversation text.
    pub fn assemble(&self, history: &[HistoryEntry], name: Option<&str>, utterance: &str) -> String {
        let conversational: Vec<&HistoryEntry> = history
            .iter()
            .filter(|entry| entry.role.is_conversational())
            .collect();
        let recent = &conversational[conversational.len().saturating_sub(self.window)..];

        let mut prompt = String::new();
        prompt.push_str(self.directive.trim());
        prompt.push('\n');

        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            prompt.push_str(&format!(
                "The user's name is {name}. Use it naturally now and then.\n"
            ));
        }

        prompt.push_str("\nConversation so far:\n");
        if recent.is_empty() {
            prompt.push_str("(this is the start of the conversation)\n");
        }
        for entry in recent {
            prompt.push_str(entry.role.speaker_label());
            prompt.push_str(": ");
            prompt.push_str(&entry.content);
            prompt.push('\n');
        }

        prompt.push_str(&format!(
            "\nThe user says: {utterance}\nNow, {} responds next:",
            self.persona_name
        ));
        prompt
    }
}
