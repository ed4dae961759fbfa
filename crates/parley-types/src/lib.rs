//! Shared types for the Parley conversational relay.
//!
//! This crate holds the vocabulary every other crate speaks: the role-tagged
//! [`HistoryEntry`] that makes up a conversation, the well-known session
//! keys, and the wire shapes of the telephony media stream (see [`stream`]).
//!
//! Nothing in here performs I/O. Crates that persist, cache or transport
//! these values depend on `parley-types` and never on each other for type
//! definitions.

pub mod stream;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Session key used when a caller identity is missing.
///
/// Matches the column default of the durable store.
pub const UNKNOWN_SESSION_KEY: &str = "unknown";

/// Session key shared by browser chat clients that do not send their own.
pub const WEB_CHAT_SESSION_KEY: &str = "web-chat";

/// Who produced a history entry.
///
/// `Name` entries are a side channel: they record a detected user name and
/// are never rendered into conversational context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The caller or chat user.
    User,
    /// The persona's generated reply.
    Assistant,
    /// A detected user-name fact.
    Name,
}

impl Role {
    /// Returns the storage label for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Name => "name",
        }
    }

    /// Returns the label used when rendering a conversation line.
    ///
    /// `Name` has no conversational label; callers filter it out first.
    pub fn speaker_label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::Name => "Name",
        }
    }

    /// Whether entries with this role belong in rendered conversation text.
    pub fn is_conversational(self) -> bool {
        !matches!(self, Self::Name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored role label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown history role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "name" => Ok(Self::Name),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// One immutable, role-tagged message in a session's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Who produced the message.
    pub role: Role,
    /// Message text, stored verbatim.
    pub content: String,
    /// Position within the session. Strictly increasing in production order.
    pub sequence: u64,
}

impl HistoryEntry {
    pub fn new(role: Role, content: impl Into<String>, sequence: u64) -> Self {
        Self {
            role,
            content: content.into(),
            sequence,
        }
    }
}

/// Resolves an optional, possibly blank caller identity to a session key.
pub fn session_key_or(candidate: Option<&str>, fallback: &str) -> String {
    match candidate.map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => fallback.to_string(),
    }
}
