//! Conversation history for the Parley relay.
//!
//! History lives in two tiers:
//!
//! - [`SessionCache`]: process-wide, in-memory, the authoritative read path.
//!   Each session keeps a bounded window of its most recent entries and the
//!   number of sessions is itself bounded by an LRU policy.
//! - [`ConversationStore`]: the durable append-only log (SQLite by default).
//!   It is only read to warm a session the cache has not loaded yet, and only
//!   written through the [`PersistQueue`] so a slow or failing database can
//!   never stall a live conversation.
//!
//! [`ConversationHistory`] ties the two together, and [`PromptAssembler`]
//! turns a history window into the bounded prompt sent to the language
//! model.

pub mod cache;
pub mod error;
pub mod history;
pub mod prompt;
pub mod store;
pub mod writer;

pub use cache::{SessionCache, SessionWindow};
pub use error::HistoryError;
pub use history::ConversationHistory;
pub use prompt::{detect_name, PromptAssembler};
pub use store::{ConversationStore, NewEntry, SqliteConversationStore, StoredEntry};
pub use writer::{persist_queue, PersistQueue, PersistWorker};
