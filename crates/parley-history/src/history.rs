//! Two-tier history facade.

use crate::cache::{SessionCache, SessionWindow};
use crate::error::HistoryError;
use crate::store::{ConversationStore, NewEntry, StoredEntry};
use crate::writer::PersistQueue;
use parley_types::{HistoryEntry, Role};
use std::sync::Arc;

/// Reads through the [`SessionCache`] and writes behind to the durable
/// [`ConversationStore`].
///
/// Reads never fail: a store error while warming a session is logged and
/// the caller sees whatever the cache holds, usually nothing. The load is
/// retried on the next read until it succeeds. Writes land in the cache
/// immediately and reach the store asynchronously through the
/// [`PersistQueue`].
#[derive(Clone)]
pub struct ConversationHistory {
    cache: SessionCache,
    store: Arc<dyn ConversationStore>,
    writer: PersistQueue,
}

impl ConversationHistory {
    pub fn new(cache: SessionCache, store: Arc<dyn ConversationStore>, writer: PersistQueue) -> Self {
        Self {
            cache,
            store,
            writer,
        }
    }

    /// The in-memory tier, for maintenance tasks.
    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Returns the session's cached window, loading it from the store the
    /// first time the session is seen by this process.
    pub async fn entries(&self, session_key: &str) -> Vec<HistoryEntry> {
        self.warm(session_key)
            .await
            .map(|window| window.snapshot())
            .unwrap_or_default()
    }

    /// Appends an entry to the cache and queues its durable write.
    pub async fn append(&self, session_key: &str, role: Role, content: &str) -> HistoryEntry {
        let entry_id = uuid::Uuid::new_v4().to_string();
        // Warm first so the new entry's sequence continues the stored history.
        let entry = match self.warm(session_key).await {
            Some(window) => window.append(&entry_id, role, content),
            None => self.cache.append(session_key, &entry_id, role, content),
        };
        self.writer.enqueue(NewEntry::from_entry(entry_id, session_key, &entry));
        entry
    }

    /// Returns the most recently detected name for the session.
    ///
    /// Answered from the window, which keeps the newest name fact even after
    /// its entry has been trimmed. The store is only read by the warm-up.
    pub async fn latest_name(&self, session_key: &str) -> Option<String> {
        self.warm(session_key)
            .await
            .and_then(|window| window.name())
    }

    /// Returns every durable row for the session in replay order.
    ///
    /// Entries still waiting in the write queue are not included.
    pub async fn durable_history(&self, session_key: &str) -> Result<Vec<StoredEntry>, HistoryError> {
        let store = Arc::clone(&self.store);
        let key = session_key.to_string();
        tokio::task::spawn_blocking(move || store.load_history(&key))
            .await
            .map_err(|e| HistoryError::Task(e.to_string()))?
    }

    async fn warm(&self, session_key: &str) -> Option<Arc<SessionWindow>> {
        if let Some(window) = self.cache.window(session_key) {
            if window.is_warmed() {
                return Some(window);
            }
        }

        let cache = self.cache.clone();
        let store = Arc::clone(&self.store);
        let key = session_key.to_string();
        let result = tokio::task::spawn_blocking(move || {
            cache.warm_with(&key, || {
                tracing::debug!(session_key = %key, "warming session from durable store");
                store.load_history(&key)
            })
        })
        .await;

        match result {
            Ok(Ok(window)) => Some(window),
            Ok(Err(e)) => {
                tracing::warn!(
                    session_key = %session_key,
                    error = %e,
                    "failed to load history from store, continuing without it"
                );
                self.cache.window(session_key)
            }
            Err(e) => {
                tracing::warn!(session_key = %session_key, error = %e, "history warm-up task failed");
                self.cache.window(session_key)
            }
        }
    }
}
