//! Background persistence of history entries.
//!
//! Request handlers never wait on the database: they push a [`NewEntry`]
//! onto a bounded queue and move on. A single [`PersistWorker`] drains the
//! queue in order, retrying failed inserts a bounded number of times. Retries
//! are safe because inserts are idempotent on `entry_id`.

use crate::store::{ConversationStore, NewEntry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Default queue depth.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_024;

/// Default number of insert attempts per entry.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Sending half of the write queue. Cheap to clone.
#[derive(Clone)]
pub struct PersistQueue {
    tx: mpsc::Sender<NewEntry>,
}

/// Drains the write queue into a [`ConversationStore`].
pub struct PersistWorker {
    rx: mpsc::Receiver<NewEntry>,
    store: Arc<dyn ConversationStore>,
    max_attempts: u32,
    backoff: Duration,
}

/// Creates a write queue and the worker that drains it.
///
/// The worker must be driven (usually `tokio::spawn(worker.run())`); it
/// exits once every [`PersistQueue`] clone has been dropped and the queue is
/// empty.
pub fn persist_queue(
    store: Arc<dyn ConversationStore>,
    capacity: usize,
    max_attempts: u32,
) -> (PersistQueue, PersistWorker) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        PersistQueue { tx },
        PersistWorker {
            rx,
            store,
            max_attempts: max_attempts.max(1),
            backoff: RETRY_BACKOFF,
        },
    )
}

impl PersistQueue {
    /// Queues an entry for persistence without waiting.
    ///
    /// Returns `false` if the entry was dropped because the queue is full or
    /// the worker has stopped.
    pub fn enqueue(&self, entry: NewEntry) -> bool {
        match self.tx.try_send(entry) {
            Ok(()) => true,
            Err(TrySendError::Full(entry)) => {
                tracing::warn!(
                    session_key = %entry.session_key,
                    role = %entry.role,
                    "history write queue full, dropping durable write"
                );
                false
            }
            Err(TrySendError::Closed(entry)) => {
                tracing::warn!(
                    session_key = %entry.session_key,
                    role = %entry.role,
                    "history writer stopped, dropping durable write"
                );
                false
            }
        }
    }
}

impl PersistWorker {
    /// Overrides the delay between retries.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Runs until the queue is closed and drained.
    pub async fn run(mut self) {
        tracing::info!(max_attempts = self.max_attempts, "starting history writer");
        while let Some(entry) = self.rx.recv().await {
            self.persist(entry).await;
        }
        tracing::info!("history writer drained and stopped");
    }

    async fn persist(&self, entry: NewEntry) {
        for attempt in 1..=self.max_attempts {
            let store = Arc::clone(&self.store);
            let pending = entry.clone();
            let result = tokio::task::spawn_blocking(move || store.append(&pending)).await;

            let error = match result {
                Ok(Ok(inserted)) => {
                    if !inserted {
                        tracing::debug!(entry_id = %entry.entry_id, "history entry already stored");
                    }
                    return;
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("store task failed: {e}"),
            };

            if attempt == self.max_attempts {
                tracing::error!(
                    session_key = %entry.session_key,
                    entry_id = %entry.entry_id,
                    attempts = attempt,
                    error = %error,
                    "giving up on durable history write"
                );
                return;
            }

            tracing::warn!(
                session_key = %entry.session_key,
                attempt,
                error = %error,
                "durable history write failed, retrying"
            );
            tokio::time::sleep(self.backoff * attempt).await;
        }
    }
}
