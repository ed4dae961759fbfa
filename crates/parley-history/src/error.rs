//! Error types for the history layer.

/// Errors that can occur while reading or writing conversation history.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// A database operation failed.
    #[error("history database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No pooled connection could be obtained.
    #[error("history pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A blocking store task panicked or was cancelled.
    #[error("history task failed: {0}")]
    Task(String),
}
