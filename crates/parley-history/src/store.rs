//! Durable conversation log.
//!
//! Rows are never updated or deleted. Every row carries a unique `entry_id`
//! so an insert that is retried after an ambiguous failure is a no-op the
//! second time.

use crate::error::HistoryError;
use parley_db::DbPool;
use parley_types::{HistoryEntry, Role};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

/// A history entry waiting to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    /// Idempotency key for the insert.
    pub entry_id: String,
    pub session_key: String,
    pub role: Role,
    pub content: String,
    pub sequence: u64,
}

impl NewEntry {
    /// Prepares an already-cached entry for persistence under `entry_id`.
    pub fn from_entry(entry_id: String, session_key: &str, entry: &HistoryEntry) -> Self {
        Self {
            entry_id,
            session_key: session_key.to_string(),
            role: entry.role,
            content: entry.content.clone(),
            sequence: entry.sequence,
        }
    }
}

/// A row read back from the durable log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredEntry {
    /// Autonumbered row id. Replay order.
    pub id: i64,
    pub entry_id: Option<String>,
    pub session_key: String,
    pub role: Role,
    pub content: String,
    pub sequence: u64,
    /// Insert time (`YYYY-MM-DD HH:MM:SS`, UTC).
    pub timestamp: String,
}

impl StoredEntry {
    pub fn to_entry(&self) -> HistoryEntry {
        HistoryEntry::new(self.role, self.content.clone(), self.sequence)
    }
}

/// Durable, append-only storage of history entries keyed by session.
///
/// Implementations are blocking; async callers go through
/// `tokio::task::spawn_blocking`.
pub trait ConversationStore: Send + Sync + 'static {
    /// Persists one entry. Returns `false` when the entry id was already
    /// stored.
    fn append(&self, entry: &NewEntry) -> Result<bool, HistoryError>;

    /// Returns every row for a session in insertion order.
    fn load_history(&self, session_key: &str) -> Result<Vec<StoredEntry>, HistoryError>;
}

/// [`ConversationStore`] backed by the `call_history` SQLite table.
#[derive(Clone)]
pub struct SqliteConversationStore {
    pool: DbPool,
}

impl SqliteConversationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ConversationStore for SqliteConversationStore {
    fn append(&self, entry: &NewEntry) -> Result<bool, HistoryError> {
        let conn = self.pool.get()?;
        insert_entry(&conn, entry)
    }

    fn load_history(&self, session_key: &str) -> Result<Vec<StoredEntry>, HistoryError> {
        let conn = self.pool.get()?;
        list_entries(&conn, session_key)
    }
}

/// Inserts one row, ignoring a duplicate `entry_id`.
pub fn insert_entry(conn: &Connection, entry: &NewEntry) -> Result<bool, HistoryError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO call_history (entry_id, phone_number, role, message, sequence)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.entry_id,
            entry.session_key,
            entry.role.as_str(),
            entry.content,
            entry.sequence as i64,
        ],
    )?;
    Ok(inserted == 1)
}

/// Lists a session's rows ordered by id ascending.
pub fn list_entries(conn: &Connection, session_key: &str) -> Result<Vec<StoredEntry>, HistoryError> {
    let mut stmt = conn.prepare(
        "SELECT id, entry_id, phone_number, role, message, sequence, timestamp
         FROM call_history WHERE phone_number = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map([session_key], map_row_to_entry)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

fn map_row_to_entry(row: &Row) -> rusqlite::Result<StoredEntry> {
    let role_str: String = row.get(3)?;
    let role: Role = role_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let sequence: i64 = row.get(5)?;

    Ok(StoredEntry {
        id: row.get(0)?,
        entry_id: row.get(1)?,
        session_key: row.get(2)?,
        role,
        content: row.get(4)?,
        sequence: sequence.max(0) as u64,
        timestamp: row.get(6)?,
    })
}
