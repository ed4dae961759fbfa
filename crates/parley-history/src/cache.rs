//! Process-wide session cache.
//!
//! Two independent bounds apply:
//!
//! - each session keeps at most `capacity` entries; appending past that
//!   evicts from the front, oldest first;
//! - at most `max_sessions` sessions are held; the least recently used one
//!   is dropped when that is exceeded (it is reloaded from the durable store
//!   on next use).
//!
//! Appends to one session serialize on that session's mutex. Sessions do not
//! share a lock, so traffic on one key never waits on another.

use crate::store::StoredEntry;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use parley_types::{HistoryEntry, Role};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default per-session entry bound.
pub const DEFAULT_CAPACITY: usize = 50;

/// Default number of sessions kept in memory.
pub const DEFAULT_MAX_SESSIONS: u64 = 10_000;

/// The bounded, ordered history window of one session.
///
/// A window is either warmed (built from the durable rows) or unwarmed
/// (created by an append while the store could not be read). An unwarmed
/// window remembers the entry ids of its own appends so that a later
/// successful load can be merged without duplicating rows the write queue
/// has already persisted.
#[derive(Debug)]
pub struct SessionWindow {
    capacity: usize,
    state: Mutex<WindowState>,
}

#[derive(Debug, Default)]
struct WindowState {
    entries: VecDeque<HistoryEntry>,
    next_sequence: u64,
    /// Newest name fact seen, kept even after its entry is trimmed.
    name: Option<String>,
    /// `Some` until the window has been built from the durable rows.
    pending: Option<VecDeque<(String, HistoryEntry)>>,
}

impl SessionWindow {
    fn unwarmed(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(WindowState {
                pending: Some(VecDeque::new()),
                ..WindowState::default()
            }),
        }
    }

    /// Builds a window from persisted rows, keeping the most recent
    /// `capacity` of them. Sequence numbers are made strictly increasing
    /// (legacy rows may all carry 0).
    fn from_rows(capacity: usize, rows: Vec<StoredEntry>) -> Self {
        let mut state = WindowState::default();
        for row in rows {
            state.push_renumbered(capacity, row.to_entry());
        }
        Self {
            capacity,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a new entry and returns it with its assigned sequence.
    ///
    /// `entry_id` is the idempotency key its durable write is queued under.
    pub fn append(&self, entry_id: &str, role: Role, content: impl Into<String>) -> HistoryEntry {
        let mut state = self.lock();
        let entry = HistoryEntry::new(role, content, state.next_sequence);
        state.push(self.capacity, entry.clone());
        let capacity = self.capacity;
        if let Some(pending) = state.pending.as_mut() {
            pending.push_back((entry_id.to_string(), entry.clone()));
            while pending.len() > capacity {
                pending.pop_front();
            }
        }
        entry
    }

    /// Copies out the current window, oldest first.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    /// The newest name fact of the session, including one already trimmed
    /// out of the window.
    pub fn name(&self) -> Option<String> {
        self.lock().name.clone()
    }

    /// Whether the window has been built from the durable rows.
    pub fn is_warmed(&self) -> bool {
        self.lock().pending.is_none()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuilds an unwarmed window from the durable rows followed by its own
    /// appends that have not reached the store yet. No-op once warmed.
    fn merge(&self, rows: Vec<StoredEntry>) {
        let mut state = self.lock();
        let Some(pending) = state.pending.take() else {
            return;
        };

        let unsaved: Vec<HistoryEntry> = {
            let stored: HashSet<&str> = rows.iter().filter_map(|r| r.entry_id.as_deref()).collect();
            pending
                .into_iter()
                .filter(|(id, _)| !stored.contains(id.as_str()))
                .map(|(_, entry)| entry)
                .collect()
        };

        let mut rebuilt = WindowState::default();
        for entry in rows.iter().map(StoredEntry::to_entry).chain(unsaved) {
            rebuilt.push_renumbered(self.capacity, entry);
        }
        *state = rebuilt;
    }
}

impl WindowState {
    fn push(&mut self, capacity: usize, entry: HistoryEntry) {
        self.next_sequence = entry.sequence + 1;
        if entry.role == Role::Name {
            self.name = Some(entry.content.clone());
        }
        self.entries.push_back(entry);
        while self.entries.len() > capacity {
            self.entries.pop_front();
        }
    }

    fn push_renumbered(&mut self, capacity: usize, entry: HistoryEntry) {
        let sequence = entry.sequence.max(self.next_sequence);
        self.push(capacity, HistoryEntry { sequence, ..entry });
    }
}

/// In-memory mapping from session key to its recent history window.
#[derive(Clone)]
pub struct SessionCache {
    sessions: Cache<String, Arc<SessionWindow>>,
    capacity: usize,
}

impl SessionCache {
    /// Creates a cache holding `capacity` entries per session and at most
    /// `max_sessions` sessions.
    pub fn new(capacity: usize, max_sessions: u64) -> Self {
        let sessions = Cache::builder()
            .max_capacity(max_sessions)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self {
            sessions,
            capacity: capacity.max(1),
        }
    }

    /// Per-session entry bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the session's window, oldest first. Unknown keys yield an
    /// empty sequence.
    pub fn get(&self, session_key: &str) -> Vec<HistoryEntry> {
        self.sessions
            .get(session_key)
            .map(|window| window.snapshot())
            .unwrap_or_default()
    }

    /// Whether the cache currently holds a window for this key, even an
    /// empty one.
    pub fn contains(&self, session_key: &str) -> bool {
        self.sessions.contains_key(session_key)
    }

    /// Returns the session's window without touching the store.
    pub fn window(&self, session_key: &str) -> Option<Arc<SessionWindow>> {
        self.sessions.get(session_key)
    }

    /// Appends to the session's tail. A session seen for the first time gets
    /// an unwarmed window, which the next [`warm_with`](Self::warm_with)
    /// merges with the durable rows.
    pub fn append(
        &self,
        session_key: &str,
        entry_id: &str,
        role: Role,
        content: impl Into<String>,
    ) -> HistoryEntry {
        let capacity = self.capacity;
        self.sessions
            .get_with_by_ref(session_key, || Arc::new(SessionWindow::unwarmed(capacity)))
            .append(entry_id, role, content)
    }

    /// Returns the warmed window, building it with `load` if the key is
    /// absent or its window is still unwarmed. Concurrent callers for an
    /// absent key share a single `load`. A failed load changes nothing.
    pub fn warm_with<E, F>(&self, session_key: &str, load: F) -> Result<Arc<SessionWindow>, Arc<E>>
    where
        E: Send + Sync + 'static,
        F: FnOnce() -> Result<Vec<StoredEntry>, E>,
    {
        if let Some(window) = self.sessions.get(session_key) {
            if !window.is_warmed() {
                window.merge(load().map_err(Arc::new)?);
            }
            return Ok(window);
        }

        let capacity = self.capacity;
        self.sessions.try_get_with_by_ref(session_key, || {
            load().map(|rows| Arc::new(SessionWindow::from_rows(capacity, rows)))
        })
    }

    /// Number of sessions currently held. Approximate until pending
    /// maintenance has run.
    pub fn session_count(&self) -> u64 {
        self.sessions.entry_count()
    }

    /// Runs pending eviction work immediately.
    pub fn run_pending_tasks(&self) {
        self.sessions.run_pending_tasks();
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_MAX_SESSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn row(role: Role, content: &str, sequence: u64, entry_id: Option<&str>) -> StoredEntry {
        StoredEntry {
            id: sequence as i64 + 1,
            entry_id: entry_id.map(str::to_string),
            session_key: "k".to_string(),
            role,
            content: content.to_string(),
            sequence,
            timestamp: "2024-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn unknown_key_is_empty() {
        let cache = SessionCache::new(5, 10);
        assert!(cache.get("nobody").is_empty());
        assert!(!cache.contains("nobody"));
    }

    #[test]
    fn read_after_write_is_immediate() {
        let cache = SessionCache::new(5, 10);
        let entry = cache.append("+1555", "e0", Role::User, "hi");
        assert_eq!(entry.sequence, 0);
        assert_eq!(cache.get("+1555"), vec![entry]);
    }

    #[test]
    fn overflow_keeps_most_recent_in_order() {
        let capacity = 5;
        let cache = SessionCache::new(capacity, 10);
        for i in 0..12 {
            cache.append("+1555", &format!("e{i}"), Role::User, format!("m{i}"));
        }

        let window = cache.get("+1555");
        let contents: Vec<&str> = window.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["m7", "m8", "m9", "m10", "m11"]);
        let sequences: Vec<u64> = window.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn under_capacity_keeps_everything() {
        let cache = SessionCache::new(50, 10);
        for i in 0..3 {
            cache.append("k", "e", Role::Assistant, format!("{i}"));
        }
        assert_eq!(cache.get("k").len(), 3);
    }

    #[test]
    fn concurrent_appends_to_one_key_keep_sequences_dense() {
        let cache = SessionCache::new(1_000, 10);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        cache.append("shared", "e", Role::User, format!("{t}-{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let window = cache.get("shared");
        assert_eq!(window.len(), 400);
        for (expected, entry) in window.iter().enumerate() {
            assert_eq!(entry.sequence, expected as u64);
        }
    }

    #[test]
    fn warm_loads_once_and_continues_sequence() {
        let cache = SessionCache::new(3, 10);
        let loaded = vec![
            row(Role::User, "a", 4, None),
            row(Role::Assistant, "b", 5, None),
            row(Role::User, "c", 6, None),
            row(Role::Assistant, "d", 7, None),
        ];

        let window = cache
            .warm_with::<(), _>("k", || Ok(loaded.clone()))
            .unwrap();
        assert_eq!(window.len(), 3);

        let again = cache
            .warm_with::<(), _>("k", || panic!("second warm must hit the cache"))
            .unwrap();
        assert!(Arc::ptr_eq(&window, &again));
        assert!(window.is_warmed());

        let next = cache.append("k", "e8", Role::User, "e");
        assert_eq!(next.sequence, 8);
    }

    #[test]
    fn legacy_zero_sequences_are_renumbered() {
        let cache = SessionCache::new(10, 10);
        let loaded = vec![
            row(Role::User, "a", 0, None),
            row(Role::Assistant, "b", 0, None),
        ];
        cache.warm_with::<(), _>("k", || Ok(loaded)).unwrap();
        let sequences: Vec<u64> = cache.get("k").iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);
    }

    #[test]
    fn failed_warm_caches_nothing() {
        let cache = SessionCache::new(10, 10);
        let result = cache.warm_with("k", || Err("db down"));
        assert_eq!(*result.unwrap_err(), "db down");
        assert!(!cache.contains("k"));
    }

    #[test]
    fn session_count_is_bounded() {
        let cache = SessionCache::new(10, 2);
        for key in ["a", "b", "c", "d"] {
            cache.append(key, "e", Role::User, "hi");
            cache.run_pending_tasks();
        }
        assert!(cache.session_count() <= 2);
    }

    #[test]
    fn name_fact_survives_trimming() {
        let cache = SessionCache::new(2, 10);
        cache.append("k", "e0", Role::Name, "Alex");
        cache.append("k", "e1", Role::Name, "Sam");
        cache.append("k", "e2", Role::User, "one");
        cache.append("k", "e3", Role::Assistant, "two");
        let window = cache.window("k").unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window.name(), Some("Sam".to_string()));
    }

    #[test]
    fn warmed_name_comes_from_trimmed_rows() {
        let cache = SessionCache::new(1, 10);
        let loaded = vec![
            row(Role::Name, "Priya", 0, None),
            row(Role::User, "hello", 1, None),
        ];
        let window = cache.warm_with::<(), _>("k", || Ok(loaded)).unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window.name(), Some("Priya".to_string()));
    }

    #[test]
    fn append_before_warm_is_merged_without_duplicates() {
        let cache = SessionCache::new(10, 10);
        cache.append("k", "saved", Role::User, "first offline turn");
        cache.append("k", "unsaved", Role::Assistant, "second offline turn");
        assert!(!cache.window("k").unwrap().is_warmed());

        // The store now holds two older rows plus the first offline turn.
        let loaded = vec![
            row(Role::User, "old question", 0, Some("a")),
            row(Role::Assistant, "old answer", 1, Some("b")),
            row(Role::User, "first offline turn", 0, Some("saved")),
        ];
        let window = cache.warm_with::<(), _>("k", || Ok(loaded)).unwrap();
        assert!(window.is_warmed());

        let contents: Vec<String> = window.snapshot().into_iter().map(|e| e.content).collect();
        assert_eq!(
            contents,
            vec!["old question", "old answer", "first offline turn", "second offline turn"]
        );
        let sequences: Vec<u64> = window.snapshot().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);

        cache
            .warm_with::<(), _>("k", || panic!("warmed window must not reload"))
            .unwrap();
    }

    #[test]
    fn failed_merge_keeps_unwarmed_window() {
        let cache = SessionCache::new(10, 10);
        cache.append("k", "e0", Role::User, "hi");
        assert!(cache.warm_with("k", || Err("db down")).is_err());
        let window = cache.window("k").unwrap();
        assert!(!window.is_warmed());
        assert_eq!(window.len(), 1);
    }
}
