//! Background tasks for the Parley server.
//!
//! Includes:
//! - Draining the durable history write queue.
//! - Periodic session cache housekeeping.

use parley_history::{PersistWorker, SessionCache};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Spawns the history writer. The task ends once every queue handle is
/// dropped and pending writes are flushed.
pub fn start_history_writer(worker: PersistWorker) -> JoinHandle<()> {
    tokio::spawn(worker.run())
}

/// Starts the session cache housekeeping task.
///
/// Runs pending LRU evictions even when the cache is idle and logs how many
/// sessions are resident.
pub async fn start_cache_maintenance(cache: SessionCache, interval_seconds: u64) {
    if interval_seconds == 0 {
        tracing::warn!("cache maintenance disabled (interval=0)");
        return;
    }

    let interval = Duration::from_secs(interval_seconds);
    tracing::info!(interval_seconds, "starting session cache maintenance task");

    loop {
        sleep(interval).await;

        let cache = cache.clone();
        match tokio::task::spawn_blocking(move || {
            cache.run_pending_tasks();
            cache.session_count()
        })
        .await
        {
            Ok(sessions) => tracing::debug!(sessions, "session cache maintenance complete"),
            Err(e) => tracing::error!("cache maintenance join error: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_interval_returns_immediately() {
        let cache = SessionCache::new(4, 4);
        tokio::time::timeout(Duration::from_secs(1), start_cache_maintenance(cache, 0))
            .await
            .expect("disabled task should return");
    }
}
