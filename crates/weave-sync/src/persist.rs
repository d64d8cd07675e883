//! Debounced snapshot writer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use weave_db::SnapshotDb;

use crate::error::SyncError;
use crate::registry::ConversationRegistry;

/// Background task that writes the registry to disk after changes settle.
/// Shutting it down flushes once more before the task exits.
pub struct Persister {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Persister {
    pub fn spawn(registry: ConversationRegistry, db: Arc<SnapshotDb>, debounce: Duration) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(registry, db, debounce, cancel.clone()));
        Self { cancel, task }
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Persister task failed: {}", e);
        }
    }
}

async fn run(
    registry: ConversationRegistry,
    db: Arc<SnapshotDb>,
    debounce: Duration,
    cancel: CancellationToken,
) {
    let changed = registry.changed();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = changed.notified() => {}
        }

        // Let a burst of changes settle into one write.
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(debounce) => {}
        }

        if let Err(e) = flush(&registry, &db).await {
            error!("Snapshot flush failed: {}", e);
        }
    }

    match flush(&registry, &db).await {
        Ok(()) => info!("Final snapshot flushed"),
        Err(e) => error!("Final snapshot flush failed: {}", e),
    }
}

/// Write the registry's current snapshot.
pub async fn flush(registry: &ConversationRegistry, db: &Arc<SnapshotDb>) -> Result<(), SyncError> {
    let snapshot = registry.snapshot().await;
    let db = db.clone();
    let conversations = snapshot.timelines.len();
    tokio::task::spawn_blocking(move || db.save_snapshot(&snapshot)).await??;
    debug!("Flushed snapshot of {} conversations", conversations);
    Ok(())
}
