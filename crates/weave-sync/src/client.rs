//! Wiring for a running cache: snapshot storage, registry, pager, actions
//! and the background persister.

use std::sync::Arc;

use tracing::info;
use weave_db::SnapshotDb;

use crate::actions::Actions;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::pager::Pager;
use crate::persist::Persister;
use crate::registry::ConversationRegistry;
use crate::transport::Transport;

pub struct Client {
    pub registry: ConversationRegistry,
    pub pager: Pager,
    pub actions: Actions,
    persister: Persister,
}

impl Client {
    /// Open the snapshot at `config.db_path`, restore it and start persisting.
    pub async fn start(transport: Arc<dyn Transport>, config: SyncConfig) -> Result<Self, SyncError> {
        let path = config.db_path.clone();
        let db = tokio::task::spawn_blocking(move || SnapshotDb::open(&path)).await??;
        Ok(Self::with_db(transport, config, Arc::new(db)).await)
    }

    pub async fn with_db(transport: Arc<dyn Transport>, config: SyncConfig, db: Arc<SnapshotDb>) -> Self {
        let registry = ConversationRegistry::load(db.clone()).await;
        let persister = Persister::spawn(registry.clone(), db, config.persist_debounce);
        let actions = Actions::new(transport.clone(), registry.clone());
        let pager = Pager::new(transport, registry.clone(), config);
        info!("Sync client started");

        Self {
            registry,
            pager,
            actions,
            persister,
        }
    }

    /// Drop live subscriptions and flush the cache to disk.
    pub async fn shutdown(self) {
        for conv in self.registry.conversations().await {
            self.pager.unsubscribe(&conv).await;
        }
        self.persister.shutdown().await;
        info!("Sync client stopped");
    }
}
