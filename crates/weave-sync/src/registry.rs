use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};
use tracing::{error, info};
use weave_db::{Snapshot, SnapshotDb};
use weave_store::{ConversationState, Pact};
use weave_types::{Brief, ConversationId, ConversationMeta};

use crate::store::ConversationStore;

/// Owns one store per conversation plus the per-conversation briefs and
/// stash. Passed explicitly to whatever needs conversation state.
#[derive(Clone)]
pub struct ConversationRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// Created on first reference, kept until the registry is dropped.
    stores: RwLock<HashMap<ConversationId, ConversationStore>>,

    briefs: RwLock<BTreeMap<ConversationId, Brief>>,

    stash: RwLock<BTreeMap<ConversationId, ConversationMeta>>,

    /// Signalled after any change worth persisting.
    changed: Arc<Notify>,
}

impl Default for ConversationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                stores: RwLock::new(HashMap::new()),
                briefs: RwLock::new(BTreeMap::new()),
                stash: RwLock::new(BTreeMap::new()),
                changed: Arc::new(Notify::new()),
            }),
        }
    }

    /// The store for `id`, created empty if this is the first reference.
    pub async fn store(&self, id: &ConversationId) -> ConversationStore {
        if let Some(store) = self.inner.stores.read().await.get(id) {
            return store.clone();
        }
        let mut stores = self.inner.stores.write().await;
        stores
            .entry(id.clone())
            .or_insert_with(|| {
                ConversationStore::new(
                    id.clone(),
                    ConversationState::new(),
                    self.inner.changed.clone(),
                )
            })
            .clone()
    }

    pub async fn get(&self, id: &ConversationId) -> Option<ConversationStore> {
        self.inner.stores.read().await.get(id).cloned()
    }

    pub async fn conversations(&self) -> Vec<ConversationId> {
        self.inner.stores.read().await.keys().cloned().collect()
    }

    pub fn changed(&self) -> Arc<Notify> {
        self.inner.changed.clone()
    }

    // -- Briefs --

    pub async fn brief(&self, id: &ConversationId) -> Option<Brief> {
        self.inner.briefs.read().await.get(id).cloned()
    }

    pub async fn set_brief(&self, id: ConversationId, brief: Brief) {
        self.inner.briefs.write().await.insert(id, brief);
        self.inner.changed.notify_one();
    }

    pub async fn update_brief(&self, id: &ConversationId, f: impl FnOnce(&mut Brief)) {
        let mut briefs = self.inner.briefs.write().await;
        f(briefs.entry(id.clone()).or_default());
        drop(briefs);
        self.inner.changed.notify_one();
    }

    // -- Stash --

    pub async fn meta(&self, id: &ConversationId) -> ConversationMeta {
        self.inner
            .stash
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn set_meta(&self, id: ConversationId, meta: ConversationMeta) {
        self.inner.stash.write().await.insert(id, meta);
        self.inner.changed.notify_one();
    }

    // -- Persistence --

    /// Everything worth writing to disk right now.
    pub async fn snapshot(&self) -> Snapshot {
        let stores: Vec<ConversationStore> =
            self.inner.stores.read().await.values().cloned().collect();

        let mut timelines = BTreeMap::new();
        for store in stores {
            let state = store.snapshot();
            let pairs = state
                .pact
                .writs()
                .iter()
                .map(|(t, e)| (t.clone(), e.as_ref().clone()))
                .collect();
            timelines.insert(store.id().clone(), pairs);
        }

        Snapshot {
            briefs: self.inner.briefs.read().await.clone(),
            stash: self.inner.stash.read().await.clone(),
            timelines,
        }
    }

    /// Replace all state with `snapshot`. Timelines are rebuilt by replaying
    /// their pairs, which also rebuilds the id index and reply links.
    pub async fn restore(&self, snapshot: Snapshot) {
        let mut stores = self.inner.stores.write().await;
        stores.clear();
        for (id, pairs) in snapshot.timelines {
            let state = ConversationState::with_pact(Pact::from_pairs(pairs));
            stores.insert(
                id.clone(),
                ConversationStore::new(id, state, self.inner.changed.clone()),
            );
        }
        let restored = stores.len();
        drop(stores);

        *self.inner.briefs.write().await = snapshot.briefs;
        *self.inner.stash.write().await = snapshot.stash;
        info!("Restored {} conversations from snapshot", restored);
    }

    /// Load the stored snapshot. Any failure leaves an empty registry.
    pub async fn load(db: Arc<SnapshotDb>) -> Self {
        let registry = Self::new();
        let loaded = tokio::task::spawn_blocking(move || db.load_snapshot()).await;
        match loaded {
            Ok(Ok(snapshot)) => registry.restore(snapshot).await,
            Ok(Err(e)) => error!("Failed to load snapshot, starting empty: {:#}", e),
            Err(e) => error!("Snapshot load task failed, starting empty: {}", e),
        }
        registry
    }
}
