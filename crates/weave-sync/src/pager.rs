//! Page requests against the backend, one outstanding fetch per conversation.
//!
//! Every public fetch returns whether it added entries. Failures are logged
//! and reported as `false`; the next edge crossing in the scroller retries.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use weave_store::{FetchState, PageLoad};
use weave_types::api::{WritEntry, parse_page};
use weave_types::models::is_entry_id;
use weave_types::{ConversationId, Entry, ScryPath, Timestamp};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::registry::ConversationRegistry;
use crate::store::{ConversationStore, FetchSlot};
use crate::subscription::{self, SubscriptionHandle};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Older,
    Newer,
}

type Page = Vec<(Timestamp, Entry)>;

#[derive(Clone)]
pub struct Pager {
    transport: Arc<dyn Transport>,
    registry: ConversationRegistry,
    config: SyncConfig,
    subscriptions: Arc<Mutex<HashMap<ConversationId, SubscriptionHandle>>>,
}

impl Pager {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: ConversationRegistry,
        config: SyncConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            config,
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Load the newest page and start live updates. The resulting window is
    /// the latest one and reaches the end of history.
    pub async fn initialize(&self, conv: &ConversationId) -> bool {
        let store = self.registry.store(conv).await;
        let Some(slot) = store.begin_fetch(FetchState::LoadingNewer) else {
            debug!("{}: initialize skipped, fetch in flight", conv);
            return false;
        };

        let count = self.config.initial_page_size;
        let added = match self.scry_page(conv, &ScryPath::Newest { count }).await {
            Ok(page) => slot.finish(|s| {
                let bounds = page.first().map(|p| &p.0).zip(page.last().map(|p| &p.0));
                let unchanged = match (s.windows.latest(), bounds) {
                    (Some(w), Some((lo, hi))) => w.oldest == *lo && w.newest == *hi,
                    _ => false,
                };
                if unchanged {
                    return 0;
                }
                let load = PageLoad {
                    anchor: bounds.map(|(lo, _)| lo.clone()),
                    loaded_oldest: page.len() < count,
                    loaded_newest: true,
                    latest: true,
                };
                s.bulk_load(page, load)
            }),
            Err(e) => {
                warn!("{}: initial fetch failed: {}", conv, e);
                0
            }
        };

        self.ensure_subscribed(conv, store).await;
        added > 0
    }

    pub async fn fetch_older(&self, conv: &ConversationId, count: usize) -> bool {
        self.fetch_page(conv, count, None, Direction::Older).await
    }

    pub async fn fetch_newer(&self, conv: &ConversationId, count: usize) -> bool {
        self.fetch_page(conv, count, None, Direction::Newer).await
    }

    /// Like [`Pager::fetch_older`], but extends the window holding `around`.
    pub async fn fetch_older_around(
        &self,
        conv: &ConversationId,
        count: usize,
        around: &Timestamp,
    ) -> bool {
        self.fetch_page(conv, count, Some(around), Direction::Older)
            .await
    }

    pub async fn fetch_newer_around(
        &self,
        conv: &ConversationId,
        count: usize,
        around: &Timestamp,
    ) -> bool {
        self.fetch_page(conv, count, Some(around), Direction::Newer)
            .await
    }

    async fn fetch_page(
        &self,
        conv: &ConversationId,
        count: usize,
        around: Option<&Timestamp>,
        dir: Direction,
    ) -> bool {
        let store = self.registry.store(conv).await;

        let (anchor, other_loaded) = {
            let state = store.snapshot();
            if !state.fetch.is_idle() {
                debug!("{}: {:?} fetch skipped, {:?} in flight", conv, dir, state.fetch);
                return false;
            }
            if state.is_empty() {
                debug!("{}: {:?} fetch skipped, timeline not initialized", conv, dir);
                return false;
            }
            let Some(window) = state.windows.containing(around) else {
                debug!("{}: {:?} fetch skipped, no window", conv, dir);
                return false;
            };
            let (loaded, other) = match dir {
                Direction::Older => (window.loaded_oldest, window.loaded_newest),
                Direction::Newer => (window.loaded_newest, window.loaded_oldest),
            };
            if loaded {
                debug!("{}: {:?} fetch skipped, history boundary reached", conv, dir);
                return false;
            }
            let mut span = state.pact.writs().range(&window.oldest, &window.newest);
            let edge = match dir {
                Direction::Older => span.next(),
                Direction::Newer => span.next_back(),
            };
            match edge {
                Some((key, _)) => (key.clone(), other),
                None => return false,
            }
        };

        let claim = match dir {
            Direction::Older => FetchState::LoadingOlder,
            Direction::Newer => FetchState::LoadingNewer,
        };
        let Some(slot) = store.begin_fetch(claim) else {
            debug!("{}: {:?} fetch lost the race for the fetch slot", conv, dir);
            return false;
        };

        let path = match dir {
            Direction::Older => ScryPath::Older {
                anchor: anchor.clone(),
                count,
            },
            Direction::Newer => ScryPath::Newer {
                anchor: anchor.clone(),
                count,
            },
        };

        match self.scry_page(conv, &path).await {
            Ok(page) => slot.finish(|s| {
                // Only a short page proves the boundary; a full page of
                // entries we already hold just moves the window.
                let reached = page.len() < count;
                let load = match dir {
                    Direction::Older => PageLoad {
                        anchor: Some(anchor),
                        loaded_oldest: reached,
                        loaded_newest: other_loaded,
                        latest: false,
                    },
                    Direction::Newer => PageLoad {
                        anchor: Some(anchor),
                        loaded_oldest: other_loaded,
                        loaded_newest: reached,
                        latest: false,
                    },
                };
                s.bulk_load(page, load) > 0
            }),
            Err(e) => {
                warn!("{}: {:?} fetch failed: {}", conv, dir, e);
                false
            }
        }
    }

    /// Load a page centred on `time` as its own window.
    pub async fn fetch_around_time(
        &self,
        conv: &ConversationId,
        count: usize,
        time: &Timestamp,
    ) -> bool {
        let store = self.registry.store(conv).await;
        let Some(slot) = store.begin_fetch(FetchState::LoadingAround) else {
            debug!("{}: around fetch skipped, fetch in flight", conv);
            return false;
        };
        let path = ScryPath::AroundTime {
            time: time.clone(),
            count,
        };
        let result = self.scry_page(conv, &path).await;
        apply_around(conv, slot, result, Some(time.clone()))
    }

    /// Load a page centred on the entry with `id` (`<ship>/<ud>`).
    pub async fn fetch_around_id(&self, conv: &ConversationId, count: usize, id: &str) -> bool {
        if !is_entry_id(id) {
            warn!("{}: invalid entry id {:?}", conv, id);
            return false;
        }
        let store = self.registry.store(conv).await;
        let Some(slot) = store.begin_fetch(FetchState::LoadingAround) else {
            debug!("{}: around fetch skipped, fetch in flight", conv);
            return false;
        };
        let path = ScryPath::AroundId {
            id: id.to_string(),
            count,
        };
        let result = self.scry_page(conv, &path).await;
        let anchor = result
            .as_ref()
            .ok()
            .and_then(|page| page.iter().find(|(_, e)| e.id == id))
            .map(|(t, _)| t.clone());
        match anchor {
            Some(anchor) => apply_around(conv, slot, result, Some(anchor)),
            None => {
                if let Err(e) = &result {
                    warn!("{}: around-id fetch failed: {}", conv, e);
                } else {
                    debug!("{}: {} not in around page", conv, id);
                }
                false
            }
        }
    }

    /// Load a single entry by id into its own window.
    pub async fn fetch_entry(&self, conv: &ConversationId, id: &str) -> bool {
        if !is_entry_id(id) {
            warn!("{}: invalid entry id {:?}", conv, id);
            return false;
        }
        let store = self.registry.store(conv).await;
        let Some(slot) = store.begin_fetch(FetchState::LoadingAround) else {
            debug!("{}: entry fetch skipped, fetch in flight", conv);
            return false;
        };
        let path = conv.scry(&ScryPath::WritId { id: id.to_string() });
        let result = match self.transport.scry(conv.app(), &path).await {
            Ok(json) => serde_json::from_value::<WritEntry>(json)
                .map(|e| vec![(e.time, Entry::from(e.writ))])
                .map_err(SyncError::from),
            Err(e) => Err(e.into()),
        };
        let anchor = result
            .as_ref()
            .ok()
            .and_then(|page| page.first())
            .map(|(t, _)| t.clone());
        apply_around(conv, slot, result, anchor)
    }

    /// Stop live updates for `conv`.
    pub async fn unsubscribe(&self, conv: &ConversationId) {
        let handle = self.subscriptions.lock().await.remove(conv);
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    pub async fn is_subscribed(&self, conv: &ConversationId) -> bool {
        self.subscriptions
            .lock()
            .await
            .get(conv)
            .is_some_and(SubscriptionHandle::is_running)
    }

    async fn ensure_subscribed(&self, conv: &ConversationId, store: ConversationStore) {
        let mut subs = self.subscriptions.lock().await;
        if subs.get(conv).is_some_and(SubscriptionHandle::is_running) {
            return;
        }
        match subscription::subscribe(self.transport.clone(), store).await {
            Ok(handle) => {
                subs.insert(conv.clone(), handle);
            }
            Err(e) => warn!("{}: subscribe failed: {}", conv, e),
        }
    }

    async fn scry_page(&self, conv: &ConversationId, path: &ScryPath) -> Result<Page, SyncError> {
        let json = self.transport.scry(conv.app(), &conv.scry(path)).await?;
        let page = parse_page(&json)?;
        Ok(page
            .into_iter()
            .map(|(time, writ)| (time, Entry::from(writ)))
            .collect())
    }
}

/// Consumes `slot`, so every path leaves the conversation idle.
fn apply_around(
    conv: &ConversationId,
    slot: FetchSlot,
    result: Result<Page, SyncError>,
    anchor: Option<Timestamp>,
) -> bool {
    match result {
        Ok(page) if !page.is_empty() => slot.finish(|s| {
            let load = PageLoad {
                anchor,
                ..PageLoad::default()
            };
            s.bulk_load(page, load) > 0
        }),
        Ok(_) => {
            debug!("{}: around page empty", conv);
            false
        }
        Err(e) => {
            warn!("{}: around fetch failed: {}", conv, e);
            false
        }
    }
}
