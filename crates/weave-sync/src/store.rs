use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Notify, watch};
use weave_store::{ConversationState, FetchState};
use weave_types::ConversationId;

/// Shared handle to one conversation's state.
///
/// Readers get whole snapshots through a `watch` channel. Writers run to
/// completion against a private copy and publish it in one step, so nobody
/// sees a partly applied update.
#[derive(Clone)]
pub struct ConversationStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    id: ConversationId,
    tx: watch::Sender<ConversationState>,
    /// Serializes writers; readers never take it.
    write: Mutex<()>,
    changed: Arc<Notify>,
}

impl ConversationStore {
    pub fn new(id: ConversationId, state: ConversationState, changed: Arc<Notify>) -> Self {
        let (tx, _) = watch::channel(state);
        Self {
            inner: Arc::new(StoreInner {
                id,
                tx,
                write: Mutex::new(()),
                changed,
            }),
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.inner.id
    }

    pub fn snapshot(&self) -> ConversationState {
        self.inner.tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ConversationState> {
        self.inner.tx.subscribe()
    }

    pub fn fetch_state(&self) -> FetchState {
        self.inner.tx.borrow().fetch
    }

    /// Apply `f` to a copy of the current state and publish the result.
    pub fn update<R>(&self, f: impl FnOnce(&mut ConversationState) -> R) -> R {
        let _guard = self
            .inner
            .write
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = self.inner.tx.borrow().clone();
        let out = f(&mut next);
        self.inner.tx.send_replace(next);
        self.inner.changed.notify_one();
        out
    }

    /// Claim the conversation's single fetch slot. Returns false if a fetch
    /// is already outstanding.
    /// Claim the conversation's fetch slot. `None` while another fetch holds it.
    pub fn begin_fetch(&self, state: FetchState) -> Option<FetchSlot> {
        let claimed = self.update(|s| {
            if !s.fetch.is_idle() {
                return false;
            }
            s.fetch = state;
            true
        });
        claimed.then(|| FetchSlot {
            store: self.clone(),
            held: true,
        })
    }
}

/// A claimed fetch slot. Dropping it without [`FetchSlot::finish`] puts the
/// conversation back to idle, so an abandoned fetch never wedges paging.
pub struct FetchSlot {
    store: ConversationStore,
    held: bool,
}

impl FetchSlot {
    /// Apply `f` and return to idle in the same update.
    pub fn finish<R>(mut self, f: impl FnOnce(&mut ConversationState) -> R) -> R {
        self.held = false;
        self.store.update(|s| {
            s.fetch = FetchState::Idle;
            f(s)
        })
    }
}

impl Drop for FetchSlot {
    fn drop(&mut self) {
        if self.held {
            self.store.update(|s| s.fetch = FetchState::Idle);
        }
    }
}
