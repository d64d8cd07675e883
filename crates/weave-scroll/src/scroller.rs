//! A chat list view: rows, viewport and paging for one conversation.

use tracing::debug;
use weave_store::ConversationState;
use weave_sync::{ConversationStore, Pager};
use weave_types::{ConversationId, Timestamp};

use crate::config::ScrollConfig;
use crate::engine::{Direction, Edge, ScrollEngine};
use crate::rows::{MessageRow, RowOptions, build_rows};

pub struct ChatScroller {
    conv: ConversationId,
    pager: Pager,
    store: ConversationStore,
    options: RowOptions,
    engine: ScrollEngine,
    /// Oldest first, same order as the engine's keys.
    rows: Vec<MessageRow>,
}

impl ChatScroller {
    /// Mount a view over `conv`.
    pub async fn new(
        pager: Pager,
        conv: ConversationId,
        config: ScrollConfig,
        options: RowOptions,
    ) -> Self {
        let store = pager.registry().store(&conv).await;
        let mut scroller = Self {
            conv,
            pager,
            store,
            options,
            engine: ScrollEngine::new(config),
            rows: Vec::new(),
        };
        scroller.refresh();
        scroller
    }

    /// Page in history around the entry the view was opened on, unless it is
    /// already loaded. True when the entry is present afterwards.
    pub async fn load_linked(&mut self) -> bool {
        let Some(time) = self.options.scroll_to.clone() else {
            return false;
        };
        if self.store.snapshot().pact.at(&time).is_none() {
            let count = self.pager.config().around_page_size;
            self.pager.fetch_around_time(&self.conv, count, &time).await;
            self.refresh();
        }
        self.store.snapshot().pact.at(&time).is_some()
    }

    /// Centre the entry the view was opened on. Call once the viewport has
    /// its size. `None` when there is no such entry or it is not loaded.
    pub fn jump_to_linked(&mut self) -> Option<usize> {
        let target = self.options.scroll_to.as_ref()?;
        let index = self.engine.jump_to(target);
        if index.is_none() {
            debug!("{}: linked entry {} not loaded", self.conv, target);
        }
        index
    }

    pub fn engine(&self) -> &ScrollEngine {
        &self.engine
    }

    /// For feeding measurements, viewport size and user scrolls.
    pub fn engine_mut(&mut self) -> &mut ScrollEngine {
        &mut self.engine
    }

    pub fn rows(&self) -> &[MessageRow] {
        &self.rows
    }

    /// The row shown at display index `display`.
    pub fn row(&self, display: usize) -> Option<&MessageRow> {
        let key = self.engine.key_at(display)?;
        self.rows
            .binary_search_by(|row| row.key.cmp(key))
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Rebuild rows from the store's current state.
    pub fn refresh(&mut self) {
        let keys = self.rebuild_rows();
        self.engine.set_keys(keys);
    }

    /// Like [`ChatScroller::refresh`], but a page just fetched never moves
    /// the content under the viewport.
    fn refresh_anchored(&mut self) {
        let keys = self.rebuild_rows();
        self.engine.set_keys_anchored(keys);
    }

    fn rebuild_rows(&mut self) -> Vec<Timestamp> {
        let state = self.store.snapshot();
        self.rows = build_rows(state.pact.writs(), &self.options);
        self.rows.iter().map(|row| row.key.clone()).collect()
    }

    /// With no window yet there is nothing newer to ask for.
    fn has_loaded_newest(&self, state: &ConversationState) -> bool {
        state
            .windows
            .containing(self.options.scroll_to.as_ref())
            .is_none_or(|w| w.loaded_newest)
    }

    /// One layout pass. Pages in history when the viewport has just entered
    /// an edge, and returns that edge if the fetch added entries or widened
    /// the loaded window.
    pub async fn on_layout(&mut self) -> Option<Edge> {
        self.refresh();
        let entered = self.engine.layout()?;
        if !self.engine.has_scrolled() {
            return None;
        }
        let state = self.store.snapshot();
        if !state.fetch.is_idle() {
            debug!("{}: {:?} edge reached during {:?}", self.conv, entered, state.fetch);
            return None;
        }

        let count = self.pager.config().page_size;
        let around = self.options.scroll_to.clone();
        let span_before = state.windows.containing(around.as_ref()).cloned();
        let added = match entered {
            Edge::Top => {
                self.engine.set_direction(Direction::ReverseChronological);
                match &around {
                    Some(time) => self.pager.fetch_older_around(&self.conv, count, time).await,
                    None => self.pager.fetch_older(&self.conv, count).await,
                }
            }
            Edge::Bottom if !self.has_loaded_newest(&state) => {
                self.engine.set_direction(Direction::Chronological);
                match &around {
                    Some(time) => self.pager.fetch_newer_around(&self.conv, count, time).await,
                    None => self.pager.fetch_newer(&self.conv, count).await,
                }
            }
            Edge::Bottom => return None,
        };

        // A page of entries already cached adds nothing but still widens
        // the window; keep paging past it.
        let widened = self
            .store
            .snapshot()
            .windows
            .containing(around.as_ref())
            .cloned()
            != span_before;
        debug!(
            "{}: {:?} edge fetch added entries: {}, widened window: {}",
            self.conv, entered, added, widened
        );
        self.refresh_anchored();
        if !added && !widened {
            return None;
        }
        // Still resting on the edge after the page lands: fetch again next pass.
        self.engine.rearm();
        Some(entered)
    }
}
