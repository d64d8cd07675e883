//! Applies backend deltas and fetched pages to a [`ConversationState`].
//!
//! Every function here runs to completion on a `&mut ConversationState`; the
//! caller publishes the result in one step, so readers never see a delta half
//! applied.

use tracing::debug;
use weave_types::{Delta, Diff, Entry, Timestamp};

use crate::state::ConversationState;
use crate::window::Window;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Inserted(Timestamp),
    Removed(Timestamp),
    Reacted(Timestamp),
    Ignored(Ignored),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// `add` for an id already present.
    Duplicate,
    /// Delete or reaction for an id not present.
    Unknown,
}

/// How a fetched page relates to the windows already held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLoad {
    /// Window to fold the page into; `None` means the latest window.
    pub anchor: Option<Timestamp>,
    pub loaded_oldest: bool,
    pub loaded_newest: bool,
    pub latest: bool,
}

impl ConversationState {
    /// Apply one delta, using the current instant for adds without a time.
    pub fn apply(&mut self, diff: Diff) -> Applied {
        self.apply_at(diff, Timestamp::now())
    }

    pub fn apply_at(&mut self, diff: Diff, now: Timestamp) -> Applied {
        let Diff { id, delta } = diff;
        match delta {
            Delta::Add(add) => {
                if self.pact.contains(&id) {
                    self.pending.remove(&id);
                    debug!("duplicate add for {}", id);
                    return Applied::Ignored(Ignored::Duplicate);
                }

                let time = match add.time() {
                    Some(t) => t.clone(),
                    None => match self.pact.max_key() {
                        Some(max) if now <= *max => max.after(),
                        _ => now,
                    },
                };

                let entry = Entry::from_memo(id, add.into_memo());
                if let Some(evicted) = self.pact.insert(time.clone(), entry) {
                    debug!("evicted {} from occupied key {}", evicted.id, time);
                }

                self.windows = self.windows.extend(
                    Window::point(time.clone()).with_loaded(false, true),
                    None,
                    self.pact.max_key(),
                );
                Applied::Inserted(time)
            }
            Delta::Del => match self.pact.remove(&id) {
                Some((time, _)) => {
                    self.pending.remove(&id);
                    Applied::Removed(time)
                }
                None => Applied::Ignored(Ignored::Unknown),
            },
            Delta::AddFeel { ship, feel } => self.react(&id, |e| {
                e.reactions.insert(ship, feel);
            }),
            Delta::DelFeel(ship) => self.react(&id, |e| {
                e.reactions.remove(&ship);
            }),
        }
    }

    fn react(&mut self, id: &str, f: impl FnOnce(&mut Entry)) -> Applied {
        let Some(time) = self.pact.time_of(id).cloned() else {
            return Applied::Ignored(Ignored::Unknown);
        };
        if self.pact.update(id, f) {
            Applied::Reacted(time)
        } else {
            Applied::Ignored(Ignored::Unknown)
        }
    }

    /// Insert a fetched page, skipping ids already held, then extend the
    /// windows over the page's span. An empty page still flags `anchor`'s
    /// window with the loaded bits. Returns how many entries were new.
    pub fn bulk_load(&mut self, page: Vec<(Timestamp, Entry)>, load: PageLoad) -> usize {
        let mut bounds: Option<(Timestamp, Timestamp)> = None;
        let mut added = 0;

        for (time, entry) in page {
            bounds = Some(match bounds {
                None => (time.clone(), time.clone()),
                Some((lo, hi)) => (lo.min(time.clone()), hi.max(time.clone())),
            });
            if self.pact.contains(&entry.id) {
                continue;
            }
            self.pact.insert(time, entry);
            added += 1;
        }

        match bounds {
            Some((oldest, newest)) => {
                let mut window =
                    Window::new(oldest, newest).with_loaded(load.loaded_oldest, load.loaded_newest);
                window.latest = load.latest;
                self.windows =
                    self.windows
                        .extend(window, load.anchor.as_ref(), self.pact.max_key());
            }
            None => {
                self.windows = self.windows.mark_loaded(
                    load.anchor.as_ref(),
                    load.loaded_oldest,
                    load.loaded_newest,
                );
            }
        }
        added
    }
}
