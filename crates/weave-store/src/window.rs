//! Fetched-range bookkeeping.
//!
//! A window is a span of timeline keys known to have no server-side gaps. The
//! set is kept sorted newest first, with no two windows overlapping or
//! touching.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use weave_types::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub oldest: Timestamp,
    pub newest: Timestamp,
    /// `oldest` is the start of the conversation's history.
    pub loaded_oldest: bool,
    /// `newest` is the current end of the conversation's history.
    pub loaded_newest: bool,
    pub latest: bool,
}

impl Window {
    pub fn new(oldest: Timestamp, newest: Timestamp) -> Self {
        Self {
            oldest,
            newest,
            loaded_oldest: false,
            loaded_newest: false,
            latest: false,
        }
    }

    pub fn point(time: Timestamp) -> Self {
        Self::new(time.clone(), time)
    }

    pub fn with_loaded(mut self, oldest: bool, newest: bool) -> Self {
        self.loaded_oldest = oldest;
        self.loaded_newest = newest;
        self
    }

    pub fn as_latest(mut self) -> Self {
        self.latest = true;
        self
    }

    pub fn contains(&self, time: &Timestamp) -> bool {
        *time >= self.oldest && *time <= self.newest
    }

    /// Grow to cover `other`. Each loaded flag follows the window that
    /// supplies the resulting bound; `other` wins ties.
    fn widen(&mut self, other: Window) {
        if other.newest >= self.newest {
            self.newest = other.newest;
            self.loaded_newest = other.loaded_newest;
        }
        if other.oldest <= self.oldest {
            self.oldest = other.oldest;
            self.loaded_oldest = other.loaded_oldest;
        }
        self.latest |= other.latest;
    }
}

/// Coalesce overlapping or touching windows into a disjoint set, newest first.
pub fn merge(mut windows: Vec<Window>) -> Vec<Window> {
    windows.sort_by(|a, b| {
        b.newest
            .cmp(&a.newest)
            .then_with(|| b.oldest.cmp(&a.oldest))
    });

    let mut out: Vec<Window> = Vec::with_capacity(windows.len());
    for w in windows {
        match out.last_mut() {
            Some(last) if w.newest >= last.oldest => {
                match w.oldest.cmp(&last.oldest) {
                    Ordering::Less => {
                        last.oldest = w.oldest;
                        last.loaded_oldest = w.loaded_oldest;
                    }
                    Ordering::Equal => last.loaded_oldest |= w.loaded_oldest,
                    Ordering::Greater => {}
                }
                if w.newest == last.newest {
                    last.loaded_newest |= w.loaded_newest;
                }
                last.latest |= w.latest;
            }
            _ => out.push(w),
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSet {
    windows: Vec<Window>,
}

impl WindowSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_windows(windows: Vec<Window>) -> Self {
        Self {
            windows: merge(windows),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Newest first.
    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn latest(&self) -> Option<&Window> {
        self.windows.iter().find(|w| w.latest)
    }

    /// The window holding `time`, or the latest window when `time` is `None`.
    pub fn containing(&self, time: Option<&Timestamp>) -> Option<&Window> {
        match time {
            Some(t) => self.windows.iter().find(|w| w.contains(t)),
            None => self.latest(),
        }
    }

    pub fn covers(&self, time: &Timestamp) -> bool {
        self.windows.iter().any(|w| w.contains(time))
    }

    /// Fold `window` into the window holding `anchor` (the latest window when
    /// `anchor` is `None`), or add it alongside. `max_key` is the timeline's
    /// greatest key and decides which window ends up flagged latest.
    pub fn extend(
        &self,
        window: Window,
        anchor: Option<&Timestamp>,
        max_key: Option<&Timestamp>,
    ) -> WindowSet {
        let mut windows = self.windows.clone();
        let current = match anchor {
            Some(t) => windows.iter().position(|w| w.contains(t)),
            None => windows.iter().position(|w| w.latest),
        };

        match current {
            Some(i) => windows[i].widen(window),
            None => {
                let mut window = window;
                // With nothing to attach to, the new span is the frontier.
                if anchor.is_none() && self.latest().is_none() {
                    window.latest = true;
                }
                windows.push(window);
            }
        }

        let mut set = WindowSet {
            windows: merge(windows),
        };
        set.heal_latest(max_key);
        set
    }

    /// Mark the window holding `anchor` (or the latest) as reaching the start
    /// or end of history.
    pub fn mark_loaded(&self, anchor: Option<&Timestamp>, oldest: bool, newest: bool) -> WindowSet {
        let mut set = self.clone();
        let idx = match anchor {
            Some(t) => set.windows.iter().position(|w| w.contains(t)),
            None => set.windows.iter().position(|w| w.latest),
        };
        if let Some(w) = idx.map(|i| &mut set.windows[i]) {
            w.loaded_oldest |= oldest;
            w.loaded_newest |= newest;
        }
        set
    }

    /// Move the latest flag to the window holding `max_key`, falling back to
    /// the newest window. A window that loses the flag no longer reaches the
    /// end of history. Does nothing when no window is flagged.
    fn heal_latest(&mut self, max_key: Option<&Timestamp>) {
        if !self.windows.iter().any(|w| w.latest) {
            return;
        }
        let target = max_key
            .and_then(|k| self.windows.iter().position(|w| w.contains(k)))
            .unwrap_or(0);
        for (i, w) in self.windows.iter_mut().enumerate() {
            let keep = i == target;
            if w.latest && !keep {
                w.loaded_newest = false;
            }
            w.latest = keep;
        }
    }
}
