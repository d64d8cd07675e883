//! Timeline plus id index for one conversation.

use std::sync::Arc;

use imbl::{HashMap, OrdSet};
use weave_types::{Entry, Timestamp};

use crate::timeline::TimelineMap;

/// The timeline of one conversation together with its id index.
///
/// Every loaded reply is listed in its loaded root's `replied`. Replies that
/// arrive before their root wait in `orphans` and are attached when the root
/// shows up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pact {
    writs: TimelineMap<Arc<Entry>>,
    index: HashMap<String, Timestamp>,
    orphans: HashMap<String, OrdSet<String>>,
}

impl Pact {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored pairs, restoring the index and reply links.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Timestamp, Entry)>) -> Self {
        let mut pact = Self::new();
        for (time, entry) in pairs {
            pact.insert(time, entry);
        }
        pact
    }

    pub fn len(&self) -> usize {
        self.writs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writs.is_empty()
    }

    pub fn writs(&self) -> &TimelineMap<Arc<Entry>> {
        &self.writs
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn time_of(&self, id: &str) -> Option<&Timestamp> {
        self.index.get(id)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Entry>> {
        self.index.get(id).and_then(|t| self.writs.get(t))
    }

    pub fn at(&self, time: &Timestamp) -> Option<&Arc<Entry>> {
        self.writs.get(time)
    }

    /// The greatest entry.
    pub fn latest(&self) -> Option<(&Timestamp, &Arc<Entry>)> {
        self.writs.last()
    }

    pub fn max_key(&self) -> Option<&Timestamp> {
        self.writs.max()
    }

    /// Loaded replies to `id`, oldest first.
    pub fn replies_of(&self, id: &str) -> Vec<(Timestamp, Arc<Entry>)> {
        let Some(root) = self.get(id) else {
            return Vec::new();
        };
        let mut replies: Vec<_> = root
            .replied
            .iter()
            .filter_map(|r| {
                let time = self.index.get(r)?;
                Some((time.clone(), self.writs.get(time)?.clone()))
            })
            .collect();
        replies.sort_by(|a, b| a.0.cmp(&b.0));
        replies
    }

    /// Replies waiting for `root` to load.
    pub fn orphans_of(&self, root: &str) -> Option<&OrdSet<String>> {
        self.orphans.get(root)
    }

    /// Insert `entry` at `time`. Whatever occupied the slot, or an older copy
    /// of the same id, is evicted first and returned.
    pub fn insert(&mut self, time: Timestamp, mut entry: Entry) -> Option<Arc<Entry>> {
        let evicted = match self.writs.get(&time).map(|e| e.id.clone()) {
            Some(prev) => self.remove(&prev).map(|(_, e)| e),
            None => None,
        };
        if self.index.contains_key(&entry.id) {
            self.remove(&entry.id);
        }

        if let Some(waiting) = self.orphans.remove(&entry.id) {
            for reply in waiting.iter() {
                entry.add_reply(reply);
            }
        }

        if let Some(root) = entry.reply_root.clone() {
            if !self.update(&root, |r| {
                r.add_reply(&entry.id);
            }) {
                let mut waiting = self.orphans.get(&root).cloned().unwrap_or_default();
                waiting.insert(entry.id.clone());
                self.orphans.insert(root, waiting);
            }
        }

        self.index.insert(entry.id.clone(), time.clone());
        self.writs.insert(time, Arc::new(entry));
        evicted
    }

    /// Remove the entry with `id`, unlinking it from its root. Its own loaded
    /// replies go back to waiting for it.
    pub fn remove(&mut self, id: &str) -> Option<(Timestamp, Arc<Entry>)> {
        let time = self.index.remove(id)?;
        let entry = self.writs.remove(&time)?;

        if let Some(root) = &entry.reply_root {
            let linked = self.update(root, |r| {
                r.remove_reply(id);
            });
            if !linked {
                if let Some(waiting) = self.orphans.get_mut(root) {
                    waiting.remove(id);
                    if waiting.is_empty() {
                        self.orphans.remove(root);
                    }
                }
            }
        }

        let loaded: OrdSet<String> = entry
            .replied
            .iter()
            .filter(|r| {
                self.get(r)
                    .is_some_and(|reply| reply.reply_root.as_deref() == Some(id))
            })
            .cloned()
            .collect();
        if !loaded.is_empty() {
            self.orphans.insert(id.to_string(), loaded);
        }

        Some((time, entry))
    }

    /// Copy-on-write edit of the entry with `id`. Returns false if absent.
    pub fn update(&mut self, id: &str, f: impl FnOnce(&mut Entry)) -> bool {
        let Some(time) = self.index.get(id) else {
            return false;
        };
        match self.writs.get_mut(time) {
            Some(entry) => {
                f(Arc::make_mut(entry));
                true
            }
            None => false,
        }
    }

    /// Every loaded reply appears in its loaded root's `replied`.
    pub fn replies_linked(&self) -> bool {
        self.writs.values().all(|e| match &e.reply_root {
            Some(root) => self
                .get(root)
                .is_none_or(|r| r.replied.iter().any(|id| *id == e.id)),
            None => true,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use weave_types::{Content, Memo};

    pub(crate) fn entry(id: &str, reply_root: Option<&str>) -> Entry {
        Entry::from_memo(
            id,
            Memo {
                replying: reply_root.map(str::to_string),
                author: id.split('/').next().unwrap_or("~zod").to_string(),
                sent: 0,
                content: Content::text(id),
            },
        )
    }

    fn t(n: u128) -> Timestamp {
        Timestamp::new(n)
    }

    #[test]
    fn insert_links_reply_to_loaded_root() {
        let mut pact = Pact::new();
        pact.insert(t(100), entry("~zod/1", None));
        pact.insert(t(200), entry("~bus/2", Some("~zod/1")));

        assert_eq!(pact.get("~zod/1").unwrap().replied, vec!["~bus/2".to_string()]);
        assert_eq!(pact.replies_of("~zod/1").len(), 1);
        assert!(pact.replies_linked());
    }

    #[test]
    fn orphan_reply_attaches_when_root_arrives() {
        let mut pact = Pact::new();
        pact.insert(t(200), entry("~bus/2", Some("~zod/1")));
        assert!(pact.orphans_of("~zod/1").is_some());

        pact.insert(t(100), entry("~zod/1", None));
        assert!(pact.orphans_of("~zod/1").is_none());
        assert_eq!(pact.get("~zod/1").unwrap().replied, vec!["~bus/2".to_string()]);
        assert!(pact.replies_linked());
    }

    #[test]
    fn removing_root_parks_its_replies() {
        let mut pact = Pact::new();
        pact.insert(t(100), entry("~zod/1", None));
        pact.insert(t(200), entry("~bus/2", Some("~zod/1")));

        pact.remove("~zod/1");
        assert_eq!(pact.orphans_of("~zod/1").map(|o| o.len()), Some(1));

        pact.insert(t(100), entry("~zod/1", None));
        assert_eq!(pact.get("~zod/1").unwrap().replied, vec!["~bus/2".to_string()]);
    }

    #[test]
    fn removing_reply_unlinks_it() {
        let mut pact = Pact::new();
        pact.insert(t(100), entry("~zod/1", None));
        pact.insert(t(200), entry("~bus/2", Some("~zod/1")));
        pact.remove("~bus/2");
        assert!(pact.get("~zod/1").unwrap().replied.is_empty());
        assert_eq!(pact.len(), 1);
    }

    #[test]
    fn overwrite_evicts_previous_occupant() {
        let mut pact = Pact::new();
        pact.insert(t(100), entry("~zod/1", None));
        let evicted = pact.insert(t(100), entry("~bus/9", None));
        assert_eq!(evicted.map(|e| e.id.clone()), Some("~zod/1".to_string()));
        assert!(!pact.contains("~zod/1"));
        assert_eq!(pact.time_of("~bus/9"), Some(&t(100)));
        assert_eq!(pact.len(), 1);
    }

    #[test]
    fn update_is_copy_on_write() {
        let mut pact = Pact::new();
        pact.insert(t(100), entry("~zod/1", None));
        let before = pact.clone();
        assert!(pact.update("~zod/1", |e| {
            e.reactions.insert("~bus".into(), "+1".into());
        }));
        assert!(before.get("~zod/1").unwrap().reactions.is_empty());
        assert_eq!(pact.get("~zod/1").unwrap().reactions.len(), 1);
        assert!(!pact.update("~nope/1", |_| {}));
    }
}
