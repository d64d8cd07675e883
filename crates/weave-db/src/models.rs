use std::collections::BTreeMap;

use weave_types::{Brief, ConversationId, ConversationMeta, Entry, Timestamp};

/// Everything written to disk: per-conversation briefs, stash and timelines.
/// Timelines are stored as ascending `(key, entry)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub briefs: BTreeMap<ConversationId, Brief>,
    pub stash: BTreeMap<ConversationId, ConversationMeta>,
    pub timelines: BTreeMap<ConversationId, Vec<(Timestamp, Entry)>>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.briefs.is_empty() && self.stash.is_empty() && self.timelines.is_empty()
    }
}

/// Bookkeeping for one stored timeline.
pub struct TimelineRow {
    pub conversation: String,
    pub entry_count: i64,
    pub updated_at: String,
}
