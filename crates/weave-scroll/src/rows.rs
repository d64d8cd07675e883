//! Row descriptors for a chat-style list.

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use weave_store::TimelineMap;
use weave_types::{Entry, Timestamp};

#[derive(Debug, Clone)]
pub struct RowOptions {
    /// Drop replies, leaving only top-level entries. Thread views keep them.
    pub filter_replies: bool,
    /// The entry the view was opened on, if any.
    pub scroll_to: Option<Timestamp>,
    /// Zone used to decide where one day ends.
    pub utc_offset: FixedOffset,
}

impl Default for RowOptions {
    fn default() -> Self {
        Self {
            filter_replies: true,
            scroll_to: None,
            utc_offset: Utc.fix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub key: Timestamp,
    pub entry: Arc<Entry>,
    /// Start of a run of entries by one author.
    pub new_author: bool,
    /// First entry of a calendar day.
    pub new_day: bool,
    pub is_last: bool,
    pub is_linked: bool,
    pub hide_replies: bool,
}

/// Rows for `writs`, oldest first.
pub fn build_rows(writs: &TimelineMap<Arc<Entry>>, options: &RowOptions) -> Vec<MessageRow> {
    let kept: Vec<(&Timestamp, &Arc<Entry>)> = writs
        .iter()
        .filter(|(_, e)| !options.filter_replies || !e.is_reply())
        .collect();

    let mut rows = Vec::with_capacity(kept.len());
    let mut prev: Option<(&Arc<Entry>, Option<NaiveDate>)> = None;

    for (i, &(key, entry)) in kept.iter().enumerate() {
        let day = day_of(key, &options.utc_offset);
        let (new_author, new_day) = match prev {
            Some((last, last_day)) => (
                last.author != entry.author || last.content.is_notice(),
                last_day != day,
            ),
            None => (true, true),
        };

        rows.push(MessageRow {
            key: key.clone(),
            entry: entry.clone(),
            new_author,
            new_day,
            is_last: i + 1 == kept.len(),
            is_linked: options.scroll_to.as_ref() == Some(key),
            hide_replies: !options.filter_replies,
        });
        prev = Some((entry, day));
    }

    rows
}

fn day_of(key: &Timestamp, offset: &FixedOffset) -> Option<NaiveDate> {
    key.to_datetime()
        .map(|utc| utc.with_timezone(offset).date_naive())
}
