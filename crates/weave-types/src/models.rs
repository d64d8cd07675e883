use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::time::Timestamp;

/// A backend identity (`~zod`, `~sampel-palnet`).
pub type Ship = String;

// -- Content --

/// Entry body. Rich text stays opaque JSON; only the variant matters here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Content {
    Story {
        #[serde(default)]
        block: Vec<Value>,
        #[serde(default)]
        inline: Vec<Value>,
    },
    Notice {
        pre: String,
        post: String,
    },
    /// Diary note body.
    Essay {
        title: String,
        #[serde(default)]
        image: String,
        #[serde(default)]
        content: Vec<Value>,
    },
    /// Gallery item body.
    Curio {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        content: Vec<Value>,
    },
}

impl Content {
    pub fn text(inline: impl Into<String>) -> Self {
        Self::Story {
            block: vec![],
            inline: vec![Value::String(inline.into())],
        }
    }

    pub fn is_notice(&self) -> bool {
        matches!(self, Self::Notice { .. })
    }
}

// -- Wire records --

/// Author-supplied half of a writ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    #[serde(default)]
    pub replying: Option<String>,
    pub author: Ship,
    /// Unix milliseconds as claimed by the author.
    pub sent: i64,
    pub content: Content,
}

/// Host-maintained half of a writ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seal {
    pub id: String,
    #[serde(default)]
    pub feels: BTreeMap<Ship, String>,
    #[serde(default)]
    pub replied: Vec<String>,
}

/// An entry as the backend serves it from scries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Writ {
    pub seal: Seal,
    pub memo: Memo,
}

// -- Domain record --

/// One unit of content in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub author: Ship,
    pub sent: i64,
    pub content: Content,
    #[serde(default)]
    pub reactions: BTreeMap<Ship, String>,
    #[serde(default)]
    pub reply_root: Option<String>,
    /// Ids of replies to this entry, in arrival order, without duplicates.
    #[serde(default)]
    pub replied: Vec<String>,
}

impl Entry {
    /// A fresh entry from a memo, with no reactions or replies yet.
    pub fn from_memo(id: impl Into<String>, memo: Memo) -> Self {
        Self {
            id: id.into(),
            author: memo.author,
            sent: memo.sent,
            content: memo.content,
            reactions: BTreeMap::new(),
            reply_root: memo.replying,
            replied: Vec::new(),
        }
    }

    pub fn is_reply(&self) -> bool {
        self.reply_root.is_some()
    }

    /// Record a reply id. Returns false if it was already present.
    pub fn add_reply(&mut self, id: &str) -> bool {
        if self.replied.iter().any(|r| r == id) {
            return false;
        }
        self.replied.push(id.to_string());
        true
    }

    /// Forget a reply id. Returns false if it was not present.
    pub fn remove_reply(&mut self, id: &str) -> bool {
        let before = self.replied.len();
        self.replied.retain(|r| r != id);
        self.replied.len() != before
    }

    pub fn to_writ(&self) -> Writ {
        Writ {
            seal: Seal {
                id: self.id.clone(),
                feels: self.reactions.clone(),
                replied: self.replied.clone(),
            },
            memo: Memo {
                replying: self.reply_root.clone(),
                author: self.author.clone(),
                sent: self.sent,
                content: self.content.clone(),
            },
        }
    }
}

impl From<Writ> for Entry {
    fn from(writ: Writ) -> Self {
        Self {
            id: writ.seal.id,
            author: writ.memo.author,
            sent: writ.memo.sent,
            content: writ.memo.content,
            reactions: writ.seal.feels,
            reply_root: writ.memo.replying,
            replied: writ.seal.replied,
        }
    }
}

/// Entry ids are `<author ship>/<@ud time>`.
pub fn is_entry_id(id: &str) -> bool {
    match id.split_once('/') {
        Some((ship, time)) => {
            !ship.is_empty() && !time.contains('/') && time.parse::<Timestamp>().is_ok()
        }
        None => false,
    }
}

/// Build the id a ship assigns to an entry it sends at `time`.
pub fn entry_id(author: &str, time: &Timestamp) -> String {
    format!("{}/{}", author, time.to_ud())
}

// -- Per-conversation summaries --

/// Unread summary for one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Brief {
    #[serde(default)]
    pub last: Option<Timestamp>,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub read_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    #[default]
    List,
    Grid,
}

/// Ordering applied to top-level entries in list/grid views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortMode {
    #[serde(rename = "time-asc")]
    TimeAsc,
    #[default]
    #[serde(rename = "time-dsc")]
    TimeDsc,
}

impl FromStr for SortMode {
    type Err = UnknownSortMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time-asc" => Ok(Self::TimeAsc),
            "time-dsc" => Ok(Self::TimeDsc),
            // Comment-recency ordering would slot in here.
            "quip-asc" | "quip-dsc" => {
                debug!("sort mode {} not supported, using time-dsc", s);
                Ok(Self::TimeDsc)
            }
            other => Err(UnknownSortMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort mode: {0}")]
pub struct UnknownSortMode(pub String);

/// Locally cached channel settings (the "stash").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationMeta {
    #[serde(default)]
    pub view: DisplayMode,
    #[serde(default)]
    pub sort: SortMode,
    #[serde(default)]
    pub writers: Vec<Ship>,
}
