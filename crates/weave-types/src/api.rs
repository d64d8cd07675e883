use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::Diff;
use crate::models::Writ;
use crate::time::Timestamp;

// -- Conversation addressing --

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Chat,
    Dm,
    Diary,
    Heap,
}

impl ChannelKind {
    /// Backend agent that owns conversations of this kind.
    pub fn app(self) -> &'static str {
        match self {
            Self::Chat | Self::Dm => "chat",
            Self::Diary => "diary",
            Self::Heap => "heap",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Dm => "dm",
            Self::Diary => "diary",
            Self::Heap => "heap",
        }
    }

    /// Mark carried by subscription events that hold writ deltas.
    pub fn response_mark(self) -> &'static str {
        match self {
            Self::Chat | Self::Dm => "writ-response",
            Self::Diary => "diary-response",
            Self::Heap => "heap-response",
        }
    }

    /// Mark used when poking actions at this kind's agent.
    pub fn action_mark(self) -> &'static str {
        match self {
            Self::Chat => "chat-action",
            Self::Dm => "dm-action",
            Self::Diary => "diary-action",
            Self::Heap => "heap-action",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationIdError {
    #[error("conversation id must be <kind>/<flag>: {0}")]
    Shape(String),
    #[error("unknown conversation kind: {0}")]
    UnknownKind(String),
}

/// A conversation: channel kind plus its flag (`~host/name`) or DM ship.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConversationId {
    pub kind: ChannelKind,
    pub flag: String,
}

impl ConversationId {
    pub fn new(kind: ChannelKind, flag: impl Into<String>) -> Self {
        Self {
            kind,
            flag: flag.into(),
        }
    }

    pub fn chat(flag: impl Into<String>) -> Self {
        Self::new(ChannelKind::Chat, flag)
    }

    pub fn dm(ship: impl Into<String>) -> Self {
        Self::new(ChannelKind::Dm, ship)
    }

    pub fn app(&self) -> &'static str {
        self.kind.app()
    }

    /// Prefix every page scry is rendered under.
    pub fn scry_prefix(&self) -> String {
        match self.kind {
            ChannelKind::Chat => format!("/chat/{}/writs", self.flag),
            ChannelKind::Dm => format!("/dm/{}/writs", self.flag),
            ChannelKind::Diary => format!("/diary/{}/notes", self.flag),
            ChannelKind::Heap => format!("/heap/{}/curios", self.flag),
        }
    }

    pub fn subscription_path(&self) -> String {
        match self.kind {
            ChannelKind::Chat => format!("/chat/{}/ui/writs", self.flag),
            ChannelKind::Dm => format!("/dm/{}/ui", self.flag),
            ChannelKind::Diary => format!("/diary/{}/ui", self.flag),
            ChannelKind::Heap => format!("/heap/{}/ui", self.flag),
        }
    }

    /// Full scry path for a page request.
    pub fn scry(&self, path: &ScryPath) -> String {
        format!("{}/{}", self.scry_prefix(), path)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.flag)
    }
}

impl FromStr for ConversationId {
    type Err = ConversationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, flag) = s
            .split_once('/')
            .filter(|(_, flag)| !flag.is_empty())
            .ok_or_else(|| ConversationIdError::Shape(s.to_string()))?;
        let kind = match kind {
            "chat" => ChannelKind::Chat,
            "dm" => ChannelKind::Dm,
            "diary" => ChannelKind::Diary,
            "heap" => ChannelKind::Heap,
            other => return Err(ConversationIdError::UnknownKind(other.to_string())),
        };
        Ok(Self::new(kind, flag))
    }
}

impl Serialize for ConversationId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// -- Scry paths --

/// Page requests, relative to a conversation's scry prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScryPath {
    Newest { count: usize },
    Older { anchor: Timestamp, count: usize },
    Newer { anchor: Timestamp, count: usize },
    AroundTime { time: Timestamp, count: usize },
    AroundId { id: String, count: usize },
    WritId { id: String },
}

impl fmt::Display for ScryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Newest { count } => write!(f, "newest/{}", count),
            Self::Older { anchor, count } => write!(f, "older/{}/{}", anchor.to_ud(), count),
            Self::Newer { anchor, count } => write!(f, "newer/{}/{}", anchor.to_ud(), count),
            Self::AroundTime { time, count } => write!(f, "around/{}/{}", time.to_ud(), count),
            Self::AroundId { id, count } => write!(f, "around/{}/{}", id, count),
            Self::WritId { id } => write!(f, "writ/id/{}", id),
        }
    }
}

// -- Responses --

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("page response is not an object")]
    NotAnObject,
    #[error("bad page key {key}: {source}")]
    BadKey {
        key: String,
        source: crate::time::TimestampParseError,
    },
    #[error("bad writ at {key}: {source}")]
    BadWrit {
        key: String,
        source: serde_json::Error,
    },
}

/// Decode a `{time: writ}` page, oldest first.
pub fn parse_page(json: &Value) -> Result<Vec<(Timestamp, Writ)>, PageError> {
    let obj = json.as_object().ok_or(PageError::NotAnObject)?;
    let mut page = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        let time = key.parse::<Timestamp>().map_err(|source| PageError::BadKey {
            key: key.clone(),
            source,
        })?;
        let writ = Writ::deserialize(value).map_err(|source| PageError::BadWrit {
            key: key.clone(),
            source,
        })?;
        page.push((time, writ));
    }
    page.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(page)
}

/// Response to a `writ/id/<id>` scry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritEntry {
    pub time: Timestamp,
    pub writ: Writ,
}

// -- Actions --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionDiff {
    Writs(Diff),
    Read,
}

/// Body poked at a conversation's agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPayload {
    pub whom: String,
    pub diff: ActionDiff,
}

impl ActionPayload {
    pub fn writs(conversation: &ConversationId, diff: Diff) -> Self {
        Self {
            whom: conversation.flag.clone(),
            diff: ActionDiff::Writs(diff),
        }
    }

    pub fn read(conversation: &ConversationId) -> Self {
        Self {
            whom: conversation.flag.clone(),
            diff: ActionDiff::Read,
        }
    }
}
