use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Memo, Ship};
use crate::time::Timestamp;

// -- Deltas --

/// Payload of an `add` delta. The backend sends either a bare memo or a memo
/// with the key it was filed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddDelta {
    Timed {
        memo: Memo,
        #[serde(default)]
        time: Option<Timestamp>,
    },
    Bare(Memo),
}

impl AddDelta {
    pub fn memo(&self) -> &Memo {
        match self {
            Self::Timed { memo, .. } | Self::Bare(memo) => memo,
        }
    }

    pub fn into_memo(self) -> Memo {
        match self {
            Self::Timed { memo, .. } | Self::Bare(memo) => memo,
        }
    }

    pub fn time(&self) -> Option<&Timestamp> {
        match self {
            Self::Timed { time, .. } => time.as_ref(),
            Self::Bare(_) => None,
        }
    }
}

/// A single incremental change to one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Delta {
    Add(AddDelta),
    Del,
    AddFeel { ship: Ship, feel: String },
    DelFeel(Ship),
}

impl Delta {
    pub fn add(memo: Memo, time: Option<Timestamp>) -> Self {
        Self::Add(AddDelta::Timed { memo, time })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Del => "del",
            Self::AddFeel { .. } => "add-feel",
            Self::DelFeel(_) => "del-feel",
        }
    }
}

/// A delta addressed to an entry id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub id: String,
    pub delta: Delta,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedEvent {
    #[error("event has no entry id")]
    MissingId,
    #[error("event for {0} has no delta")]
    MissingDelta(String),
    #[error("event for {id} has an unreadable delta: {reason}")]
    InvalidDelta { id: String, reason: String },
}

// -- Subscription envelopes --

/// Raw event delivered on a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportEvent {
    pub mark: String,
    pub json: Value,
}

/// Decoding of the envelopes that carry writ deltas.
pub struct DeltaEvent;

impl DeltaEvent {
    /// Accepts `{update:{diff:{writs:{id,delta}}}}`, `{diff:{id,delta}}` and
    /// `{id,response}`.
    pub fn parse(json: &Value) -> Result<Diff, MalformedEvent> {
        let (id, delta) = if let Some(update) = json.get("update") {
            let writs = update.get("diff").and_then(|d| d.get("writs"));
            (
                writs.and_then(|w| w.get("id")),
                writs.and_then(|w| w.get("delta")),
            )
        } else if let Some(diff) = json.get("diff") {
            (diff.get("id"), diff.get("delta"))
        } else {
            (json.get("id"), json.get("response"))
        };

        let id = id
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(MalformedEvent::MissingId)?
            .to_string();

        let delta = match delta {
            Some(d) if !d.is_null() => d,
            _ => return Err(MalformedEvent::MissingDelta(id)),
        };

        match Delta::deserialize(delta) {
            Ok(delta) => Ok(Diff { id, delta }),
            Err(e) => Err(MalformedEvent::InvalidDelta {
                id,
                reason: e.to_string(),
            }),
        }
    }
}
