//! Wire and domain types shared by the weave crates.

pub mod api;
pub mod events;
pub mod models;
pub mod time;

pub use api::{ChannelKind, ConversationId, ScryPath};
pub use events::{Delta, DeltaEvent, Diff, MalformedEvent, TransportEvent};
pub use models::{Brief, Content, ConversationMeta, Entry, Memo, SortMode, Writ};
pub use time::Timestamp;
