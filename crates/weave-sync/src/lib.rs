//! Keeps the conversation cache in step with the backend: paging, live
//! deltas, optimistic actions and on-disk snapshots.

pub mod actions;
pub mod client;
pub mod config;
pub mod error;
pub mod pager;
pub mod persist;
pub mod registry;
pub mod store;
pub mod subscription;
pub mod transport;

pub use actions::Actions;
pub use client::Client;
pub use config::SyncConfig;
pub use error::{SyncError, TransportError};
pub use pager::Pager;
pub use persist::Persister;
pub use registry::ConversationRegistry;
pub use store::{ConversationStore, FetchSlot};
pub use subscription::SubscriptionHandle;
pub use transport::Transport;
