//! Per-conversation cache: the timeline map, its id index, fetched windows,
//! and the reducer that folds backend deltas into them.

pub mod pact;
pub mod reducer;
pub mod sort;
pub mod state;
pub mod timeline;
pub mod window;

pub use pact::Pact;
pub use reducer::{Applied, Ignored, PageLoad};
pub use state::{ConversationState, FetchState};
pub use timeline::TimelineMap;
pub use window::{Window, WindowSet};
