//! Turns a conversation's cached timeline into something a list view can
//! render: row descriptors, a virtualized viewport over them, and the glue
//! that pages in more history when the viewport reaches an edge.

pub mod config;
pub mod engine;
pub mod rows;
pub mod scroller;

pub use config::ScrollConfig;
pub use engine::{Direction, Edge, EdgeState, ScrollEngine, VirtualItem};
pub use rows::{MessageRow, RowOptions, build_rows};
pub use scroller::ChatScroller;
