use imbl::OrdSet;
use serde::{Deserialize, Serialize};

use crate::pact::Pact;
use crate::window::WindowSet;

/// Which page request, if any, is outstanding for a conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchState {
    #[default]
    Idle,
    LoadingOlder,
    LoadingNewer,
    /// Around-time, around-id or single-entry load.
    LoadingAround,
}

impl FetchState {
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }
}

/// Everything cached for one conversation. Cloning is cheap; readers hold a
/// clone while writers replace the whole value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pub pact: Pact,
    pub windows: WindowSet,
    pub fetch: FetchState,
    /// Ids sent locally and not yet echoed back by the backend.
    pub pending: OrdSet<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pact(pact: Pact) -> Self {
        Self {
            pact,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pact.is_empty()
    }

    pub fn loaded_oldest(&self) -> bool {
        self.windows.latest().is_some_and(|w| w.loaded_oldest)
    }

    pub fn loaded_newest(&self) -> bool {
        self.windows.latest().is_some_and(|w| w.loaded_newest)
    }
}
