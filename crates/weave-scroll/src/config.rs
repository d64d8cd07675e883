use serde::{Deserialize, Serialize};

/// Viewport tuning. Distances are in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// How close to the far edge counts as "at the end". Capped at half the
    /// scrollable range so a short list is never at both ends.
    pub at_end_threshold: f64,

    /// Extra items laid out beyond each side of the viewport.
    pub overscan: usize,

    /// Height assumed for items that have not been measured yet.
    pub estimated_item_height: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            at_end_threshold: 2000.0,
            overscan: 6,
            estimated_item_height: 100.0,
        }
    }
}
