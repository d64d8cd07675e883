//! Virtualized viewport over a variable-height list.
//!
//! Items are supplied oldest first. In [`Direction::ReverseChronological`]
//! display index 0 is the newest item and offset 0 is the newest edge; the
//! view is drawn flipped so that edge sits at the bottom of the screen. All
//! offsets below are in display order.
//!
//! Heights are keyed by item key rather than index so that paging in older
//! or newer items keeps every existing measurement.

use std::cell::OnceCell;
use std::collections::HashMap;

use tracing::debug;
use weave_types::Timestamp;

use crate::config::ScrollConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    /// Oldest first, offset 0 at the oldest loaded item.
    Chronological,
    /// Newest first, offset 0 at the newest loaded item.
    #[default]
    ReverseChronological,
}

impl Direction {
    pub fn is_inverted(self) -> bool {
        self == Self::ReverseChronological
    }
}

/// A visual edge of the list as the user sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Oldest content.
    Top,
    /// Newest content.
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeState {
    pub at_top: bool,
    pub at_bottom: bool,
}

impl EdgeState {
    const RESTING: Self = Self {
        at_top: false,
        at_bottom: true,
    };
}

/// One item to lay out.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualItem {
    /// Display index.
    pub index: usize,
    pub key: Timestamp,
    pub start: f64,
    pub size: f64,
}

#[derive(Debug)]
pub struct ScrollEngine {
    config: ScrollConfig,
    /// Oldest first.
    keys: Vec<Timestamp>,
    heights: HashMap<Timestamp, f64>,
    /// `starts[i]` is where display item `i` begins; the last value is the
    /// total height. Rebuilt on demand after any change to sizes or order.
    starts: OnceCell<Vec<f64>>,
    viewport: f64,
    offset: f64,
    direction: Direction,
    has_scrolled: bool,
    pinned: Option<Timestamp>,
    edges: EdgeState,
}

impl ScrollEngine {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            keys: Vec::new(),
            heights: HashMap::new(),
            starts: OnceCell::new(),
            viewport: 0.0,
            offset: 0.0,
            direction: Direction::default(),
            has_scrolled: false,
            pinned: None,
            edges: EdgeState::RESTING,
        }
    }

    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn has_scrolled(&self) -> bool {
        self.has_scrolled
    }

    pub fn scroll_offset(&self) -> f64 {
        self.offset
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport
    }

    /// Edge state as of the last layout pass.
    pub fn edges(&self) -> EdgeState {
        self.edges
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport = height.max(0.0);
        self.offset = self.offset.clamp(0.0, self.max_offset());
    }

    // -- Index mapping --

    /// Maps a display index to the oldest-first index and back.
    fn flip(&self, index: usize) -> usize {
        if self.direction.is_inverted() {
            self.keys.len() - 1 - index
        } else {
            index
        }
    }

    pub fn key_at(&self, display: usize) -> Option<&Timestamp> {
        if display >= self.keys.len() {
            return None;
        }
        self.keys.get(self.flip(display))
    }

    pub fn index_of(&self, key: &Timestamp) -> Option<usize> {
        self.keys.binary_search(key).ok().map(|i| self.flip(i))
    }

    // -- Sizes --

    fn size_of(&self, key: &Timestamp) -> f64 {
        self.heights
            .get(key)
            .copied()
            .unwrap_or(self.config.estimated_item_height)
    }

    pub fn measured_height(&self, display: usize) -> Option<f64> {
        self.key_at(display)
            .and_then(|key| self.heights.get(key))
            .copied()
    }

    fn starts(&self) -> &[f64] {
        self.starts.get_or_init(|| {
            let mut starts = Vec::with_capacity(self.keys.len() + 1);
            let mut at = 0.0;
            starts.push(at);
            for display in 0..self.keys.len() {
                at += self.size_of(&self.keys[self.flip(display)]);
                starts.push(at);
            }
            starts
        })
    }

    fn invalidate(&mut self) {
        self.starts = OnceCell::new();
    }

    pub fn total_height(&self) -> f64 {
        self.starts().last().copied().unwrap_or(0.0)
    }

    fn max_offset(&self) -> f64 {
        (self.total_height() - self.viewport).max(0.0)
    }

    /// Offsets only follow content changes once the user has taken control
    /// or a jump target is set. Otherwise the view stays where it rests.
    fn follows_content(&self) -> bool {
        self.has_scrolled || self.pinned.is_some()
    }

    /// Whether the viewport rests on the newest loaded item.
    fn at_newest_edge(&self) -> bool {
        match self.direction {
            Direction::ReverseChronological => self.offset <= 0.0,
            Direction::Chronological => self.offset >= self.max_offset(),
        }
    }

    /// Replace the item list. Measurements for keys still present are kept.
    /// A view resting on the newest edge stays there, so arrivals show up.
    pub fn set_keys(&mut self, keys: Vec<Timestamp>) {
        let follow_newest = !self.keys.is_empty() && self.at_newest_edge();
        self.replace_keys(keys);
        if follow_newest {
            self.offset = match self.direction {
                Direction::ReverseChronological => 0.0,
                Direction::Chronological => self.max_offset(),
            };
        }
    }

    /// Replace the item list keeping the first visible item in place, even
    /// on the newest edge. For pages loaded on the user's behalf.
    pub fn set_keys_anchored(&mut self, keys: Vec<Timestamp>) {
        self.replace_keys(keys);
    }

    fn replace_keys(&mut self, keys: Vec<Timestamp>) {
        let anchor = self.first_visible().and_then(|display| {
            let key = self.key_at(display)?.clone();
            Some((key, self.offset - self.starts()[display]))
        });

        self.heights.retain(|k, _| keys.binary_search(k).is_ok());
        self.keys = keys;
        self.invalidate();

        if self.follows_content() {
            if let Some((key, into)) = anchor {
                if let Some(display) = self.index_of(&key) {
                    self.offset = self.starts()[display] + into;
                }
            }
        }
        self.offset = self.offset.clamp(0.0, self.max_offset());
    }

    /// Record the rendered height of `key`. Returns false when nothing
    /// changed or the key is not in the list.
    pub fn measure(&mut self, key: &Timestamp, height: f64) -> bool {
        let height = height.max(0.0);
        let Some(display) = self.index_of(key) else {
            return false;
        };
        let old = self.size_of(key);
        self.heights.insert(key.clone(), height);
        if old == height {
            return false;
        }

        let start = self.starts()[display];
        self.invalidate();
        if self.follows_content() && start < self.offset {
            self.offset = (self.offset + height - old).clamp(0.0, self.max_offset());
        }
        true
    }

    // -- Scrolling --

    /// A scroll the user performed.
    pub fn on_user_scroll(&mut self, offset: f64) {
        self.has_scrolled = true;
        self.offset = offset.clamp(0.0, self.max_offset());
    }

    /// A scroll the program performed.
    pub fn scroll_to_offset(&mut self, offset: f64) {
        self.offset = offset.clamp(0.0, self.max_offset());
    }

    /// Flip the display order, keeping the same content under the viewport.
    /// Edge state is refreshed without reporting a transition.
    pub fn set_direction(&mut self, direction: Direction) -> bool {
        if direction == self.direction {
            return false;
        }
        let total = self.total_height();
        self.direction = direction;
        self.invalidate();
        self.offset = (total - self.offset).clamp(0.0, self.max_offset());
        self.edges = self.compute_edges();
        debug!("Scroll direction now {:?}, offset {}", direction, self.offset);
        true
    }

    /// Centre `key` in the viewport. Returns its display index, or `None`
    /// when the key is not loaded. Edge state is updated silently so the
    /// jump itself never triggers paging.
    pub fn jump_to(&mut self, key: &Timestamp) -> Option<usize> {
        let index = self.index_of(key)?;
        let starts = self.starts();
        let (start, end) = (starts[index], starts[index + 1]);
        let target = start + (end - start) / 2.0 - self.viewport / 2.0;
        self.offset = target.clamp(0.0, self.max_offset());
        self.pinned = Some(key.clone());
        self.edges = self.compute_edges();
        debug!("Jumped to {} at index {}", key, index);
        Some(index)
    }

    // -- Layout --

    fn first_visible(&self) -> Option<usize> {
        if self.keys.is_empty() {
            return None;
        }
        let ends = &self.starts()[1..];
        Some(ends.partition_point(|end| *end <= self.offset).min(self.keys.len() - 1))
    }

    /// Items intersecting the viewport, plus overscan on each side.
    pub fn visible_items(&self) -> Vec<VirtualItem> {
        let Some(first) = self.first_visible() else {
            return Vec::new();
        };
        let n = self.keys.len();
        let starts = self.starts();
        let bottom = self.offset + self.viewport;
        let last = starts[..n]
            .partition_point(|start| *start < bottom)
            .saturating_sub(1)
            .max(first);

        let lo = first.saturating_sub(self.config.overscan);
        let hi = (last + self.config.overscan).min(n - 1);
        (lo..=hi)
            .map(|index| VirtualItem {
                index,
                key: self.keys[self.flip(index)].clone(),
                start: starts[index],
                size: starts[index + 1] - starts[index],
            })
            .collect()
    }

    fn compute_edges(&self) -> EdgeState {
        if self.keys.is_empty() {
            return EdgeState::RESTING;
        }
        let total = self.total_height();
        let range = (total - self.viewport).max(0.0);
        let threshold = (range / 2.0).min(self.config.at_end_threshold);
        let at_start = self.offset <= 0.0;
        let at_end = self.offset + self.viewport >= total - threshold;

        match self.direction {
            Direction::ReverseChronological => EdgeState {
                at_top: at_end,
                at_bottom: at_start,
            },
            Direction::Chronological => EdgeState {
                at_top: at_start,
                at_bottom: at_end,
            },
        }
    }

    /// Recompute edge state. Returns the edge the viewport just entered,
    /// top first when both are entered at once.
    pub fn layout(&mut self) -> Option<Edge> {
        let next = self.compute_edges();
        let prev = std::mem::replace(&mut self.edges, next);
        if next.at_top && !prev.at_top {
            Some(Edge::Top)
        } else if next.at_bottom && !prev.at_bottom {
            Some(Edge::Bottom)
        } else {
            None
        }
    }

    /// Forget edge state so the next layout reports an edge the viewport is
    /// still resting on.
    pub fn rearm(&mut self) {
        self.edges = EdgeState {
            at_top: false,
            at_bottom: false,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: u128) -> Timestamp {
        Timestamp::new(n)
    }

    /// `n` items of the estimated height (100px), keys 1..=n.
    fn engine(n: u128, viewport: f64) -> ScrollEngine {
        let mut engine = ScrollEngine::new(ScrollConfig::default());
        engine.set_keys((1..=n).map(t).collect());
        engine.set_viewport_height(viewport);
        engine
    }

    #[test]
    fn empty_list_rests_at_bottom() {
        let mut engine = engine(0, 500.0);
        assert_eq!(engine.layout(), None);
        assert_eq!(
            engine.edges(),
            EdgeState {
                at_top: false,
                at_bottom: true
            }
        );
        assert!(engine.visible_items().is_empty());
        assert_eq!(engine.jump_to(&t(1)), None);
        assert_eq!(engine.total_height(), 0.0);
    }

    #[test]
    fn inverted_order_puts_newest_first() {
        let mut engine = engine(5, 500.0);
        assert_eq!(engine.key_at(0), Some(&t(5)));
        assert_eq!(engine.index_of(&t(1)), Some(4));

        engine.set_direction(Direction::Chronological);
        assert_eq!(engine.key_at(0), Some(&t(1)));
        assert_eq!(engine.key_at(5), None);
    }

    #[test]
    fn visible_range_includes_overscan() {
        let mut engine = engine(100, 500.0);
        engine.scroll_to_offset(1000.0);
        let items = engine.visible_items();
        assert_eq!(items.first().map(|i| i.index), Some(4));
        assert_eq!(items.last().map(|i| i.index), Some(20));
        assert_eq!(items[6].start, 1000.0);
        assert_eq!(items[6].key, t(90));
    }

    #[test]
    fn visible_range_uses_measured_heights() {
        let mut engine = engine(10, 150.0);
        engine.set_direction(Direction::Chronological);
        engine.measure(&t(1), 400.0);
        engine.scroll_to_offset(450.0);
        let first = engine.visible_items().into_iter().find(|i| i.start + i.size > 450.0);
        assert_eq!(first.map(|i| i.index), Some(1));
        assert_eq!(engine.total_height(), 1300.0);
        assert_eq!(engine.measured_height(0), Some(400.0));
        assert_eq!(engine.measured_height(1), None);
    }

    #[test]
    fn offscreen_resize_does_not_move_resting_view() {
        let mut engine = engine(20, 500.0);
        assert_eq!(engine.layout(), None);
        assert!(engine.edges().at_bottom);

        let offscreen = engine.key_at(15).cloned().unwrap();
        assert!(engine.measure(&offscreen, 340.0));
        assert!(engine.measure(&t(20), 250.0));
        assert_eq!(engine.scroll_offset(), 0.0);
        assert_eq!(engine.layout(), None);
    }

    #[test]
    fn resize_above_viewport_keeps_content_in_place_after_user_scroll() {
        let mut engine = engine(20, 500.0);
        engine.on_user_scroll(1000.0);
        let above = engine.key_at(2).cloned().unwrap();
        engine.measure(&above, 150.0);
        assert_eq!(engine.scroll_offset(), 1050.0);

        // Below the viewport top: nothing moves.
        let below = engine.key_at(12).cloned().unwrap();
        engine.measure(&below, 20.0);
        assert_eq!(engine.scroll_offset(), 1050.0);
    }

    #[test]
    fn prepended_items_keep_the_anchor() {
        let mut engine = engine(20, 500.0);
        engine.measure(&t(18), 180.0);
        engine.on_user_scroll(600.0);
        let anchor_key = engine.key_at(engine.first_visible().unwrap()).cloned().unwrap();

        // Two newer entries land at display index 0 and 1.
        engine.set_keys((1..=22).map(t).collect());
        let display = engine.index_of(&anchor_key).unwrap();
        let start = engine.visible_items().iter().find(|i| i.index == display).map(|i| i.start);
        assert_eq!(engine.scroll_offset() - start.unwrap(), 600.0 - 580.0);
        assert_eq!(engine.scroll_offset(), 800.0);
        assert_eq!(engine.measured_height(engine.index_of(&t(18)).unwrap()), Some(180.0));
    }

    #[test]
    fn arrivals_show_while_resting_on_newest_edge() {
        let mut engine = engine(20, 500.0);
        engine.on_user_scroll(800.0);
        engine.on_user_scroll(0.0);
        engine.layout();
        assert!(engine.edges().at_bottom);

        engine.set_keys((1..=21).map(t).collect());
        assert_eq!(engine.scroll_offset(), 0.0);
        assert_eq!(engine.key_at(0), Some(&t(21)));
        assert_eq!(engine.visible_items().first().map(|i| i.key.clone()), Some(t(21)));
        assert_eq!(engine.layout(), None);
        assert!(engine.edges().at_bottom);
    }

    #[test]
    fn chronological_view_follows_arrivals_at_its_end() {
        let mut engine = engine(20, 500.0);
        engine.set_direction(Direction::Chronological);
        engine.on_user_scroll(1500.0);

        engine.set_keys((1..=21).map(t).collect());
        assert_eq!(engine.scroll_offset(), 1600.0);

        // Not on the edge: the anchor holds instead.
        engine.on_user_scroll(1000.0);
        engine.set_keys((1..=22).map(t).collect());
        assert_eq!(engine.scroll_offset(), 1000.0);
    }

    #[test]
    fn anchored_replace_ignores_the_newest_edge() {
        let mut engine = engine(20, 500.0);
        engine.on_user_scroll(0.0);

        engine.set_keys_anchored((1..=22).map(t).collect());
        assert_eq!(engine.scroll_offset(), 200.0);
        assert_eq!(engine.key_at(2), Some(&t(20)));
    }

    #[test]
    fn inversion_mirrors_offset() {
        let mut engine = engine(10, 200.0);
        engine.set_direction(Direction::Chronological);
        engine.on_user_scroll(300.0);

        assert!(engine.set_direction(Direction::ReverseChronological));
        assert_eq!(engine.total_height(), 1000.0);
        assert_eq!(engine.scroll_offset(), 700.0);
        assert!(!engine.set_direction(Direction::ReverseChronological));
    }

    #[test]
    fn edges_use_capped_threshold() {
        let mut engine = engine(100, 1000.0);
        assert_eq!(engine.layout(), None);

        engine.on_user_scroll(6999.0);
        assert_eq!(engine.layout(), None);

        engine.on_user_scroll(7000.0);
        assert_eq!(engine.layout(), Some(Edge::Top));
        assert!(!engine.edges().at_bottom);

        engine.on_user_scroll(0.0);
        assert_eq!(engine.layout(), Some(Edge::Bottom));
    }

    #[test]
    fn half_range_threshold_on_medium_lists() {
        // 1500px of content, 1000px viewport: threshold is 250px.
        let mut engine = engine(15, 1000.0);
        engine.set_direction(Direction::Chronological);
        engine.on_user_scroll(0.0);
        assert_eq!(engine.layout(), Some(Edge::Top));
        assert_eq!(
            engine.edges(),
            EdgeState {
                at_top: true,
                at_bottom: false
            }
        );
        engine.on_user_scroll(249.0);
        assert_eq!(engine.layout(), None);
        engine.on_user_scroll(250.0);
        assert_eq!(engine.layout(), Some(Edge::Bottom));
    }

    #[test]
    fn short_list_reports_top_first() {
        let mut engine = engine(3, 1000.0);
        assert_eq!(engine.layout(), Some(Edge::Top));
        assert!(engine.edges().at_bottom);
    }

    #[test]
    fn rearm_reports_resting_edge_again() {
        let mut engine = engine(3, 1000.0);
        assert_eq!(engine.layout(), Some(Edge::Top));
        assert_eq!(engine.layout(), None);
        engine.rearm();
        assert_eq!(engine.layout(), Some(Edge::Top));
    }

    #[test]
    fn jump_centres_without_reporting_an_edge() {
        let mut engine = engine(100, 500.0);
        let index = engine.jump_to(&t(3)).unwrap();
        assert_eq!(index, 97);
        // Item spans 9700..9800, so its centre is 9750.
        assert_eq!(engine.scroll_offset(), 9500.0);
        assert!(engine.edges().at_top);
        assert_eq!(engine.layout(), None);

        assert_eq!(engine.jump_to(&t(500)), None);
    }
}
