use std::ops::Range;

use super::follow::{DEFAULT_AT_BOTTOM_THRESHOLD, FollowTracker};
use super::heights::ItemHeights;

pub const DEFAULT_FULL_RENDER_THRESHOLD: usize = 100;
pub const DEFAULT_OVERSCAN: usize = 6;
pub const DEFAULT_ESTIMATED_ITEM_HEIGHT: f32 = 64.0;

/// Static parameters of one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowConfig {
    /// Sequences at or above this length are virtualized.
    pub full_render_threshold: usize,
    /// Extra rows materialized on each side of the visible span.
    pub overscan: usize,
    pub at_bottom_threshold: f32,
    pub estimated_item_height: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            full_render_threshold: DEFAULT_FULL_RENDER_THRESHOLD,
            overscan: DEFAULT_OVERSCAN,
            at_bottom_threshold: DEFAULT_AT_BOTTOM_THRESHOLD,
            estimated_item_height: DEFAULT_ESTIMATED_ITEM_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Every row is materialized.
    Full,
    /// Only the visible span plus overscan is materialized.
    Virtualized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// Scroll the renderer should apply on its next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRequest {
    pub index: usize,
    pub behavior: ScrollBehavior,
}

/// Snapshot handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowState {
    pub range: Range<usize>,
    pub stick_to_bottom: bool,
    pub overscan: usize,
}

/// Decides which contiguous index range of the merged sequence to materialize.
///
/// Pure index/range computation: the surface reports viewport height, scroll
/// offset, and measured row heights; the window answers with a range and
/// optional scroll requests. `range` always satisfies
/// `0 <= start <= end <= len`.
#[derive(Debug, Clone)]
pub struct ViewportWindow {
    config: WindowConfig,
    mode: RenderMode,
    heights: ItemHeights,
    follow: FollowTracker,
    viewport_height: f32,
    scroll_offset: f32,
    range: Range<usize>,
    pending_scroll: Option<ScrollRequest>,
}

impl ViewportWindow {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            mode: RenderMode::Full,
            heights: ItemHeights::new(config.estimated_item_height),
            follow: FollowTracker::new(config.at_bottom_threshold),
            viewport_height: 0.0,
            scroll_offset: 0.0,
            range: 0..0,
            pending_scroll: None,
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn stick_to_bottom(&self) -> bool {
        self.follow.is_following_bottom()
    }

    pub fn state(&self) -> WindowState {
        WindowState {
            range: self.range.clone(),
            stick_to_bottom: self.follow.is_following_bottom(),
            overscan: self.config.overscan,
        }
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    pub fn heights(&self) -> &ItemHeights {
        &self.heights
    }

    pub fn max_scroll_offset(&self) -> f32 {
        (self.heights.total_height() - self.viewport_height).max(0.0)
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = if height.is_finite() {
            height.max(0.0)
        } else {
            0.0
        };
        self.settle_offset();
        self.recompute();
    }

    pub fn on_length_change(&mut self, new_len: usize) {
        let previous = self.heights.len();
        if new_len == previous {
            return;
        }

        self.heights.resize(new_len);

        if self.mode == RenderMode::Full && new_len >= self.config.full_render_threshold {
            // One-way until `reset`; reverting would remeasure every row.
            self.mode = RenderMode::Virtualized;
            tracing::debug!(
                len = new_len,
                threshold = self.config.full_render_threshold,
                "switched to virtualized rendering"
            );
        }

        if new_len > previous && self.follow.request_scroll_to_bottom_if_following() {
            self.pending_scroll = Some(ScrollRequest {
                index: new_len - 1,
                behavior: ScrollBehavior::Smooth,
            });
        }

        self.settle_offset();
        self.recompute();
    }

    /// Applies a scroll position reported by the surface.
    pub fn on_scroll(&mut self, position: f32) {
        let max_offset = self.max_scroll_offset();
        let offset = if position.is_finite() {
            position.clamp(0.0, max_offset)
        } else {
            self.scroll_offset
        };

        self.scroll_offset = offset;
        self.follow.update(offset, max_offset);
        // A queued follow-the-tail request is stale once the user left the tail.
        if !self.follow.is_following_bottom()
            && matches!(
                self.pending_scroll,
                Some(ScrollRequest {
                    behavior: ScrollBehavior::Smooth,
                    ..
                })
            )
        {
            self.pending_scroll = None;
        }
        self.recompute();
    }

    /// Jumps to the last row and re-enables stick-to-bottom.
    pub fn scroll_to_end(&mut self) {
        self.follow.request_scroll_to_bottom();
        if let Some(last) = self.len().checked_sub(1) {
            self.pending_scroll = Some(ScrollRequest {
                index: last,
                behavior: ScrollBehavior::Instant,
            });
        }

        self.settle_offset();
        self.recompute();
    }

    /// Brings `index` (clamped to the last row) to the top of the viewport.
    ///
    /// Returns the index actually targeted, or `None` for an empty sequence.
    pub fn scroll_to_index(&mut self, index: usize) -> Option<usize> {
        let last = self.len().checked_sub(1)?;
        let index = index.min(last);
        if index == last {
            self.scroll_to_end();
            return Some(index);
        }

        self.follow.pause();
        self.scroll_offset = self.heights.offset_of(index).min(self.max_scroll_offset());
        self.follow.observe_content(self.scroll_offset, self.max_scroll_offset());
        self.pending_scroll = Some(ScrollRequest {
            index,
            behavior: ScrollBehavior::Instant,
        });
        self.recompute();
        Some(index)
    }

    /// Records a measured row height; returns true when the layout changed.
    pub fn record_item_height(&mut self, index: usize, height: f32) -> bool {
        let previous_height = self.heights.height_of(index);
        let anchor = self.heights.index_at(self.scroll_offset);
        if !self.heights.record(index, height) {
            return false;
        }

        // Rows above the first visible row shift content; keep it anchored.
        if !self.follow.is_following_bottom() && index < anchor {
            self.scroll_offset += self.heights.height_of(index) - previous_height;
        }

        self.settle_offset();
        self.recompute();
        true
    }

    /// Hands the queued scroll to the renderer, at most once.
    pub fn take_scroll_request(&mut self) -> Option<ScrollRequest> {
        self.pending_scroll.take()
    }

    /// Clamps an externally requested range to `[0, len)`.
    pub fn clamp_range(&self, requested: Range<usize>) -> Range<usize> {
        let len = self.len();
        let start = requested.start.min(len);
        let end = requested.end.clamp(start, len);
        start..end
    }

    /// Returns to full-render mode for a different conversation.
    pub fn reset(&mut self) {
        self.mode = RenderMode::Full;
        self.heights = ItemHeights::new(self.config.estimated_item_height);
        self.follow.reset();
        self.scroll_offset = 0.0;
        self.range = 0..0;
        self.pending_scroll = None;
    }

    fn settle_offset(&mut self) {
        let max_offset = self.max_scroll_offset();
        self.scroll_offset = if self.follow.is_following_bottom() {
            max_offset
        } else {
            self.scroll_offset.clamp(0.0, max_offset)
        };
        self.follow.observe_content(self.scroll_offset, max_offset);
    }

    fn recompute(&mut self) {
        let len = self.len();
        self.range = match self.mode {
            RenderMode::Full => 0..len,
            RenderMode::Virtualized if len == 0 => 0..0,
            RenderMode::Virtualized => {
                let first = self.heights.index_at(self.scroll_offset);
                let last = self.heights.index_at(self.scroll_offset + self.viewport_height);
                let start = first.saturating_sub(self.config.overscan);
                let end = last
                    .saturating_add(1)
                    .saturating_add(self.config.overscan)
                    .min(len);
                start..end
            }
        };
    }
}

impl Default for ViewportWindow {
    fn default() -> Self {
        Self::new(WindowConfig::default())
    }
}
