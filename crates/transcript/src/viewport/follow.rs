/// Near-bottom distance used when no explicit threshold is configured.
pub const DEFAULT_AT_BOTTOM_THRESHOLD: f32 = 24.0;
/// Small delta used to ignore floating-point scroll jitter.
const SCROLL_DELTA_EPSILON: f32 = 1.0;

/// Tracks whether the view should stick to the newest item.
///
/// Offsets are top-origin: 0 is the first row and `max_offset` is the position
/// where the last row touches the bottom edge.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowTracker {
    at_bottom_threshold: f32,
    follow_bottom: bool,
    pending_scroll_to_bottom: bool,
    last_offset: f32,
    last_max_offset: f32,
}

impl FollowTracker {
    pub fn new(at_bottom_threshold: f32) -> Self {
        let at_bottom_threshold = if at_bottom_threshold.is_finite() {
            at_bottom_threshold.max(0.0)
        } else {
            DEFAULT_AT_BOTTOM_THRESHOLD
        };

        Self {
            at_bottom_threshold,
            follow_bottom: true,
            pending_scroll_to_bottom: false,
            last_offset: 0.0,
            last_max_offset: 0.0,
        }
    }

    pub fn is_following_bottom(&self) -> bool {
        self.follow_bottom
    }

    pub fn has_pending_scroll(&self) -> bool {
        self.pending_scroll_to_bottom
    }

    /// Explicit jump to the tail; always re-enables follow mode.
    pub fn request_scroll_to_bottom(&mut self) {
        self.pending_scroll_to_bottom = true;
        self.follow_bottom = true;
    }

    /// Queues a tail scroll only when follow mode is active.
    pub fn request_scroll_to_bottom_if_following(&mut self) -> bool {
        if self.follow_bottom {
            self.pending_scroll_to_bottom = true;
        }
        self.pending_scroll_to_bottom
    }

    /// Leaves follow mode, for navigation to an earlier row.
    pub fn pause(&mut self) {
        self.follow_bottom = false;
        self.pending_scroll_to_bottom = false;
    }

    pub fn reset(&mut self) {
        self.last_offset = 0.0;
        self.last_max_offset = 0.0;
        self.follow_bottom = true;
        self.pending_scroll_to_bottom = false;
    }

    /// Feeds one reported scroll position.
    pub fn update(&mut self, offset: f32, max_offset: f32) {
        let offset_delta = offset - self.last_offset;
        let content_size_changed =
            (max_offset - self.last_max_offset).abs() > SCROLL_DELTA_EPSILON;
        let user_scrolled_up = offset_delta < -SCROLL_DELTA_EPSILON && !content_size_changed;
        let user_scrolled_down = offset_delta > SCROLL_DELTA_EPSILON && !content_size_changed;
        let near_bottom = self.is_near_bottom(offset, max_offset);

        if self.pending_scroll_to_bottom {
            // Keep follow mode while a tail request is in flight; intermediate
            // positions of a smooth scroll must not read as the user leaving.
            self.follow_bottom = true;
            if near_bottom {
                self.pending_scroll_to_bottom = false;
            }
        } else if self.follow_bottom {
            if user_scrolled_up && !near_bottom {
                self.follow_bottom = false;
            }
        } else if user_scrolled_down && near_bottom {
            self.follow_bottom = true;
        }

        self.last_offset = offset;
        self.last_max_offset = max_offset;
    }

    /// Records a position the owner applied itself, such as a content-size
    /// change or a pinned tail. Never treated as user input.
    ///
    /// A pending tail request is satisfied once the applied position is near
    /// the bottom.
    pub fn observe_content(&mut self, offset: f32, max_offset: f32) {
        if self.pending_scroll_to_bottom && self.is_near_bottom(offset, max_offset) {
            self.pending_scroll_to_bottom = false;
        }
        self.last_offset = offset;
        self.last_max_offset = max_offset;
    }

    pub fn is_near_bottom(&self, offset: f32, max_offset: f32) -> bool {
        if max_offset <= 0.0 {
            return true;
        }

        (max_offset - offset).abs() <= self.at_bottom_threshold
    }
}

impl Default for FollowTracker {
    fn default() -> Self {
        Self::new(DEFAULT_AT_BOTTOM_THRESHOLD)
    }
}
