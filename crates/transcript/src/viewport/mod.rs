/// Follow-bottom tracking from reported scroll positions.
pub mod follow;
/// Per-item height model with prefix offsets.
pub mod heights;
/// Render-mode state machine and range computation.
pub mod window;

pub use follow::{DEFAULT_AT_BOTTOM_THRESHOLD, FollowTracker};
pub use heights::ItemHeights;
pub use window::{
    DEFAULT_ESTIMATED_ITEM_HEIGHT, DEFAULT_FULL_RENDER_THRESHOLD, DEFAULT_OVERSCAN, RenderMode,
    ScrollBehavior, ScrollRequest, ViewportWindow, WindowConfig, WindowState,
};
