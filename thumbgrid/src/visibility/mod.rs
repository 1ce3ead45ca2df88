//! Visibility tracking.
//!
//! Three modes, one per host style:
//!
//! - [`VisibilityTracker`]: element bounds plus viewport, frame-coalesced.
//! - [`RangeTracker`]: rendered index range from a virtualization host, widened
//!   by a look-around.
//! - [`IntersectionBatcher`]: intersection-observer batches, one demand per
//!   batch.

mod geometry;
mod intersection;
mod range;
mod tracker;

pub use geometry::{ElementBounds, Viewport, DEFAULT_MARGIN_PX};
pub use intersection::{BatchOutcome, IntersectionBatcher, IntersectionEntry};
pub use range::{
    range_demand, RangeTracker, ViewportWindow, DEFAULT_LOOK_AROUND_ROWS, DEFAULT_OVERSCAN_PX,
};
pub use tracker::{VisibilityTracker, VisibleSet};

/// Visibility tuning shared by the three modes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityConfig {
    /// Distance beyond the viewport still treated as visible.
    pub margin_px: f32,
    /// Rows preloaded around a rendered index range.
    pub look_around_rows: usize,
    /// Overscan reported to the virtualization host.
    pub overscan_px: f32,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            margin_px: DEFAULT_MARGIN_PX,
            look_around_rows: DEFAULT_LOOK_AROUND_ROWS,
            overscan_px: DEFAULT_OVERSCAN_PX,
        }
    }
}
