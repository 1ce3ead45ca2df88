//! Vertical geometry in scroll-content coordinates.

use serde::Serialize;

/// Default distance beyond the viewport edges still counted as visible.
pub const DEFAULT_MARGIN_PX: f32 = 1000.0;

/// Vertical extent of a tracked element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElementBounds {
    pub top: f32,
    pub bottom: f32,
}

impl ElementBounds {
    pub fn new(top: f32, height: f32) -> Self {
        Self {
            top,
            bottom: top + height.max(0.0),
        }
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// The scroll container's visible window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Viewport {
    pub scroll_top: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(scroll_top: f32, height: f32) -> Self {
        Self { scroll_top, height }
    }

    pub fn top(&self) -> f32 {
        self.scroll_top
    }

    pub fn bottom(&self) -> f32 {
        self.scroll_top + self.height
    }

    /// `bottom >= top - margin && top <= bottom + margin`
    pub fn is_visible(&self, bounds: &ElementBounds, margin: f32) -> bool {
        bounds.bottom >= self.top() - margin && bounds.top <= self.bottom() + margin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_margin_extends_visibility() {
        let viewport = Viewport::new(5_000.0, 800.0);

        assert!(viewport.is_visible(&ElementBounds::new(5_100.0, 200.0), 0.0));
        assert!(!viewport.is_visible(&ElementBounds::new(6_500.0, 200.0), 0.0));
        assert!(viewport.is_visible(&ElementBounds::new(6_500.0, 200.0), DEFAULT_MARGIN_PX));
        assert!(viewport.is_visible(&ElementBounds::new(3_800.0, 200.0), DEFAULT_MARGIN_PX));
        assert!(!viewport.is_visible(&ElementBounds::new(3_700.0, 200.0), DEFAULT_MARGIN_PX));
    }

    #[test]
    fn test_edges_are_inclusive() {
        let viewport = Viewport::new(1_000.0, 500.0);
        assert!(viewport.is_visible(&ElementBounds::new(800.0, 200.0), 0.0));
        assert!(viewport.is_visible(&ElementBounds::new(1_500.0, 200.0), 0.0));
    }
}
