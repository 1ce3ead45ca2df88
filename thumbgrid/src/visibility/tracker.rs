//! Geometry-driven visible-set tracking.
//!
//! Scroll and resize events only record the new viewport; the geometry check
//! runs once per frame through a [`FrameCoalescer`]. The visible id set is
//! republished only when it changes.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::trace;

use super::geometry::{ElementBounds, Viewport, DEFAULT_MARGIN_PX};
use crate::timer::FrameCoalescer;

/// Visible element ids.
pub type VisibleSet = BTreeSet<String>;

struct TrackerState {
    margin: f32,
    elements: Mutex<HashMap<String, ElementBounds>>,
    viewport: Mutex<Viewport>,
    tx: watch::Sender<VisibleSet>,
}

impl TrackerState {
    fn compute(&self) -> VisibleSet {
        let viewport = *self.viewport.lock();
        self.elements
            .lock()
            .iter()
            .filter(|(_, bounds)| viewport.is_visible(bounds, self.margin))
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn publish(&self) -> VisibleSet {
        let visible = self.compute();
        let changed = self.tx.send_if_modified(|current| {
            if *current == visible {
                false
            } else {
                *current = visible.clone();
                true
            }
        });
        if changed {
            trace!(visible = visible.len(), "Visible set changed");
        }
        visible
    }
}

/// Tracks element bounds by group or row id and publishes the visible set.
pub struct VisibilityTracker {
    state: Arc<TrackerState>,
    frame: FrameCoalescer,
}

impl Default for VisibilityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN_PX)
    }
}

impl VisibilityTracker {
    pub fn new(margin: f32) -> Self {
        Self::with_frame(margin, FrameCoalescer::default())
    }

    pub fn with_frame(margin: f32, frame: FrameCoalescer) -> Self {
        let (tx, _) = watch::channel(VisibleSet::new());
        Self {
            state: Arc::new(TrackerState {
                margin,
                elements: Mutex::new(HashMap::new()),
                viewport: Mutex::new(Viewport::default()),
                tx,
            }),
            frame,
        }
    }

    pub fn margin(&self) -> f32 {
        self.state.margin
    }

    /// Register or move an element.
    pub fn track(&self, id: impl Into<String>, bounds: ElementBounds) {
        self.state.elements.lock().insert(id.into(), bounds);
    }

    pub fn untrack(&self, id: &str) {
        self.state.elements.lock().remove(id);
    }

    /// Replace every tracked element.
    pub fn replace_all(&self, elements: impl IntoIterator<Item = (String, ElementBounds)>) {
        let mut map = self.state.elements.lock();
        map.clear();
        map.extend(elements);
    }

    pub fn on_scroll(&self, scroll_top: f32) {
        self.state.viewport.lock().scroll_top = scroll_top;
        self.request_frame();
    }

    pub fn on_resize(&self, height: f32) {
        self.state.viewport.lock().height = height;
        self.request_frame();
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        *self.state.viewport.lock() = viewport;
        self.request_frame();
    }

    fn request_frame(&self) {
        let state = Arc::clone(&self.state);
        self.frame.request(move || {
            state.publish();
        });
    }

    /// Run the geometry check immediately, bypassing frame coalescing.
    pub fn compute_now(&self) -> VisibleSet {
        self.state.publish()
    }

    /// Last published visible set.
    pub fn visible(&self) -> VisibleSet {
        self.state.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<VisibleSet> {
        self.state.tx.subscribe()
    }
}
