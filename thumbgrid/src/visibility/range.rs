//! Index-range visibility for virtualized lists.
//!
//! The virtualization host reports which rows it renders; the tracker widens
//! that by a fixed look-around and reports a new [`ViewportWindow`] only when
//! the widened range changes.

use serde::Serialize;

use crate::layout::GridRow;
use crate::scheduler::RangeDemand;

/// Rows preloaded on each side of the rendered range.
pub const DEFAULT_LOOK_AROUND_ROWS: usize = 2;

/// Default overscan reported to the virtualization host.
pub const DEFAULT_OVERSCAN_PX: f32 = 600.0;

/// Row range to preload, inclusive on both ends, along with the rows the
/// host actually renders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportWindow {
    pub start_index: usize,
    pub end_index: usize,
    pub rendered_start: usize,
    pub rendered_end: usize,
    pub overscan_px: f32,
}

impl ViewportWindow {
    pub fn row_count(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    pub fn contains(&self, row: usize) -> bool {
        (self.start_index..=self.end_index).contains(&row)
    }

    /// Middle of the rendered rows. The look-around is clipped at the list
    /// ends, so this is not always the middle of the window.
    pub fn center(&self) -> usize {
        self.rendered_start + (self.rendered_end - self.rendered_start) / 2
    }
}

/// Widens rendered ranges and suppresses repeats.
#[derive(Debug, Clone)]
pub struct RangeTracker {
    look_around: usize,
    overscan_px: f32,
    last: Option<ViewportWindow>,
}

impl Default for RangeTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LOOK_AROUND_ROWS, DEFAULT_OVERSCAN_PX)
    }
}

impl RangeTracker {
    pub fn new(look_around: usize, overscan_px: f32) -> Self {
        Self {
            look_around,
            overscan_px,
            last: None,
        }
    }

    pub fn current(&self) -> Option<ViewportWindow> {
        self.last
    }

    /// Forget the last window, e.g. after the row list was rebuilt.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Record the rendered range `[start, end]` over `row_count` rows.
    /// Returns the widened window only if it differs from the last one.
    pub fn update(&mut self, start: usize, end: usize, row_count: usize) -> Option<ViewportWindow> {
        if row_count == 0 {
            self.last = None;
            return None;
        }
        let last_row = row_count - 1;
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let start = start.min(last_row);
        let end = end.min(last_row);

        let window = ViewportWindow {
            start_index: start.saturating_sub(self.look_around),
            end_index: end.saturating_add(self.look_around).min(last_row),
            rendered_start: start,
            rendered_end: end,
            overscan_px: self.overscan_px,
        };

        if self.last == Some(window) {
            return None;
        }
        self.last = Some(window);
        Some(window)
    }
}

/// Items of the rows in `window`, indexed by their position in the flattened
/// item list, centered on the middle rendered row.
pub fn range_demand(rows: &[GridRow], window: &ViewportWindow) -> RangeDemand {
    let mut flat_index = 0;
    let mut center = 0;
    let mut items = Vec::new();

    for (row_index, row) in rows.iter().enumerate() {
        if row_index > window.end_index {
            break;
        }
        if row_index == window.center() {
            center = flat_index;
        }
        if window.contains(row_index) {
            items.extend(
                row.items
                    .iter()
                    .enumerate()
                    .map(|(i, placed)| (flat_index + i, placed.item.clone())),
            );
        }
        flat_index += row.items.len();
    }

    RangeDemand::new(center, items)
}
