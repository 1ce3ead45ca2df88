//! The grid facade.
//!
//! [`ThumbnailGrid`] is the one grid implementation: the host picks between
//! a virtualized list (`embedded = false`, demand driven by rendered index
//! ranges and debounced) and an embedded grid (`embedded = true`, demand
//! driven by intersection batches and flushed immediately). Date grouping is
//! an option of either.
//!
//! ```text
//! set_items ──► layout ──► sections / rows ──► VisibilityTracker bounds
//!                               │
//!      on_range_change ─────────┼──► RangeTracker ──► demand_range  (debounced)
//!      on_intersection ─────────┴──► IntersectionBatcher ──► demand_visible (immediate)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::layout::{
    AspectThresholds, GridRow, LayoutPacker, PackerConfig, TallPolicy, DEFAULT_GAP,
    DEFAULT_TILE_SIZE,
};
use crate::loader::{LoaderConfig, ScrollActivity, TileLoader};
use crate::media::MediaItem;
use crate::scheduler::{DemandSink, FlushReport, RequestScheduler};
use crate::thumbnail::SizeTier;
use crate::visibility::{
    range_demand, BatchOutcome, ElementBounds, IntersectionBatcher, IntersectionEntry,
    RangeTracker, ViewportWindow, VisibilityConfig, VisibilityTracker, VisibleSet,
};

/// Section id for items without a capture date.
pub const UNDATED_SECTION_ID: &str = "undated";

/// Section id of the single section when not grouping.
pub const ALL_SECTION_ID: &str = "all";

/// Grid behaviour options.
#[derive(Debug, Clone)]
pub struct GridOptions {
    /// Embedded in a scrolling page rather than virtualized.
    pub embedded: bool,
    /// Split items into per-day sections.
    pub group_by_date: bool,
    pub tile_size: f32,
    pub gap: f32,
    pub tall_policy: TallPolicy,
    pub thresholds: AspectThresholds,
    /// Tier shown once loading completes.
    pub size_tier: SizeTier,
    /// Whether tiny placeholders are requested.
    pub tiny_enabled: bool,
    pub visibility: VisibilityConfig,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            embedded: false,
            group_by_date: false,
            tile_size: DEFAULT_TILE_SIZE,
            gap: DEFAULT_GAP,
            tall_policy: TallPolicy::default(),
            thresholds: AspectThresholds::default(),
            size_tier: SizeTier::Small,
            tiny_enabled: true,
            visibility: VisibilityConfig::default(),
        }
    }
}

impl GridOptions {
    pub fn embedded(mut self, embedded: bool) -> Self {
        self.embedded = embedded;
        self
    }

    pub fn group_by_date(mut self, group: bool) -> Self {
        self.group_by_date = group;
        self
    }

    pub fn with_size_tier(mut self, tier: SizeTier) -> Self {
        self.size_tier = tier;
        self
    }

    pub fn with_tall_policy(mut self, policy: TallPolicy) -> Self {
        self.tall_policy = policy;
        self
    }

    pub fn with_tiny_enabled(mut self, enabled: bool) -> Self {
        self.tiny_enabled = enabled;
        self
    }

    pub fn packer_config(&self) -> PackerConfig {
        PackerConfig {
            tile_size: self.tile_size,
            gap: self.gap,
            tall_policy: self.tall_policy,
            thresholds: self.thresholds,
        }
    }

    /// Tiers demanded for every visible item, placeholder first.
    pub fn tiers(&self) -> Vec<SizeTier> {
        if self.tiny_enabled && !self.size_tier.is_tiny() {
            vec![SizeTier::Tiny, self.size_tier]
        } else {
            vec![self.size_tier]
        }
    }
}

/// One group of packed rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSection {
    /// `YYYY-MM-DD`, `undated`, or `all` when not grouping.
    pub id: String,
    pub date: Option<NaiveDate>,
    pub rows: Vec<GridRow>,
}

/// Canonical thumbnail grid.
pub struct ThumbnailGrid {
    options: GridOptions,
    loader: LoaderConfig,
    packer: LayoutPacker,
    scheduler: Arc<RequestScheduler>,
    activity: ScrollActivity,
    tracker: VisibilityTracker,
    range: RangeTracker,
    batcher: IntersectionBatcher,
    items: Vec<MediaItem>,
    sections: Vec<GridSection>,
    rows: Vec<GridRow>,
    columns: usize,
    available_width: f32,
}

impl ThumbnailGrid {
    pub fn new(options: GridOptions, scheduler: Arc<RequestScheduler>) -> Self {
        let sink: Arc<dyn DemandSink> = scheduler.clone();
        let batcher = IntersectionBatcher::new(sink, options.tiers());
        let visibility = options.visibility;
        Self {
            packer: LayoutPacker::new(options.packer_config()),
            options,
            loader: LoaderConfig::default(),
            scheduler,
            activity: ScrollActivity::new(),
            tracker: VisibilityTracker::new(visibility.margin_px),
            range: RangeTracker::new(visibility.look_around_rows, visibility.overscan_px),
            batcher,
            items: Vec::new(),
            sections: Vec::new(),
            rows: Vec::new(),
            columns: 0,
            available_width: 0.0,
        }
    }

    /// Retry and load-delay settings for [`tile_loader`](Self::tile_loader).
    pub fn with_loader_config(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    pub fn options(&self) -> &GridOptions {
        &self.options
    }

    pub fn sections(&self) -> &[GridSection] {
        &self.sections
    }

    /// All rows in display order, across sections.
    pub fn rows(&self) -> &[GridRow] {
        &self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn tracker(&self) -> &VisibilityTracker {
        &self.tracker
    }

    /// Shared fast-scroll signal for this grid's tiles.
    pub fn scroll_activity(&self) -> &ScrollActivity {
        &self.activity
    }

    /// Pack `items` for `available_width` without changing grid state.
    pub fn layout(&self, items: &[MediaItem], available_width: f32) -> Vec<GridSection> {
        layout_sections(&self.packer, self.options.group_by_date, items, available_width)
    }

    /// Replace the item list and re-layout.
    pub fn set_items(&mut self, items: Vec<MediaItem>, available_width: f32) {
        self.items = items;
        self.available_width = available_width;
        self.relayout();
        info!(
            items = self.items.len(),
            rows = self.rows.len(),
            sections = self.sections.len(),
            columns = self.columns,
            "Grid laid out"
        );
    }

    /// Re-layout if the column count changes. Returns whether it did.
    pub fn resize(&mut self, available_width: f32) -> bool {
        self.available_width = available_width;
        if self.packer.columns_for_width(available_width) == self.columns {
            return false;
        }
        self.relayout();
        debug!(columns = self.columns, "Grid re-laid out on resize");
        true
    }

    fn relayout(&mut self) {
        self.columns = self.packer.columns_for_width(self.available_width);
        self.sections = self.layout(&self.items, self.available_width);
        self.rows = self
            .sections
            .iter()
            .flat_map(|s| s.rows.iter().cloned())
            .collect();
        self.range.reset();
        self.batcher.clear();
        self.track_rows();
    }

    fn track_rows(&self) {
        let mut offset = 0.0;
        let bounds = self.rows.iter().map(|row| {
            let height = row.height(self.options.tile_size, self.options.gap);
            let entry = (row.id.clone(), ElementBounds::new(offset, height));
            offset += height + self.options.gap;
            entry
        });
        self.tracker.replace_all(bounds.collect::<Vec<_>>());
    }

    /// Virtualized host rendered rows `[start, end]`. Returns the widened
    /// window when demand was issued.
    pub fn on_range_change(&mut self, start: usize, end: usize) -> Option<ViewportWindow> {
        if self.options.embedded {
            return None;
        }
        let window = self.range.update(start, end, self.rows.len())?;
        let demand = range_demand(&self.rows, &window);
        debug!(
            start = window.start_index,
            end = window.end_index,
            items = demand.items.len(),
            "Range demand"
        );
        self.scheduler.demand_range(demand, &self.options.tiers());
        Some(window)
    }

    /// Drive range demand from a visible row-id set published by
    /// [`tracker`](Self::tracker).
    pub fn on_visible_rows(&mut self, visible: &VisibleSet) -> Option<ViewportWindow> {
        let mut indices = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| visible.contains(&row.id))
            .map(|(i, _)| i);
        let first = indices.next()?;
        let last = indices.last().unwrap_or(first);
        self.on_range_change(first, last)
    }

    /// Embedded host delivered an intersection batch.
    pub fn on_intersection(&self, entries: &[IntersectionEntry]) -> BatchOutcome {
        if !self.options.embedded {
            return BatchOutcome::default();
        }
        self.batcher.on_entries(entries)
    }

    /// The host navigated back to this grid.
    pub async fn on_route_change(&self) -> FlushReport {
        self.scheduler.force_flush().await
    }

    /// The host window regained focus.
    pub async fn on_focus_regained(&self) -> FlushReport {
        self.scheduler.force_flush().await
    }

    /// A loader for one tile of this grid.
    pub fn tile_loader(&self) -> TileLoader {
        let config = self
            .loader
            .clone()
            .with_tiny_enabled(self.options.tiny_enabled)
            .with_full_tier(self.options.size_tier);
        TileLoader::new(self.scheduler.clone(), config, self.activity.clone())
    }
}

/// Pack `items` into sections: one per capture day when `group_by_date`,
/// otherwise a single `all` section.
pub fn layout_sections(
    packer: &LayoutPacker,
    group_by_date: bool,
    items: &[MediaItem],
    available_width: f32,
) -> Vec<GridSection> {
    let columns = packer.columns_for_width(available_width);
    if !group_by_date {
        return vec![GridSection {
            id: ALL_SECTION_ID.to_string(),
            date: None,
            rows: packer.pack(items, columns),
        }];
    }

    group_items_by_date(items)
        .into_iter()
        .map(|(date, group)| GridSection {
            id: date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| UNDATED_SECTION_ID.to_string()),
            date,
            rows: packer.pack(&group, columns),
        })
        .collect()
}

/// Group items by capture date, keeping first-appearance order.
fn group_items_by_date(items: &[MediaItem]) -> Vec<(Option<NaiveDate>, Vec<MediaItem>)> {
    let mut groups: Vec<(Option<NaiveDate>, Vec<MediaItem>)> = Vec::new();
    let mut index: HashMap<Option<NaiveDate>, usize> = HashMap::new();
    for item in items {
        let slot = *index.entry(item.taken_at).or_insert_with(|| {
            groups.push((item.taken_at, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(item.clone());
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::testing::{harness, settle};
    use std::time::Duration;

    fn item(i: usize) -> MediaItem {
        MediaItem::new(i.to_string(), format!("h{}", i), format!("/p/{}.jpg", i))
    }

    fn dated(i: usize, day: u32) -> MediaItem {
        item(i).with_taken_at(NaiveDate::from_ymd_opt(2024, 5, day).unwrap())
    }

    #[test]
    fn test_layout_groups_by_date() {
        let h = harness();
        let grid = ThumbnailGrid::new(GridOptions::default().group_by_date(true), h.scheduler);
        let items = vec![dated(0, 2), dated(1, 2), item(2), dated(3, 1)];

        let sections = grid.layout(&items, 1000.0);
        let ids: Vec<&str> = sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["2024-05-02", UNDATED_SECTION_ID, "2024-05-01"]);
        assert_eq!(sections[0].rows[0].items.len(), 2);
    }

    #[test]
    fn test_layout_without_grouping_is_single_section() {
        let h = harness();
        let grid = ThumbnailGrid::new(GridOptions::default(), h.scheduler);
        let items: Vec<_> = (0..10).map(item).collect();

        let sections = grid.layout(&items, 1000.0);
        assert_eq!(sections.len(), 1);
        // 1000px at 200px tiles with 4px gap: 4 columns.
        assert_eq!(sections[0].rows.len(), 3);
    }

    #[test]
    fn test_resize_relayouts_only_on_column_change() {
        let h = harness();
        let mut grid = ThumbnailGrid::new(GridOptions::default(), h.scheduler);
        grid.set_items((0..12).map(item).collect(), 1000.0);
        assert_eq!(grid.columns(), 4);

        assert!(!grid.resize(1010.0));
        assert!(grid.resize(1300.0));
        assert_eq!(grid.columns(), 6);
        assert_eq!(grid.rows().len(), 2);
    }

    #[test]
    fn test_tiers() {
        assert_eq!(
            GridOptions::default().tiers(),
            vec![SizeTier::Tiny, SizeTier::Small]
        );
        assert_eq!(
            GridOptions::default().with_tiny_enabled(false).tiers(),
            vec![SizeTier::Small]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_virtualized_range_demand_is_debounced() {
        let h = harness();
        let mut grid = ThumbnailGrid::new(
            GridOptions::default().with_tiny_enabled(false),
            h.scheduler.clone(),
        );
        grid.set_items((0..400).map(item).collect(), 1000.0);

        assert!(grid.on_range_change(10, 15).is_some());
        assert!(grid.on_range_change(10, 15).is_none());
        assert_eq!(h.generator.call_count(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        settle().await;
        assert_eq!(h.generator.call_count(), 1);
        // Rows 8..=17 at 4 per row.
        assert_eq!(h.generator.task_count(), 40);
    }

    #[tokio::test]
    async fn test_embedded_intersection_flushes_immediately() {
        let h = harness();
        let mut grid = ThumbnailGrid::new(GridOptions::default().embedded(true), h.scheduler.clone());
        grid.set_items((0..50).map(item).collect(), 1000.0);

        assert!(grid.on_range_change(0, 3).is_none());
        let entries: Vec<_> = (0..50).map(|i| IntersectionEntry::entering(item(i))).collect();
        let outcome = grid.on_intersection(&entries);
        assert_eq!(outcome.entered, 50);

        settle().await;
        assert_eq!(h.generator.call_count(), 1);
        assert_eq!(h.generator.task_count(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_change_forces_flush() {
        let h = harness();
        let mut grid = ThumbnailGrid::new(
            GridOptions::default().with_tiny_enabled(false),
            h.scheduler.clone(),
        );
        grid.set_items((0..40).map(item).collect(), 1000.0);
        // Rows 0..=3 after look-around, 4 items each.
        grid.on_range_change(0, 1);

        let report = grid.on_route_change().await;
        assert_eq!(report.dispatched, 16);

        tokio::time::sleep(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(h.generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_visible_rows_drive_range() {
        let h = harness();
        let mut grid = ThumbnailGrid::new(GridOptions::default(), h.scheduler.clone());
        grid.set_items((0..200).map(item).collect(), 1000.0);

        grid.tracker()
            .set_viewport(crate::visibility::Viewport::new(2_040.0, 400.0));
        let visible = grid.tracker().compute_now();
        let window = grid.on_visible_rows(&visible).unwrap();

        assert!(window.start_index <= 5);
        assert!(window.end_index >= 16);
        assert!(grid.on_visible_rows(&VisibleSet::new()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tile_loader_uses_grid_tier() {
        let h = harness();
        let grid = ThumbnailGrid::new(
            GridOptions::default()
                .with_size_tier(SizeTier::Medium)
                .with_tiny_enabled(false),
            h.scheduler.clone(),
        );
        let mut loader = grid.tile_loader();
        loader.mount(item(7));

        tokio::time::sleep(Duration::from_millis(100)).await;
        settle().await;

        let tasks = h.generator.all_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].size_tier, SizeTier::Medium);
    }
}
