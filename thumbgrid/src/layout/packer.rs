//! Greedy row packer for variable-span tiles.
//!
//! # Algorithm
//!
//! A single left-to-right pass with no lookahead:
//!
//! 1. Classify the item and derive its spans (`Wide` spans `min(2, columns)`
//!    columns, `Tall` spans 2 rows).
//! 2. If the item does not fit in the remaining columns, flush the
//!    accumulated row first.
//! 3. Append the item; flush when the row reaches `columns`.
//! 4. Flush whatever remains after the scan.
//!
//! With [`TallPolicy::OwnRow`] a tall item flushes the current row and is
//! emitted as a row of its own.

use serde::Serialize;

use super::aspect::{AspectCategory, AspectThresholds};
use crate::media::MediaItem;

/// Minimum number of columns, regardless of available width.
pub const MIN_COLUMNS: usize = 2;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: f32 = 200.0;

/// Default gap between tiles in pixels.
pub const DEFAULT_GAP: f32 = 4.0;

/// Separator between member ids in a row id.
const ROW_ID_SEPARATOR: char = '-';

/// How tall items are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TallPolicy {
    /// Tall items share the row with siblings in a double-height cell.
    #[default]
    DoubleHeight,
    /// Tall items flush the current row and occupy a row alone.
    OwnRow,
}

impl TallPolicy {
    /// Parse from a config string (`double-height` or `own-row`).
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "double-height" | "double_height" => Some(TallPolicy::DoubleHeight),
            "own-row" | "own_row" => Some(TallPolicy::OwnRow),
            _ => None,
        }
    }

    pub fn as_config_str(&self) -> &'static str {
        match self {
            TallPolicy::DoubleHeight => "double-height",
            TallPolicy::OwnRow => "own-row",
        }
    }
}

/// A media item with its placement spans.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemWithSpan {
    pub item: MediaItem,
    pub category: AspectCategory,
    pub col_span: usize,
    pub row_span: usize,
}

/// One packed row.
///
/// Rows are produced fresh by every layout pass and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRow {
    /// Concatenated member ids; stable while the item list is unchanged.
    pub id: String,
    pub items: Vec<MediaItemWithSpan>,
}

impl GridRow {
    fn from_items(items: Vec<MediaItemWithSpan>) -> Self {
        let mut id = String::new();
        for (i, placed) in items.iter().enumerate() {
            if i > 0 {
                id.push(ROW_ID_SEPARATOR);
            }
            id.push_str(&placed.item.id);
        }
        Self { id, items }
    }

    /// Sum of column spans in this row.
    pub fn column_count(&self) -> usize {
        self.items.iter().map(|p| p.col_span).sum()
    }

    /// Largest row span in this row.
    pub fn max_row_span(&self) -> usize {
        self.items.iter().map(|p| p.row_span).max().unwrap_or(1)
    }

    /// Rendered height of the row in pixels.
    pub fn height(&self, tile_size: f32, gap: f32) -> f32 {
        let span = self.max_row_span() as f32;
        tile_size * span + gap * (span - 1.0)
    }
}

/// Configuration for the layout packer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackerConfig {
    /// Tile edge length in pixels.
    pub tile_size: f32,
    /// Gap between tiles in pixels.
    pub gap: f32,
    /// Placement of tall items.
    pub tall_policy: TallPolicy,
    /// Aspect ratio thresholds.
    pub thresholds: AspectThresholds,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            gap: DEFAULT_GAP,
            tall_policy: TallPolicy::default(),
            thresholds: AspectThresholds::default(),
        }
    }
}

/// Deterministic greedy packer.
#[derive(Debug, Clone, Default)]
pub struct LayoutPacker {
    config: PackerConfig,
}

impl LayoutPacker {
    /// Create a packer with the given configuration.
    pub fn new(config: PackerConfig) -> Self {
        Self { config }
    }

    /// Get the packer configuration.
    pub fn config(&self) -> &PackerConfig {
        &self.config
    }

    /// Number of columns that fit into `available_width`, never below
    /// [`MIN_COLUMNS`].
    pub fn columns_for_width(&self, available_width: f32) -> usize {
        columns_for_width(available_width, self.config.tile_size, self.config.gap)
    }

    /// Pack `items` into rows of at most `columns` column-spans.
    pub fn pack(&self, items: &[MediaItem], columns: usize) -> Vec<GridRow> {
        let columns = columns.max(MIN_COLUMNS);
        let mut rows = Vec::new();
        let mut current: Vec<MediaItemWithSpan> = Vec::new();
        let mut used = 0usize;

        for item in items {
            let placed = self.place(item, columns);

            if placed.category == AspectCategory::Tall
                && self.config.tall_policy == TallPolicy::OwnRow
            {
                flush(&mut rows, &mut current, &mut used);
                rows.push(GridRow::from_items(vec![placed]));
                continue;
            }

            if used + placed.col_span > columns {
                flush(&mut rows, &mut current, &mut used);
            }

            used += placed.col_span;
            current.push(placed);

            if used >= columns {
                flush(&mut rows, &mut current, &mut used);
            }
        }

        flush(&mut rows, &mut current, &mut used);
        rows
    }

    fn place(&self, item: &MediaItem, columns: usize) -> MediaItemWithSpan {
        let category = self.config.thresholds.classify(item);
        let col_span = match category {
            AspectCategory::Wide => 2.min(columns),
            _ => 1,
        };
        let row_span = match category {
            AspectCategory::Tall => 2,
            _ => 1,
        };
        MediaItemWithSpan {
            item: item.clone(),
            category,
            col_span,
            row_span,
        }
    }
}

fn flush(rows: &mut Vec<GridRow>, current: &mut Vec<MediaItemWithSpan>, used: &mut usize) {
    if !current.is_empty() {
        rows.push(GridRow::from_items(std::mem::take(current)));
    }
    *used = 0;
}

/// Number of `tile_size` columns separated by `gap` that fit into
/// `available_width`, floored to [`MIN_COLUMNS`].
pub fn columns_for_width(available_width: f32, tile_size: f32, gap: f32) -> usize {
    let pitch = tile_size + gap;
    if pitch <= 0.0 || !available_width.is_finite() || available_width <= 0.0 {
        return MIN_COLUMNS;
    }
    let fit = ((available_width + gap) / pitch).floor() as usize;
    fit.max(MIN_COLUMNS)
}

/// Pack with default thresholds and tall policy.
pub fn pack(items: &[MediaItem], columns: usize, gap: f32, tile_size: f32) -> Vec<GridRow> {
    LayoutPacker::new(PackerConfig {
        tile_size,
        gap,
        ..PackerConfig::default()
    })
    .pack(items, columns)
}
