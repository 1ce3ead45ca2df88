//! Aspect classification of media items.

use serde::Serialize;

use crate::media::MediaItem;

/// Default width/height ratio at or above which an item is `Wide`.
pub const DEFAULT_WIDE_RATIO: f64 = 1.5;

/// Default width/height ratio at or below which an item is `Tall`.
pub const DEFAULT_TALL_RATIO: f64 = 0.75;

/// Layout category derived from an item's width/height ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectCategory {
    /// Occupies one cell.
    Normal,
    /// Spans up to two columns.
    Wide,
    /// Spans two rows, or sits on its own row depending on `TallPolicy`.
    Tall,
}

impl AspectCategory {
    /// Short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectCategory::Normal => "normal",
            AspectCategory::Wide => "wide",
            AspectCategory::Tall => "tall",
        }
    }
}

/// Ratio thresholds used for classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectThresholds {
    /// Ratio at or above which an item is wide.
    pub wide_ratio: f64,
    /// Ratio at or below which an item is tall.
    pub tall_ratio: f64,
}

impl Default for AspectThresholds {
    fn default() -> Self {
        Self {
            wide_ratio: DEFAULT_WIDE_RATIO,
            tall_ratio: DEFAULT_TALL_RATIO,
        }
    }
}

impl AspectThresholds {
    /// Classify an item. Missing or zero dimensions classify as `Normal`.
    pub fn classify(&self, item: &MediaItem) -> AspectCategory {
        match item.aspect_ratio() {
            Some(ratio) if ratio >= self.wide_ratio => AspectCategory::Wide,
            Some(ratio) if ratio <= self.tall_ratio => AspectCategory::Tall,
            _ => AspectCategory::Normal,
        }
    }
}
