//! Demand seams between the visibility layer, tile loaders and the scheduler.

use tokio::sync::broadcast;

use super::priority::Priority;
use crate::media::MediaItem;
use crate::thumbnail::{SizeTier, ThumbnailEvent, ThumbnailKey};

/// Items around the visible center of a virtualized list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeDemand {
    /// Index of the center of the visible range.
    pub center: usize,
    /// `(index, item)` pairs to preload.
    pub items: Vec<(usize, MediaItem)>,
}

impl RangeDemand {
    pub fn new(center: usize, items: Vec<(usize, MediaItem)>) -> Self {
        Self { center, items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Receiver of visibility-driven demand.
pub trait DemandSink: Send + Sync {
    /// Replace range-driven demand. Dispatch is debounced.
    fn demand_range(&self, demand: RangeDemand, tiers: &[SizeTier]);

    /// Record or withdraw demand for one intersection batch. Newly-visible
    /// items are dispatched without debounce.
    fn demand_visible(&self, items: &[MediaItem], tiers: &[SizeTier], visible: bool);
}

/// What a tile loader needs from the scheduler.
pub trait ThumbnailSource: Send + Sync {
    /// Ready URI for `key`, if cached.
    fn cached_uri(&self, key: &ThumbnailKey) -> Option<String>;

    /// Ask for `item` at `tier`.
    fn request(&self, item: &MediaItem, tier: SizeTier, priority: Priority);

    /// Receive ready and failure notifications.
    fn subscribe(&self) -> broadcast::Receiver<ThumbnailEvent>;
}
