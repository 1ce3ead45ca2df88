//! Intersection-observer batching for embedded (non-virtualized) grids.
//!
//! The host delivers intersection changes in batches. Each batch becomes at
//! most one demand call for the items that just became visible, plus at most
//! one withdrawal for the items that left.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::media::MediaItem;
use crate::scheduler::DemandSink;
use crate::thumbnail::SizeTier;

/// One observed tile.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionEntry {
    pub item: MediaItem,
    pub is_intersecting: bool,
}

impl IntersectionEntry {
    pub fn entering(item: MediaItem) -> Self {
        Self {
            item,
            is_intersecting: true,
        }
    }

    pub fn leaving(item: MediaItem) -> Self {
        Self {
            item,
            is_intersecting: false,
        }
    }
}

/// Counts from one processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub entered: usize,
    pub left: usize,
}

/// Turns observer batches into demand calls.
pub struct IntersectionBatcher {
    sink: Arc<dyn DemandSink>,
    tiers: Vec<SizeTier>,
    visible: Mutex<HashSet<String>>,
}

impl IntersectionBatcher {
    pub fn new(sink: Arc<dyn DemandSink>, tiers: Vec<SizeTier>) -> Self {
        Self {
            sink,
            tiers,
            visible: Mutex::new(HashSet::new()),
        }
    }

    /// Process one observer callback.
    pub fn on_entries(&self, entries: &[IntersectionEntry]) -> BatchOutcome {
        let mut entered = Vec::new();
        let mut left = Vec::new();
        {
            let mut visible = self.visible.lock();
            for entry in entries {
                if entry.is_intersecting {
                    if visible.insert(entry.item.id.clone()) {
                        entered.push(entry.item.clone());
                    }
                } else if visible.remove(&entry.item.id) {
                    left.push(entry.item.clone());
                }
            }
        }

        if !entered.is_empty() {
            self.sink.demand_visible(&entered, &self.tiers, true);
        }
        if !left.is_empty() {
            self.sink.demand_visible(&left, &self.tiers, false);
        }
        trace!(entered = entered.len(), left = left.len(), "Intersection batch");

        BatchOutcome {
            entered: entered.len(),
            left: left.len(),
        }
    }

    pub fn visible_count(&self) -> usize {
        self.visible.lock().len()
    }

    /// Forget all visibility, e.g. when the grid is rebuilt.
    pub fn clear(&self) {
        self.visible.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::RangeDemand;

    #[derive(Default)]
    struct CountingSink {
        calls: Mutex<Vec<(usize, bool)>>,
    }

    impl DemandSink for CountingSink {
        fn demand_range(&self, _demand: RangeDemand, _tiers: &[SizeTier]) {}

        fn demand_visible(&self, items: &[MediaItem], _tiers: &[SizeTier], visible: bool) {
            self.calls.lock().push((items.len(), visible));
        }
    }

    fn item(i: usize) -> MediaItem {
        MediaItem::new(i.to_string(), format!("h{}", i), format!("/{}.jpg", i))
    }

    #[test]
    fn test_one_batch_one_demand() {
        let sink = Arc::new(CountingSink::default());
        let batcher = IntersectionBatcher::new(sink.clone(), vec![SizeTier::Tiny, SizeTier::Small]);

        let entries: Vec<_> = (0..50).map(|i| IntersectionEntry::entering(item(i))).collect();
        let outcome = batcher.on_entries(&entries);

        assert_eq!(outcome.entered, 50);
        assert_eq!(*sink.calls.lock(), vec![(50, true)]);
    }

    #[test]
    fn test_already_visible_items_are_not_redemanded() {
        let sink = Arc::new(CountingSink::default());
        let batcher = IntersectionBatcher::new(sink.clone(), vec![SizeTier::Small]);

        batcher.on_entries(&[IntersectionEntry::entering(item(1))]);
        let outcome = batcher.on_entries(&[
            IntersectionEntry::entering(item(1)),
            IntersectionEntry::entering(item(2)),
        ]);

        assert_eq!(outcome.entered, 1);
        assert_eq!(*sink.calls.lock(), vec![(1, true), (1, true)]);
    }

    #[test]
    fn test_leaving_items_are_withdrawn_in_one_call() {
        let sink = Arc::new(CountingSink::default());
        let batcher = IntersectionBatcher::new(sink.clone(), vec![SizeTier::Small]);

        let entering: Vec<_> = (0..5).map(|i| IntersectionEntry::entering(item(i))).collect();
        batcher.on_entries(&entering);
        let leaving: Vec<_> = (0..3).map(|i| IntersectionEntry::leaving(item(i))).collect();
        let outcome = batcher.on_entries(&leaving);

        assert_eq!(outcome.left, 3);
        assert_eq!(batcher.visible_count(), 2);
        assert_eq!(sink.calls.lock().last(), Some(&(3, false)));
    }

    #[test]
    fn test_unknown_leaving_item_is_ignored() {
        let sink = Arc::new(CountingSink::default());
        let batcher = IntersectionBatcher::new(sink.clone(), vec![SizeTier::Small]);
        let outcome = batcher.on_entries(&[IntersectionEntry::leaving(item(9))]);
        assert_eq!(outcome, BatchOutcome::default());
        assert!(sink.calls.lock().is_empty());
    }
}
