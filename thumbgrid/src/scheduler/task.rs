//! Pending request tasks.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tokio::time::Instant;

use super::priority::Priority;
use crate::media::MediaItem;
use crate::thumbnail::{GenerationTask, SizeTier, ThumbnailKey};

/// Global sequence counter for FIFO ordering within a priority level.
static SEQUENCE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_sequence() -> u64 {
    SEQUENCE_COUNTER.fetch_add(1, AtomicOrdering::Relaxed)
}

/// Which signal produced a demand.
///
/// Range demand is replaced wholesale on every range change; visible and
/// per-tile demand accumulate until flushed or withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemandOrigin {
    /// Virtualized index range (debounced).
    Range,
    /// Intersection batch (flushed immediately).
    Visible,
    /// A single tile loader.
    Tile,
}

/// A thumbnail the scheduler wants generated.
#[derive(Debug, Clone)]
pub struct RequestTask {
    pub key: ThumbnailKey,
    pub source_path: PathBuf,
    pub priority: Priority,
    pub enqueued_at: Instant,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub origin: DemandOrigin,
    sequence: u64,
}

impl RequestTask {
    pub fn new(item: &MediaItem, tier: SizeTier, priority: Priority, origin: DemandOrigin) -> Self {
        Self {
            key: ThumbnailKey::new(item.content_hash.clone(), tier),
            source_path: item.source_path.clone(),
            priority,
            enqueued_at: Instant::now(),
            width: item.width,
            height: item.height,
            origin,
            sequence: next_sequence(),
        }
    }

    /// Merge a repeat demand for the same key: keep the higher priority and
    /// the earlier position.
    pub fn merge(&mut self, other: RequestTask) {
        if other.priority > self.priority {
            self.priority = other.priority;
            self.origin = other.origin;
        }
    }

    /// Dispatch order: priority descending, then FIFO.
    pub fn dispatch_order(a: &RequestTask, b: &RequestTask) -> Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.sequence.cmp(&b.sequence))
    }

    pub fn to_generation_task(&self) -> GenerationTask {
        GenerationTask {
            source_path: self.source_path.clone(),
            content_hash: self.key.content_hash.clone(),
            size_tier: self.key.size_tier,
            priority: self.priority.value(),
            width: self.width,
            height: self.height,
        }
    }
}

/// Deduplicate by key, keeping the highest priority.
pub fn dedup_tasks(tasks: Vec<RequestTask>) -> Vec<RequestTask> {
    let mut by_key: HashMap<ThumbnailKey, RequestTask> = HashMap::with_capacity(tasks.len());
    for task in tasks {
        match by_key.get_mut(&task.key) {
            Some(existing) => existing.merge(task),
            None => {
                by_key.insert(task.key.clone(), task);
            }
        }
    }
    let mut unique: Vec<RequestTask> = by_key.into_values().collect();
    unique.sort_by(RequestTask::dispatch_order);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> MediaItem {
        MediaItem::new(id, format!("hash-{}", id), format!("/p/{}.jpg", id))
    }

    #[test]
    fn test_dedup_keeps_max_priority() {
        let tasks = vec![
            RequestTask::new(&item("a"), SizeTier::Small, Priority::new(10), DemandOrigin::Range),
            RequestTask::new(&item("a"), SizeTier::Small, Priority::new(70), DemandOrigin::Visible),
            RequestTask::new(&item("a"), SizeTier::Small, Priority::new(30), DemandOrigin::Tile),
        ];
        let unique = dedup_tasks(tasks);

        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].priority.value(), 70);
        assert_eq!(unique[0].origin, DemandOrigin::Visible);
    }

    #[test]
    fn test_tiers_are_distinct_keys() {
        let tasks = vec![
            RequestTask::new(&item("a"), SizeTier::Tiny, Priority::new(80), DemandOrigin::Tile),
            RequestTask::new(&item("a"), SizeTier::Small, Priority::new(50), DemandOrigin::Tile),
        ];
        assert_eq!(dedup_tasks(tasks).len(), 2);
    }

    #[test]
    fn test_dispatch_order_priority_then_fifo() {
        let tasks = vec![
            RequestTask::new(&item("a"), SizeTier::Small, Priority::new(40), DemandOrigin::Range),
            RequestTask::new(&item("b"), SizeTier::Small, Priority::new(90), DemandOrigin::Range),
            RequestTask::new(&item("c"), SizeTier::Small, Priority::new(40), DemandOrigin::Range),
        ];
        let order: Vec<String> = dedup_tasks(tasks)
            .into_iter()
            .map(|t| t.key.content_hash)
            .collect();
        assert_eq!(order, vec!["hash-b", "hash-a", "hash-c"]);
    }

    #[test]
    fn test_generation_task_conversion() {
        let item = item("a").with_dimensions(4000, 3000);
        let task = RequestTask::new(&item, SizeTier::Medium, Priority::new(55), DemandOrigin::Tile);
        let gen = task.to_generation_task();
        assert_eq!(gen.content_hash, "hash-a");
        assert_eq!(gen.priority, 55);
        assert_eq!(gen.width, Some(4000));
        assert_eq!(gen.size_tier, SizeTier::Medium);
    }
}
