//! Request priority.
//!
//! Priorities are hints to the generation service: higher values are served
//! first. They are always clamped into `[Priority::MIN, Priority::MAX]`.

use serde::Serialize;

use crate::thumbnail::SizeTier;

// =============================================================================
// Priority Constants
// =============================================================================

/// Base priority of an item at the center of the visible range.
pub const DEFAULT_BASE_PRIORITY: i32 = 50;

/// Extra priority given to tiny placeholders so they land before full tiers.
pub const DEFAULT_TINY_BOOST: i32 = 30;

/// Priority lost per item of distance from the visible center.
pub const DEFAULT_DISTANCE_FALLOFF: i32 = 1;

/// Request priority, clamped to `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Priority(i32);

impl Priority {
    pub const MIN: Priority = Priority(0);
    pub const MAX: Priority = Priority(100);
    pub const BASE: Priority = Priority(DEFAULT_BASE_PRIORITY);

    pub fn new(value: i32) -> Self {
        Priority(value.clamp(Self::MIN.0, Self::MAX.0))
    }

    pub fn value(self) -> i32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::BASE
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Priority::new(value)
    }
}

/// Computes per-item priorities from position relative to the visible center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityPolicy {
    pub base: i32,
    pub tiny_boost: i32,
    pub distance_falloff: i32,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_PRIORITY,
            tiny_boost: DEFAULT_TINY_BOOST,
            distance_falloff: DEFAULT_DISTANCE_FALLOFF,
        }
    }
}

impl PriorityPolicy {
    /// Base priority for `tier`, before distance falloff.
    pub fn base_for(&self, tier: SizeTier) -> Priority {
        if tier.is_tiny() {
            Priority::new(self.base.saturating_add(self.tiny_boost))
        } else {
            Priority::new(self.base)
        }
    }

    /// Priority of the item at `index` when the visible range is centered at
    /// `center`.
    pub fn for_index(&self, index: usize, center: usize, tier: SizeTier) -> Priority {
        let distance = i32::try_from(index.abs_diff(center)).unwrap_or(i32::MAX);
        let penalty = distance.saturating_mul(self.distance_falloff);
        Priority::new(self.base_for(tier).value().saturating_sub(penalty))
    }
}
