//! Thumbnail request scheduling.
//!
//! The [`RequestScheduler`] receives demand from three directions and
//! decides what reaches the throughput-limited generation service:
//!
//! | Source                     | Entry point                         | Cadence          |
//! |----------------------------|-------------------------------------|------------------|
//! | Virtualized index range    | [`DemandSink::demand_range`]        | debounced 150 ms |
//! | Intersection batch         | [`DemandSink::demand_visible`]      | immediate        |
//! | Tile loader                | [`ThumbnailSource::request`]        | immediate        |
//!
//! Dispatched requests are never cancelled. Priority is a hint; the
//! generation service may reorder.

mod config;
mod demand;
mod metrics;
mod priority;
mod request;
mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    SchedulerConfig, DEFAULT_DEBOUNCE, DEFAULT_IN_FLIGHT_TIMEOUT, DEFAULT_READY_CHANNEL_CAPACITY,
};
pub use demand::{DemandSink, RangeDemand, ThumbnailSource};
pub use metrics::{SchedulerMetrics, SchedulerSnapshot};
pub use priority::{
    Priority, PriorityPolicy, DEFAULT_BASE_PRIORITY, DEFAULT_DISTANCE_FALLOFF, DEFAULT_TINY_BOOST,
};
pub use request::{FlushReport, RequestScheduler};
pub use task::{dedup_tasks, DemandOrigin, RequestTask};
