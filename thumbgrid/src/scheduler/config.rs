//! Scheduler configuration.

use std::time::Duration;

use super::priority::PriorityPolicy;

/// Default debounce for range-driven demand.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Default age after which an in-flight request is considered lost.
pub const DEFAULT_IN_FLIGHT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default capacity of the ready-event broadcast channel.
pub const DEFAULT_READY_CHANNEL_CAPACITY: usize = 1024;

/// Configuration for [`RequestScheduler`](super::RequestScheduler).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay applied to range-driven demand.
    pub debounce: Duration,
    /// In-flight requests older than this may be dispatched again.
    pub in_flight_timeout: Duration,
    /// Capacity of the ready-event broadcast channel.
    pub ready_channel_capacity: usize,
    /// Priority computation for range demand.
    pub priority: PriorityPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            in_flight_timeout: DEFAULT_IN_FLIGHT_TIMEOUT,
            ready_channel_capacity: DEFAULT_READY_CHANNEL_CAPACITY,
            priority: PriorityPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_in_flight_timeout(mut self, timeout: Duration) -> Self {
        self.in_flight_timeout = timeout;
        self
    }

    pub fn with_priority(mut self, priority: PriorityPolicy) -> Self {
        self.priority = priority;
        self
    }
}
