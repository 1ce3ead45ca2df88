//! Loader configuration and the shared scroll-activity signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::scheduler::PriorityPolicy;
use crate::thumbnail::SizeTier;

/// Default automatic retries after a full-tier decode or generation failure.
pub const DEFAULT_MAX_RETRY: u32 = 3;

/// Default linear backoff unit between retries.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(400);

/// Default delay before a freshly mounted tile issues any request.
pub const DEFAULT_LOAD_DELAY: Duration = Duration::from_millis(80);

/// Configuration for [`TileLoader`](super::TileLoader).
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Whether the host supports the tiny placeholder tier.
    pub tiny_enabled: bool,
    /// Tier shown once loading completes.
    pub full_tier: SizeTier,
    /// Automatic retries before entering `Error`.
    pub max_retry: u32,
    /// Retry `n` waits `retry_base_delay * n`.
    pub retry_base_delay: Duration,
    /// Tiles unmounted within this window never issue a request.
    pub load_delay: Duration,
    /// Request priorities.
    pub priority: PriorityPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            tiny_enabled: true,
            full_tier: SizeTier::Small,
            max_retry: DEFAULT_MAX_RETRY,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            load_delay: DEFAULT_LOAD_DELAY,
            priority: PriorityPolicy::default(),
        }
    }
}

impl LoaderConfig {
    pub fn with_tiny_enabled(mut self, enabled: bool) -> Self {
        self.tiny_enabled = enabled;
        self
    }

    pub fn with_full_tier(mut self, tier: SizeTier) -> Self {
        self.full_tier = tier;
        self
    }

    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Backoff before retry number `retry` (1-based).
    pub fn retry_delay(&self, retry: u32) -> Duration {
        self.retry_base_delay.saturating_mul(retry.max(1))
    }
}

/// Whether the user is fast-scrolling. While set, tiles issue no new
/// fetches; they resume once scrolling settles.
#[derive(Debug, Clone)]
pub struct ScrollActivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ScrollActivity {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollActivity {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_fast_scrolling(&self, fast: bool) {
        self.tx.send_if_modified(|current| {
            if *current == fast {
                false
            } else {
                *current = fast;
                true
            }
        });
    }

    pub fn is_fast_scrolling(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once fast scrolling has stopped.
    pub async fn wait_until_settled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only errors if it is dropped.
        let _ = rx.wait_for(|fast| !*fast).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_is_linear() {
        let config = LoaderConfig::default();
        assert_eq!(config.retry_delay(1), Duration::from_millis(400));
        assert_eq!(config.retry_delay(2), Duration::from_millis(800));
        assert_eq!(config.retry_delay(3), Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_settled() {
        let activity = ScrollActivity::new();
        activity.set_fast_scrolling(true);

        let waiter = {
            let activity = activity.clone();
            tokio::spawn(async move { activity.wait_until_settled().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiter.is_finished());

        activity.set_fast_scrolling(false);
        waiter.await.unwrap();
        assert!(!activity.is_fast_scrolling());
    }
}
