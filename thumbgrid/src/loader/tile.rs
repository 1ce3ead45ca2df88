//! Per-tile progressive loader.
//!
//! Each mounted tile owns three independently cancellable lifetimes:
//!
//! - the **fetch** task: load delay (or scroll-settle wait) before issuing a
//!   request,
//! - the **retry** task: linear backoff after a full-tier failure,
//! - the **listener**: ready and failure notifications from the scheduler.
//!
//! All three are [`ScheduledTask`]s; unmount, remount and drop abort them.
//! A full-tier generation failure takes the same backoff path as a decode
//! failure; a tiny-tier one falls through to the full tier.
//! Every state write is tagged with the mount epoch, so late work from a
//! previous mount never touches the current one.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use super::config::{LoaderConfig, ScrollActivity};
use super::state::{DecodeError, LoadState, TileSnapshot};
use crate::media::MediaItem;
use crate::scheduler::ThumbnailSource;
use crate::thumbnail::{SizeTier, ThumbnailEvent, ThumbnailKey, ThumbnailReady};
use crate::timer::ScheduledTask;

/// Task handle shared between the loader and the work it spawns.
#[derive(Clone, Default)]
struct TaskSlot(Arc<Mutex<Option<ScheduledTask>>>);

impl TaskSlot {
    /// Replace the held task, aborting the previous one.
    fn set(&self, task: ScheduledTask) {
        let previous = self.0.lock().replace(task);
        drop(previous);
    }

    fn clear(&self) {
        let previous = self.0.lock().take();
        drop(previous);
    }

    fn is_pending(&self) -> bool {
        self.0
            .lock()
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }
}

struct TileInner {
    item: Option<MediaItem>,
    epoch: u64,
    snapshot: TileSnapshot,
}

/// State shared between the loader and its spawned tasks.
#[derive(Clone)]
struct TileCore {
    source: Arc<dyn ThumbnailSource>,
    config: Arc<LoaderConfig>,
    activity: ScrollActivity,
    inner: Arc<Mutex<TileInner>>,
    tx: Arc<watch::Sender<TileSnapshot>>,
    fetch: TaskSlot,
    retry: TaskSlot,
}

impl TileCore {
    fn key(&self, item: &MediaItem, tier: SizeTier) -> ThumbnailKey {
        ThumbnailKey::new(item.content_hash.clone(), tier)
    }

    /// Apply `f` if `epoch` is still current, then publish.
    fn update(&self, epoch: u64, f: impl FnOnce(&mut TileSnapshot, &MediaItem)) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return false;
        }
        let Some(item) = inner.item.clone() else {
            return false;
        };
        f(&mut inner.snapshot, &item);
        self.tx.send_replace(inner.snapshot.clone());
        true
    }

    fn current_item(&self, epoch: u64) -> Option<MediaItem> {
        let inner = self.inner.lock();
        (inner.epoch == epoch).then(|| inner.item.clone()).flatten()
    }

    /// Enter `RequestingTiny` and ask for the placeholder.
    fn issue_tiny(&self, epoch: u64) {
        let Some(item) = self.current_item(epoch) else {
            return;
        };
        let key = self.key(&item, SizeTier::Tiny);
        let cached = self.source.cached_uri(&key);
        let needs_request = cached.is_none();

        self.update(epoch, |snap, _| {
            snap.state = LoadState::RequestingTiny;
            snap.tiny_uri = cached;
        });

        if needs_request {
            trace!(key = %key, "Requesting tiny thumbnail");
            let priority = self.config.priority.base_for(SizeTier::Tiny);
            self.source.request(&item, SizeTier::Tiny, priority);
        }
    }

    /// Enter `RequestingFull` and ask for the full tier. A cached URI is
    /// handed to the host directly.
    fn issue_full(&self, epoch: u64, bump_attempt: bool) {
        let Some(item) = self.current_item(epoch) else {
            return;
        };
        let tier = self.config.full_tier;
        let key = self.key(&item, tier);
        let cached = self.source.cached_uri(&key);
        let needs_request = cached.is_none();

        self.update(epoch, |snap, _| {
            snap.state = LoadState::RequestingFull;
            snap.full_uri = cached;
            if bump_attempt {
                snap.attempt += 1;
            }
        });

        if needs_request {
            trace!(key = %key, "Requesting full thumbnail");
            let priority = self.config.priority.base_for(tier);
            self.source.request(&item, tier, priority);
        }
    }

    /// Initial request after the load delay.
    fn issue_initial(&self, epoch: u64) {
        let Some(item) = self.current_item(epoch) else {
            return;
        };
        let tiny_cached = self
            .source
            .cached_uri(&self.key(&item, SizeTier::Tiny))
            .is_some();
        if self.config.tiny_enabled && !tiny_cached {
            self.issue_tiny(epoch);
        } else {
            self.issue_full(epoch, false);
        }
    }

    /// Ask for the full tier now, or once fast scrolling stops.
    fn issue_full_when_settled(&self, epoch: u64) {
        if !self.activity.is_fast_scrolling() {
            self.issue_full(epoch, false);
            return;
        }
        let core = self.clone();
        self.fetch.set(ScheduledTask::spawn(async move {
            core.activity.wait_until_settled().await;
            core.issue_full(epoch, false);
        }));
    }

    /// Count a full-tier failure: schedule a backoff retry, or enter
    /// `Error` once `max_retry` retries are used.
    fn fail_full(&self, epoch: u64, error: DecodeError) {
        let max_retry = self.config.max_retry;
        let mut next_retry = None;
        let applied = self.update(epoch, |snap, _| {
            snap.full_uri = None;
            if snap.retry_count >= max_retry {
                snap.state = LoadState::Error;
            } else {
                snap.retry_count += 1;
                next_retry = Some(snap.retry_count);
            }
        });
        if !applied {
            return;
        }

        let Some(next) = next_retry else {
            warn!(
                item = ?self.current_item(epoch).map(|i| i.id),
                retries = max_retry,
                error = %error,
                "Thumbnail failed to load; giving up"
            );
            return;
        };

        let delay = self.config.retry_delay(next);
        debug!(retry = next, delay_ms = delay.as_millis() as u64, error = %error, "Scheduling thumbnail retry");
        let core = self.clone();
        self.retry.set(ScheduledTask::after(delay, async move {
            core.activity.wait_until_settled().await;
            core.issue_full(epoch, true);
        }));
    }

    fn on_event(&self, epoch: u64, event: &ThumbnailEvent) {
        match event {
            ThumbnailEvent::Ready(ready) => self.on_ready(epoch, ready),
            ThumbnailEvent::Failed { key, reason } => self.on_failed(epoch, key, reason),
        }
    }

    fn on_failed(&self, epoch: u64, key: &ThumbnailKey, reason: &str) {
        let (state, tiny_uri_missing, full_uri_missing) = {
            let inner = self.inner.lock();
            let same_item = inner.epoch == epoch
                && inner
                    .item
                    .as_ref()
                    .is_some_and(|item| item.content_hash == key.content_hash);
            if !same_item {
                return;
            }
            let snap = &inner.snapshot;
            (snap.state, snap.tiny_uri.is_none(), snap.full_uri.is_none())
        };

        if key.size_tier == SizeTier::Tiny
            && state == LoadState::RequestingTiny
            && tiny_uri_missing
        {
            debug!(key = %key, reason, "Tiny placeholder unavailable; skipping to full");
            self.issue_full_when_settled(epoch);
        } else if key.size_tier == self.config.full_tier
            && state == LoadState::RequestingFull
            && full_uri_missing
            && !self.retry.is_pending()
        {
            self.fail_full(epoch, DecodeError::Unavailable(reason.to_string()));
        }
    }

    fn on_ready(&self, epoch: u64, ready: &ThumbnailReady) {
        let full_tier = self.config.full_tier;
        self.update(epoch, |snap, item| {
            if ready.key.content_hash != item.content_hash {
                return;
            }
            if ready.key.size_tier == SizeTier::Tiny && snap.tiny_uri.is_none() {
                snap.tiny_uri = Some(ready.uri.clone());
            } else if ready.key.size_tier == full_tier && snap.state == LoadState::RequestingFull {
                snap.full_uri = Some(ready.uri.clone());
            }
        });
    }

    /// Re-read both tiers from the cache after missed notifications.
    fn refresh_from_cache(&self, epoch: u64) {
        let Some(item) = self.current_item(epoch) else {
            return;
        };
        let tiny = self.source.cached_uri(&self.key(&item, SizeTier::Tiny));
        let full = self.source.cached_uri(&self.key(&item, self.config.full_tier));
        self.update(epoch, |snap, _| {
            if snap.tiny_uri.is_none() {
                snap.tiny_uri = tiny;
            }
            if snap.state == LoadState::RequestingFull && snap.full_uri.is_none() {
                snap.full_uri = full;
            }
        });
    }
}

/// Drives one tile from placeholder to full thumbnail.
///
/// The host mounts an item, renders whatever [`TileSnapshot`] it observes,
/// and reports decode results back. Must be used from within a tokio
/// runtime.
pub struct TileLoader {
    core: TileCore,
    listener: Option<ScheduledTask>,
}

impl TileLoader {
    pub fn new(
        source: Arc<dyn ThumbnailSource>,
        config: LoaderConfig,
        activity: ScrollActivity,
    ) -> Self {
        let (tx, _) = watch::channel(TileSnapshot::default());
        Self {
            core: TileCore {
                source,
                config: Arc::new(config),
                activity,
                inner: Arc::new(Mutex::new(TileInner {
                    item: None,
                    epoch: 0,
                    snapshot: TileSnapshot::default(),
                })),
                tx: Arc::new(tx),
                fetch: TaskSlot::default(),
                retry: TaskSlot::default(),
            },
            listener: None,
        }
    }

    /// Observe snapshots.
    pub fn watch(&self) -> watch::Receiver<TileSnapshot> {
        self.core.tx.subscribe()
    }

    pub fn snapshot(&self) -> TileSnapshot {
        self.core.inner.lock().snapshot.clone()
    }

    pub fn state(&self) -> LoadState {
        self.core.inner.lock().snapshot.state
    }

    pub fn item(&self) -> Option<MediaItem> {
        self.core.inner.lock().item.clone()
    }

    fn epoch(&self) -> u64 {
        self.core.inner.lock().epoch
    }

    fn cancel_tasks(&mut self) {
        self.core.fetch.clear();
        self.core.retry.clear();
        self.listener = None;
    }

    /// Start a new mount epoch, resetting to `Idle`.
    fn reset(&mut self, item: Option<MediaItem>) -> u64 {
        self.cancel_tasks();
        let mut inner = self.core.inner.lock();
        inner.epoch += 1;
        inner.item = item;
        inner.snapshot = TileSnapshot::default();
        self.core.tx.send_replace(inner.snapshot.clone());
        inner.epoch
    }

    /// Mount `item`, or switch to it from the previous item.
    pub fn mount(&mut self, item: MediaItem) {
        let tiny_key = self.core.key(&item, SizeTier::Tiny);
        let full_key = self.core.key(&item, self.core.config.full_tier);
        let epoch = self.reset(Some(item));

        // Subscribe before any request so no ready notification is missed.
        let mut rx = self.core.source.subscribe();
        let core = self.core.clone();
        self.listener = Some(ScheduledTask::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => core.on_event(epoch, &event),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Tile listener lagged; re-reading cache");
                        core.refresh_from_cache(epoch);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));

        if let Some(full_uri) = self.core.source.cached_uri(&full_key) {
            let tiny_uri = self.core.source.cached_uri(&tiny_key);
            self.core.update(epoch, |snap, _| {
                snap.state = LoadState::RequestingFull;
                snap.full_uri = Some(full_uri);
                snap.tiny_uri = tiny_uri;
            });
            return;
        }

        if self.core.config.tiny_enabled {
            if let Some(tiny_uri) = self.core.source.cached_uri(&tiny_key) {
                self.core.update(epoch, |snap, _| {
                    snap.state = LoadState::RequestingFull;
                    snap.tiny_uri = Some(tiny_uri);
                });
            }
        }

        let core = self.core.clone();
        self.core.fetch.set(ScheduledTask::after(
            self.core.config.load_delay,
            async move {
                core.activity.wait_until_settled().await;
                core.issue_initial(epoch);
            },
        ));
    }

    /// Release the tile. Pending timers and the listener are cancelled.
    pub fn unmount(&mut self) {
        self.reset(None);
    }

    /// Host report for the tiny placeholder.
    pub fn report_tiny_decoded(&mut self, result: Result<(), DecodeError>) {
        if self.state() != LoadState::RequestingTiny {
            return;
        }
        let epoch = self.epoch();
        match result {
            Ok(()) => {
                self.core
                    .update(epoch, |snap, _| snap.state = LoadState::TinyShown);
            }
            Err(e) => {
                debug!(error = %e, "Tiny placeholder failed to decode; skipping to full");
                self.core.update(epoch, |snap, _| snap.tiny_uri = None);
            }
        }
        self.core.issue_full_when_settled(epoch);
    }

    /// Host report for the full tier.
    pub fn report_full_decoded(&mut self, result: Result<(), DecodeError>) {
        if self.state() != LoadState::RequestingFull || self.retry_pending() {
            return;
        }
        let epoch = self.epoch();

        match result {
            Ok(()) => {
                self.core.update(epoch, |snap, _| {
                    snap.state = LoadState::FullShown;
                    snap.retry_count = 0;
                });
            }
            Err(error) => self.core.fail_full(epoch, error),
        }
    }

    /// Leave `Error` and try again from the full tier.
    pub fn manual_retry(&mut self) {
        if self.state() != LoadState::Error {
            return;
        }
        let epoch = self.epoch();
        self.core.retry.clear();
        self.core.update(epoch, |snap, _| snap.retry_count = 0);
        self.core.issue_full(epoch, true);
    }

    /// Whether a retry is waiting to fire.
    pub fn retry_pending(&self) -> bool {
        self.core.retry.is_pending()
    }
}

impl Drop for TileLoader {
    fn drop(&mut self) {
        // Spawned work holds the task slots; abort it explicitly.
        self.cancel_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Priority;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::broadcast;

    /// Source with a settable cache that records every request.
    struct MockSource {
        cached: Mutex<HashMap<ThumbnailKey, String>>,
        requests: Mutex<Vec<(ThumbnailKey, Priority)>>,
        events_tx: broadcast::Sender<ThumbnailEvent>,
    }

    impl MockSource {
        fn new() -> Arc<Self> {
            let (events_tx, _) = broadcast::channel(64);
            Arc::new(Self {
                cached: Mutex::new(HashMap::new()),
                requests: Mutex::new(Vec::new()),
                events_tx,
            })
        }

        fn cache(&self, key: ThumbnailKey, uri: &str) {
            self.cached.lock().insert(key, uri.to_string());
        }

        /// Cache and broadcast, as the scheduler does on completion.
        fn complete(&self, key: ThumbnailKey, uri: &str) {
            self.cache(key.clone(), uri);
            let _ = self.events_tx.send(ThumbnailEvent::Ready(ThumbnailReady {
                key,
                uri: uri.to_string(),
            }));
        }

        /// Broadcast a generation failure.
        fn fail(&self, key: ThumbnailKey) {
            let _ = self.events_tx.send(ThumbnailEvent::Failed {
                key,
                reason: "unsupported format".into(),
            });
        }

        fn requested(&self) -> Vec<ThumbnailKey> {
            self.requests.lock().iter().map(|(k, _)| k.clone()).collect()
        }
    }

    impl ThumbnailSource for MockSource {
        fn cached_uri(&self, key: &ThumbnailKey) -> Option<String> {
            self.cached.lock().get(key).cloned()
        }

        fn request(&self, item: &MediaItem, tier: SizeTier, priority: Priority) {
            self.requests
                .lock()
                .push((ThumbnailKey::new(item.content_hash.clone(), tier), priority));
        }

        fn subscribe(&self) -> broadcast::Receiver<ThumbnailEvent> {
            self.events_tx.subscribe()
        }
    }

    fn photo() -> MediaItem {
        MediaItem::new("p1", "hash1", "/photos/p1.jpg")
    }

    fn tiny() -> ThumbnailKey {
        ThumbnailKey::new("hash1", SizeTier::Tiny)
    }

    fn full() -> ThumbnailKey {
        ThumbnailKey::new("hash1", SizeTier::Small)
    }

    fn loader(source: &Arc<MockSource>) -> (TileLoader, ScrollActivity) {
        let activity = ScrollActivity::new();
        let loader = TileLoader::new(source.clone(), LoaderConfig::default(), activity.clone());
        (loader, activity)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        settle().await;
    }

    fn decode_error() -> DecodeError {
        DecodeError::Corrupt("truncated".into())
    }

    /// Mount and drive a tile to `RequestingFull` with no cached tiers.
    async fn to_requesting_full(source: &Arc<MockSource>, loader: &mut TileLoader) {
        loader.mount(photo());
        advance(100).await;
        source.complete(tiny(), "tiny-uri");
        settle().await;
        loader.report_tiny_decoded(Ok(()));
        assert_eq!(loader.state(), LoadState::RequestingFull);
    }

    // =========================================================================
    // Happy path
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_progressive_tiny_then_full() {
        let source = MockSource::new();
        let (mut loader, _) = loader(&source);

        loader.mount(photo());
        assert_eq!(loader.state(), LoadState::Idle);
        assert!(source.requested().is_empty());

        advance(100).await;
        assert_eq!(loader.state(), LoadState::RequestingTiny);
        assert_eq!(source.requested(), vec![tiny()]);
        assert_eq!(source.requests.lock()[0].1.value(), 80);

        source.complete(tiny(), "tiny-uri");
        settle().await;
        assert_eq!(loader.snapshot().tiny_uri.as_deref(), Some("tiny-uri"));

        loader.report_tiny_decoded(Ok(()));
        assert_eq!(loader.state(), LoadState::RequestingFull);
        assert_eq!(source.requested(), vec![tiny(), full()]);

        source.complete(full(), "full-uri");
        settle().await;
        assert_eq!(loader.snapshot().full_uri.as_deref(), Some("full-uri"));

        loader.report_full_decoded(Ok(()));
        let snap = loader.snapshot();
        assert_eq!(snap.state, LoadState::FullShown);
        assert_eq!(snap.retry_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_tiny_starts_in_requesting_full() {
        let source = MockSource::new();
        source.cache(tiny(), "tiny-uri");
        let (mut loader, _) = loader(&source);

        loader.mount(photo());
        let snap = loader.snapshot();
        assert_eq!(snap.state, LoadState::RequestingFull);
        assert_eq!(snap.tiny_uri.as_deref(), Some("tiny-uri"));

        advance(100).await;
        assert_eq!(source.requested(), vec![full()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_full_needs_no_request() {
        let source = MockSource::new();
        source.cache(full(), "full-uri");
        let (mut loader, _) = loader(&source);

        loader.mount(photo());
        assert_eq!(loader.snapshot().full_uri.as_deref(), Some("full-uri"));

        advance(200).await;
        assert!(source.requested().is_empty());
        loader.report_full_decoded(Ok(()));
        assert_eq!(loader.state(), LoadState::FullShown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiny_disabled_goes_straight_to_full() {
        let source = MockSource::new();
        let mut loader = TileLoader::new(
            source.clone(),
            LoaderConfig::default().with_tiny_enabled(false),
            ScrollActivity::new(),
        );

        loader.mount(photo());
        advance(100).await;
        assert_eq!(loader.state(), LoadState::RequestingFull);
        assert_eq!(source.requested(), vec![full()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_receives_updates() {
        let source = MockSource::new();
        let (mut loader, _) = loader(&source);
        let mut rx = loader.watch();

        loader.mount(photo());
        advance(100).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().state, LoadState::RequestingTiny);
    }

    // =========================================================================
    // Load delay and fast scroll
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_transient_tile_never_requests() {
        let source = MockSource::new();
        let (mut loader, _) = loader(&source);

        loader.mount(photo());
        advance(50).await;
        loader.unmount();
        advance(500).await;

        assert!(source.requested().is_empty());
        assert_eq!(loader.state(), LoadState::Idle);
        assert!(loader.item().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_scroll_defers_requests() {
        let source = MockSource::new();
        let (mut loader, activity) = loader(&source);
        activity.set_fast_scrolling(true);

        loader.mount(photo());
        advance(500).await;
        assert!(source.requested().is_empty());

        activity.set_fast_scrolling(false);
        settle().await;
        assert_eq!(source.requested(), vec![tiny()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remount_discards_previous_item() {
        let source = MockSource::new();
        let (mut loader, _) = loader(&source);

        loader.mount(photo());
        advance(100).await;
        loader.mount(MediaItem::new("p2", "hash2", "/photos/p2.jpg"));
        assert_eq!(loader.state(), LoadState::Idle);

        source.complete(tiny(), "stale-tiny");
        settle().await;
        assert_eq!(loader.snapshot().tiny_uri, None);
    }

    // =========================================================================
    // Retry
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_retry_backoff_is_linear() {
        let source = MockSource::new();
        let (mut loader, _) = loader(&source);
        to_requesting_full(&source, &mut loader).await;
        let full_requests = || source.requested().iter().filter(|k| **k == full()).count();
        assert_eq!(full_requests(), 1);

        loader.report_full_decoded(Err(decode_error()));
        assert_eq!(loader.snapshot().retry_count, 1);
        advance(390).await;
        assert_eq!(full_requests(), 1);
        advance(20).await;
        assert_eq!(full_requests(), 2);
        assert_eq!(loader.snapshot().attempt, 1);

        loader.report_full_decoded(Err(decode_error()));
        advance(790).await;
        assert_eq!(full_requests(), 2);
        advance(20).await;
        assert_eq!(full_requests(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_enter_error() {
        let source = MockSource::new();
        let (mut loader, _) = loader(&source);
        to_requesting_full(&source, &mut loader).await;

        for _ in 0..3 {
            loader.report_full_decoded(Err(decode_error()));
            assert_eq!(loader.state(), LoadState::RequestingFull);
            advance(2_000).await;
        }
        loader.report_full_decoded(Err(decode_error()));
        assert_eq!(loader.state(), LoadState::Error);

        let before = source.requested().len();
        advance(10_000).await;
        assert_eq!(source.requested().len(), before);
        assert!(!loader.retry_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_retry_from_error() {
        let source = MockSource::new();
        let (mut loader, _) = loader(&source);
        to_requesting_full(&source, &mut loader).await;

        for _ in 0..4 {
            loader.report_full_decoded(Err(decode_error()));
            advance(2_000).await;
        }
        assert_eq!(loader.state(), LoadState::Error);

        loader.manual_retry();
        let snap = loader.snapshot();
        assert_eq!(snap.state, LoadState::RequestingFull);
        assert_eq!(snap.retry_count, 0);

        source.complete(full(), "full-uri");
        settle().await;
        loader.report_full_decoded(Ok(()));
        assert_eq!(loader.state(), LoadState::FullShown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_failure_during_backoff_is_ignored() {
        let source = MockSource::new();
        let (mut loader, _) = loader(&source);
        to_requesting_full(&source, &mut loader).await;

        loader.report_full_decoded(Err(decode_error()));
        loader.report_full_decoded(Err(decode_error()));
        assert_eq!(loader.snapshot().retry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiny_decode_failure_falls_through_to_full() {
        let source = MockSource::new();
        let (mut loader, _) = loader(&source);
        loader.mount(photo());
        advance(100).await;

        loader.report_tiny_decoded(Err(decode_error()));
        assert_eq!(loader.state(), LoadState::RequestingFull);
        assert_eq!(loader.snapshot().tiny_uri, None);
    }

    // =========================================================================
    // Generation failures
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_tiny_generation_failure_requests_full() {
        let source = MockSource::new();
        let (mut loader, _) = loader(&source);
        loader.mount(photo());
        advance(100).await;
        assert_eq!(loader.state(), LoadState::RequestingTiny);

        source.fail(tiny());
        settle().await;

        assert_eq!(loader.state(), LoadState::RequestingFull);
        assert_eq!(source.requested(), vec![tiny(), full()]);

        source.complete(full(), "full-uri");
        settle().await;
        loader.report_full_decoded(Ok(()));
        assert_eq!(loader.state(), LoadState::FullShown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiny_generation_failure_waits_for_scroll_to_settle() {
        let source = MockSource::new();
        let (mut loader, activity) = loader(&source);
        loader.mount(photo());
        advance(100).await;

        activity.set_fast_scrolling(true);
        source.fail(tiny());
        settle().await;
        assert_eq!(source.requested(), vec![tiny()]);

        activity.set_fast_scrolling(false);
        settle().await;
        assert_eq!(source.requested(), vec![tiny(), full()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_generation_failure_retries_then_errors() {
        let source = MockSource::new();
        let (mut loader, _) = loader(&source);
        to_requesting_full(&source, &mut loader).await;
        let full_requests = || source.requested().iter().filter(|k| **k == full()).count();

        for retry in 1..=3 {
            source.fail(full());
            settle().await;
            assert_eq!(loader.state(), LoadState::RequestingFull);
            assert_eq!(loader.snapshot().retry_count, retry);
            advance(2_000).await;
            assert_eq!(full_requests(), 1 + retry as usize);
        }

        source.fail(full());
        settle().await;
        let snap = loader.snapshot();
        assert_eq!(snap.state, LoadState::Error);
        assert_eq!(snap.full_uri, None);

        advance(10_000).await;
        assert_eq!(full_requests(), 4);

        loader.manual_retry();
        assert_eq!(loader.state(), LoadState::RequestingFull);
        assert_eq!(full_requests(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_for_other_item_is_ignored() {
        let source = MockSource::new();
        let (mut loader, _) = loader(&source);
        to_requesting_full(&source, &mut loader).await;

        source.fail(ThumbnailKey::new("hash2", SizeTier::Small));
        settle().await;
        let snap = loader.snapshot();
        assert_eq!(snap.retry_count, 0);
        assert!(!loader.retry_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_during_backoff_is_not_counted_twice() {
        let source = MockSource::new();
        let (mut loader, _) = loader(&source);
        to_requesting_full(&source, &mut loader).await;

        source.fail(full());
        settle().await;
        source.fail(full());
        settle().await;
        assert_eq!(loader.snapshot().retry_count, 1);
        assert!(loader.retry_pending());
    }
}
