//! The request scheduler.
//!
//! Turns demand signals into deduplicated, priority-ordered batches for the
//! generation service, consulting the memory cache and the disk-cache probe
//! first.
//!
//! # Flush pipeline
//!
//! ```text
//! pending (by key) ──drain──► drop cached / in-flight
//!                                   │
//!                                   ▼
//!                             check_batch ──hits──► cache + ThumbnailEvent::Ready
//!                                   │
//!                                 misses
//!                                   ▼
//!                               enqueue ──► claim in-flight ──► generation service
//! ```
//!
//! # Locking
//!
//! `pending` is a `parking_lot::Mutex` and `in_flight` a `DashMap`; neither
//! is held across an `.await`. In-flight claims go through the `DashMap`
//! entry API so two concurrent flushes never dispatch the same key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::config::SchedulerConfig;
use super::demand::{DemandSink, RangeDemand, ThumbnailSource};
use super::metrics::{SchedulerMetrics, SchedulerSnapshot};
use super::priority::Priority;
use super::task::{dedup_tasks, DemandOrigin, RequestTask};
use crate::media::MediaItem;
use crate::thumbnail::{
    DiskCacheProbe, EntryState, GenerationEvent, MediaAssetResolver, ProbeResult, SizeTier,
    ThumbnailCache, ThumbnailEvent, ThumbnailGenerationService, ThumbnailKey, ThumbnailReady,
};
use crate::timer::Debouncer;

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Keys sent to the disk-cache probe.
    pub probed: usize,
    /// Keys promoted from the probe without generation.
    pub promoted: usize,
    /// Keys dispatched to the generation service.
    pub dispatched: usize,
}

/// Demand-driven thumbnail request scheduler.
///
/// Always held in an `Arc`; debounced and immediate flushes run on spawned
/// tasks holding a weak reference back to the scheduler.
pub struct RequestScheduler {
    this: Weak<RequestScheduler>,
    config: SchedulerConfig,
    cache: Arc<ThumbnailCache>,
    probe: Arc<dyn DiskCacheProbe>,
    generator: Arc<dyn ThumbnailGenerationService>,
    resolver: Arc<dyn MediaAssetResolver>,
    pending: Mutex<HashMap<ThumbnailKey, RequestTask>>,
    in_flight: DashMap<ThumbnailKey, Instant>,
    debouncer: Debouncer,
    flush_queued: AtomicBool,
    events_tx: broadcast::Sender<ThumbnailEvent>,
    metrics: SchedulerMetrics,
}

impl RequestScheduler {
    pub fn new(
        config: SchedulerConfig,
        cache: Arc<ThumbnailCache>,
        probe: Arc<dyn DiskCacheProbe>,
        generator: Arc<dyn ThumbnailGenerationService>,
        resolver: Arc<dyn MediaAssetResolver>,
    ) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(config.ready_channel_capacity.max(1));
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            debouncer: Debouncer::new(config.debounce),
            config,
            cache,
            probe,
            generator,
            resolver,
            pending: Mutex::new(HashMap::new()),
            in_flight: DashMap::new(),
            flush_queued: AtomicBool::new(false),
            events_tx,
            metrics: SchedulerMetrics::new(),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ThumbnailCache> {
        &self.cache
    }

    // =========================================================================
    // Demand
    // =========================================================================

    /// Record demand for `items` at `tier`. Idempotent: repeating a demand
    /// only raises the priority of the pending request. `visible = false`
    /// withdraws demand that has not been dispatched yet.
    ///
    /// Dispatch is debounced; call [`force_flush`](Self::force_flush) to
    /// dispatch now.
    pub fn demand(&self, items: &[MediaItem], tier: SizeTier, priority: Priority, visible: bool) {
        self.record(items, &[tier], |_| priority, visible, DemandOrigin::Tile);
        if visible {
            self.schedule_flush();
        }
    }

    fn record(
        &self,
        items: &[MediaItem],
        tiers: &[SizeTier],
        priority_for: impl Fn(SizeTier) -> Priority,
        visible: bool,
        origin: DemandOrigin,
    ) -> usize {
        let mut pending = self.pending.lock();

        if !visible {
            let mut withdrawn = 0;
            for item in items {
                for &tier in tiers {
                    let key = ThumbnailKey::new(item.content_hash.clone(), tier);
                    if pending.remove(&key).is_some() {
                        withdrawn += 1;
                    }
                }
            }
            self.metrics.withdrawn(withdrawn);
            trace!(withdrawn, "Demand withdrawn");
            return 0;
        }

        let mut recorded = 0;
        for item in items {
            for &tier in tiers {
                let task = RequestTask::new(item, tier, priority_for(tier), origin);
                self.metrics.demanded(1);
                if self.cache.is_cached(&task.key) {
                    self.metrics.memory_hit();
                    continue;
                }
                recorded += 1;
                match pending.get_mut(&task.key) {
                    Some(existing) => existing.merge(task),
                    None => {
                        pending.insert(task.key.clone(), task);
                    }
                }
            }
        }
        recorded
    }

    /// Whether `key` has a ready URI in memory.
    pub fn is_cached(&self, key: &ThumbnailKey) -> bool {
        self.cache.is_cached(key)
    }

    /// Number of demanded keys not yet flushed.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of keys with an outstanding generation request.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether `key` has an outstanding, unexpired generation request.
    pub fn is_in_flight(&self, key: &ThumbnailKey) -> bool {
        self.in_flight
            .get(key)
            .map(|since| since.elapsed() < self.config.in_flight_timeout)
            .unwrap_or(false)
    }

    // =========================================================================
    // Flush
    // =========================================================================

    /// Dispatch pending demand after the debounce delay, restarting it.
    pub fn schedule_flush(&self) {
        if Handle::try_current().is_err() {
            warn!("No tokio runtime; pending thumbnail demand left unflushed");
            return;
        }
        let weak = self.this.clone();
        self.debouncer.schedule(async move {
            if let Some(scheduler) = weak.upgrade() {
                scheduler.flush().await;
            }
        });
    }

    /// Dispatch pending demand on a spawned task without waiting for the
    /// debounce. Calls made before that task starts share one flush.
    pub fn flush_soon(&self) {
        if self.flush_queued.swap(true, Ordering::AcqRel) {
            return;
        }
        if Handle::try_current().is_err() {
            self.flush_queued.store(false, Ordering::Release);
            warn!("No tokio runtime; pending thumbnail demand left unflushed");
            return;
        }
        self.debouncer.cancel();
        let weak = self.this.clone();
        tokio::spawn(async move {
            if let Some(scheduler) = weak.upgrade() {
                scheduler.flush_queued.store(false, Ordering::Release);
                scheduler.flush().await;
            }
        });
    }

    /// Cancel any pending debounce and dispatch now.
    pub async fn force_flush(&self) -> FlushReport {
        self.debouncer.cancel();
        self.flush().await
    }

    /// Drain pending demand: probe, promote hits, enqueue misses.
    pub async fn flush(&self) -> FlushReport {
        let drained: Vec<RequestTask> = {
            let mut pending = self.pending.lock();
            pending.drain().map(|(_, task)| task).collect()
        };
        if drained.is_empty() {
            return FlushReport::default();
        }
        self.metrics.flushed();

        let mut candidates = Vec::with_capacity(drained.len());
        let mut skipped = 0;
        for task in drained {
            if self.cache.is_cached(&task.key) || self.is_in_flight(&task.key) {
                skipped += 1;
                continue;
            }
            candidates.push(task);
        }
        self.metrics.deduplicated(skipped);

        if candidates.is_empty() {
            return FlushReport::default();
        }

        let keys: Vec<ThumbnailKey> = candidates.iter().map(|t| t.key.clone()).collect();
        let results = self.check_batch(&keys).await;
        let promoted = results.values().filter(|r| is_promotable(r)).count();

        let misses: Vec<RequestTask> = candidates
            .into_iter()
            .filter(|t| !results.get(&t.key).map(is_promotable).unwrap_or(false))
            .collect();

        let dispatched = self.enqueue(misses).await;

        debug!(
            probed = keys.len(),
            promoted,
            dispatched,
            skipped,
            "Flushed thumbnail demand"
        );

        FlushReport {
            probed: keys.len(),
            promoted,
            dispatched,
        }
    }

    /// Probe `keys` on disk, promoting hits into the memory cache.
    ///
    /// Probe failures are logged and yield an empty map, so every key is
    /// treated as a miss.
    pub async fn check_batch(&self, keys: &[ThumbnailKey]) -> HashMap<ThumbnailKey, ProbeResult> {
        if keys.is_empty() {
            return HashMap::new();
        }

        let results = match self.probe.batch_check(keys).await {
            Ok(results) => results,
            Err(e) => {
                self.metrics.probe_failed();
                warn!(keys = keys.len(), error = %e, "Disk cache probe failed");
                return HashMap::new();
            }
        };

        let mut hits = 0;
        for (key, result) in &results {
            if let (true, Some(path)) = (result.cached, &result.path) {
                let uri = self.resolver.resolve(path);
                self.cache
                    .add_to_cache_external(key.clone(), uri.clone(), Some(path.clone()));
                self.publish(key.clone(), uri);
                hits += 1;
            }
        }
        self.metrics.probe_hits(hits);
        results
    }

    /// Deduplicate `tasks` and dispatch those without an outstanding
    /// request, highest priority first. Returns the number dispatched.
    ///
    /// Enqueue failures are logged and release the in-flight claims so the
    /// keys can be demanded again.
    pub async fn enqueue(&self, tasks: Vec<RequestTask>) -> usize {
        let submitted = tasks.len();
        let unique = dedup_tasks(tasks);
        let mut duplicates = submitted - unique.len();

        let now = Instant::now();
        let mut claimed = Vec::with_capacity(unique.len());
        for task in unique {
            if self.cache.is_cached(&task.key) {
                duplicates += 1;
                continue;
            }
            match self.in_flight.entry(task.key.clone()) {
                Entry::Occupied(mut slot) => {
                    if now.duration_since(*slot.get()) < self.config.in_flight_timeout {
                        duplicates += 1;
                        continue;
                    }
                    self.metrics.abandoned(1);
                    debug!(key = %task.key, "Re-dispatching abandoned request");
                    slot.insert(now);
                }
                Entry::Vacant(slot) => {
                    slot.insert(now);
                }
            }
            self.cache.mark_pending(&task.key);
            claimed.push(task);
        }
        self.metrics.deduplicated(duplicates);

        if claimed.is_empty() {
            return 0;
        }

        let batch = claimed.iter().map(RequestTask::to_generation_task).collect();
        match self.generator.enqueue(batch).await {
            Ok(ack) => {
                self.metrics.dispatched(claimed.len());
                debug!(
                    dispatched = claimed.len(),
                    accepted = ack.accepted,
                    "Enqueued thumbnail generation"
                );
                claimed.len()
            }
            Err(e) => {
                self.metrics.enqueue_failed();
                warn!(tasks = claimed.len(), error = %e, "Thumbnail enqueue failed");
                for task in &claimed {
                    self.in_flight.remove(&task.key);
                    if self.cache.state(&task.key) == Some(EntryState::Pending) {
                        self.cache.invalidate(&task.key);
                    }
                }
                0
            }
        }
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Apply a completion report from the generation service.
    pub fn handle_event(&self, event: GenerationEvent) {
        match event {
            GenerationEvent::Ready { key, path } => {
                self.in_flight.remove(&key);
                let uri = self.resolver.resolve(&path);
                self.cache
                    .add_to_cache_external(key.clone(), uri.clone(), Some(path));
                self.metrics.generation_completed();
                self.publish(key, uri);
            }
            GenerationEvent::Failed { key, reason } => {
                self.in_flight.remove(&key);
                self.cache.mark_error(&key);
                self.metrics.generation_failed();
                warn!(key = %key, reason = %reason, "Thumbnail generation failed");
                // Tiles waiting on this key fall back or retry.
                let _ = self.events_tx.send(ThumbnailEvent::Failed { key, reason });
            }
        }
    }

    /// Forward completion reports from `events` until it closes or
    /// `shutdown` is cancelled.
    pub fn spawn_event_pump(
        self: &Arc<Self>,
        mut events: mpsc::Receiver<GenerationEvent>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            info!("Thumbnail event pump started");
            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {
                        info!("Thumbnail event pump shutting down");
                        break;
                    }

                    event = events.recv() => match event {
                        Some(event) => scheduler.handle_event(event),
                        None => {
                            info!("Generation event channel closed");
                            break;
                        }
                    },
                }
            }
        })
    }

    /// Receive a notification whenever a thumbnail becomes ready or its
    /// generation fails.
    pub fn subscribe(&self) -> broadcast::Receiver<ThumbnailEvent> {
        self.events_tx.subscribe()
    }

    fn publish(&self, key: ThumbnailKey, uri: String) {
        trace!(key = %key, "Thumbnail ready");
        // No receivers is not an error: nobody is waiting for this key.
        let _ = self
            .events_tx
            .send(ThumbnailEvent::Ready(ThumbnailReady { key, uri }));
    }

    pub fn metrics(&self) -> SchedulerSnapshot {
        self.metrics.snapshot()
    }
}

fn is_promotable(result: &ProbeResult) -> bool {
    result.cached && result.path.is_some()
}

impl DemandSink for RequestScheduler {
    fn demand_range(&self, demand: RangeDemand, tiers: &[SizeTier]) {
        {
            let mut pending = self.pending.lock();
            pending.retain(|_, task| task.origin != DemandOrigin::Range);
        }
        let policy = self.config.priority;
        let center = demand.center;
        for (index, item) in &demand.items {
            self.record(
                std::slice::from_ref(item),
                tiers,
                |tier| policy.for_index(*index, center, tier),
                true,
                DemandOrigin::Range,
            );
        }
        self.schedule_flush();
    }

    fn demand_visible(&self, items: &[MediaItem], tiers: &[SizeTier], visible: bool) {
        let policy = self.config.priority;
        let recorded = self.record(
            items,
            tiers,
            |tier| policy.base_for(tier),
            visible,
            DemandOrigin::Visible,
        );
        if visible && recorded > 0 {
            self.flush_soon();
        }
    }
}

impl ThumbnailSource for RequestScheduler {
    fn cached_uri(&self, key: &ThumbnailKey) -> Option<String> {
        self.cache.uri(key)
    }

    fn request(&self, item: &MediaItem, tier: SizeTier, priority: Priority) {
        let recorded = self.record(
            std::slice::from_ref(item),
            &[tier],
            |_| priority,
            true,
            DemandOrigin::Tile,
        );
        if recorded > 0 {
            self.flush_soon();
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ThumbnailEvent> {
        RequestScheduler::subscribe(self)
    }
}
