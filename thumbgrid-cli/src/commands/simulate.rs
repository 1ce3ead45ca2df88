//! `thumbgrid simulate`: replay a scripted scroll over a synthetic library.
//!
//! The generation service is simulated by a worker pool draining a priority
//! queue (higher priority first, FIFO within a level). Each job sleeps for
//! the configured latency, lands in an in-memory disk cache and is reported
//! back through the scheduler's event pump.
//!
//! ```text
//! ThumbnailGrid ──► RequestScheduler ──enqueue──► BinaryHeap ──► workers (1..=8)
//!                        ▲                                          │
//!                        └──────────── GenerationEvent ◄────────────┘
//! ```

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use clap::Args;
use parking_lot::Mutex;
use serde_json::json;
use thumbgrid::config::ConfigFile;
use thumbgrid::grid::ThumbnailGrid;
use thumbgrid::scheduler::RequestScheduler;
use thumbgrid::thumbnail::{
    BoxFuture, DiskCacheProbe, EnqueueAck, GenerationError, GenerationEvent, GenerationTask,
    ProbeError, ProbeResult, ThumbnailCache, ThumbnailGenerationService, ThumbnailKey,
};
use thumbgrid::MediaItem;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::common::TierArg;
use crate::error::CliError;

pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 8;
pub const DEFAULT_WORKERS: usize = 4;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
const DRAIN_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Number of synthetic library items
    #[arg(long, default_value_t = 2000)]
    items: usize,

    /// Generation workers (clamped to 1..=8)
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Simulated generation time per thumbnail
    #[arg(long, default_value_t = 25)]
    latency_ms: u64,

    /// Scroll steps to replay
    #[arg(long, default_value_t = 40)]
    steps: usize,

    /// Rows scrolled per step
    #[arg(long, default_value_t = 4)]
    step_rows: usize,

    /// Rows rendered by the host at once
    #[arg(long, default_value_t = 6)]
    visible_rows: usize,

    /// Time between scroll steps
    #[arg(long, default_value_t = 60)]
    interval_ms: u64,

    /// Available width in pixels
    #[arg(long, default_value_t = 1200.0)]
    width: f32,

    /// Share of items already present in the disk cache
    #[arg(long, default_value_t = 0)]
    cached_percent: u8,

    /// Fail every Nth generation job (0 disables)
    #[arg(long, default_value_t = 0)]
    fail_every: u64,

    /// Display tier (overrides config)
    #[arg(long, value_enum)]
    tier: Option<TierArg>,
}

pub async fn run(args: SimulateArgs, config: &ConfigFile) -> Result<(), CliError> {
    let report = simulate(args, config).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn simulate(args: SimulateArgs, config: &ConfigFile) -> Result<serde_json::Value, CliError> {
    if args.visible_rows == 0 {
        return Err(CliError::Config("--visible-rows must be at least 1".to_string()));
    }
    let workers = args.workers.clamp(MIN_WORKERS, MAX_WORKERS);
    if workers != args.workers {
        warn!(requested = args.workers, workers, "Worker count clamped");
    }

    let mut options = config.layout.clone().embedded(false);
    if let Some(tier) = args.tier {
        options.size_tier = tier.into();
    }

    let items = synthetic_library(args.items);
    let disk = Arc::new(SimulatedDisk::default());
    let cached_percent = usize::from(args.cached_percent.min(100));
    for (i, item) in items.iter().enumerate() {
        if i % 100 < cached_percent {
            for tier in options.tiers() {
                disk.store(ThumbnailKey::new(item.content_hash.clone(), tier));
            }
        }
    }

    let generator = Arc::new(SimulatedGenerator::default());
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let shutdown = CancellationToken::new();
    let latency = Duration::from_millis(args.latency_ms);
    let handles: Vec<_> = (0..workers)
        .map(|id| {
            tokio::spawn(run_worker(
                id,
                generator.clone(),
                disk.clone(),
                events_tx.clone(),
                latency,
                args.fail_every,
                shutdown.clone(),
            ))
        })
        .collect();
    drop(events_tx);

    let scheduler = RequestScheduler::new(
        config.scheduler.clone(),
        Arc::new(ThumbnailCache::new(config.cache.clone())),
        disk.clone(),
        generator.clone(),
        config.resolver(),
    );
    let pump = scheduler.spawn_event_pump(events_rx, shutdown.clone());

    let mut grid = ThumbnailGrid::new(options, scheduler.clone());
    grid.set_items(items, args.width);
    let row_count = grid.rows().len();
    info!(
        items = args.items,
        rows = row_count,
        columns = grid.columns(),
        workers,
        "Starting scroll simulation"
    );

    let started = Instant::now();
    let interval = Duration::from_millis(args.interval_ms);
    for step in 0..args.steps {
        let start = (step * args.step_rows).min(row_count.saturating_sub(1));
        let end = start + args.visible_rows - 1;
        if let Some(window) = grid.on_range_change(start, end) {
            debug!(step, start = window.start_index, end = window.end_index, "Scrolled");
        }
        tokio::time::sleep(interval).await;
    }

    scheduler.force_flush().await;
    let drained = wait_for_drain(&scheduler, DRAIN_TIMEOUT).await;
    if !drained {
        warn!(
            in_flight = scheduler.in_flight_count(),
            "Generation did not drain before timeout"
        );
    }
    let elapsed = started.elapsed();

    shutdown.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    let _ = pump.await;

    Ok(json!({
        "items": args.items,
        "rows": row_count,
        "columns": grid.columns(),
        "workers": workers,
        "elapsed_ms": elapsed.as_millis() as u64,
        "drained": drained,
        "queue_peak": generator.peak_depth(),
        "scheduler": scheduler.metrics(),
        "hit_ratio": scheduler.metrics().hit_ratio(),
        "cache": scheduler.cache().stats(),
    }))
}

async fn wait_for_drain(scheduler: &RequestScheduler, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if scheduler.pending_count() == 0 && scheduler.in_flight_count() == 0 {
            return true;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
    false
}

/// Items with a repeating mix of wide, tall and normal photos, forty per day.
fn synthetic_library(count: usize) -> Vec<MediaItem> {
    let first_day = NaiveDate::from_ymd_opt(2024, 1, 1);
    (0..count)
        .map(|i| {
            let (width, height) = match i % 9 {
                0 => (3000, 1500),
                4 => (1000, 2000),
                _ => (1600, 1200),
            };
            let hash = (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            let item = MediaItem::new(
                format!("item-{}", i),
                format!("{:016x}", hash),
                format!("/library/IMG_{:05}.jpg", i),
            )
            .with_dimensions(width, height);
            match first_day.and_then(|d| d.checked_add_days(Days::new((i / 40) as u64))) {
                Some(date) => item.with_taken_at(date),
                None => item,
            }
        })
        .collect()
}

// =============================================================================
// Simulated disk cache
// =============================================================================

#[derive(Default)]
struct SimulatedDisk {
    stored: Mutex<HashSet<ThumbnailKey>>,
}

impl SimulatedDisk {
    fn path_for(key: &ThumbnailKey) -> PathBuf {
        PathBuf::from("simulated")
            .join(key.size_tier.name())
            .join(format!("{}.webp", key.content_hash))
    }

    fn store(&self, key: ThumbnailKey) {
        self.stored.lock().insert(key);
    }
}

impl DiskCacheProbe for SimulatedDisk {
    fn batch_check<'a>(
        &'a self,
        keys: &'a [ThumbnailKey],
    ) -> BoxFuture<'a, Result<HashMap<ThumbnailKey, ProbeResult>, ProbeError>> {
        Box::pin(async move {
            let stored = self.stored.lock();
            Ok(keys
                .iter()
                .map(|key| {
                    let result = if stored.contains(key) {
                        ProbeResult::hit(Self::path_for(key))
                    } else {
                        ProbeResult::miss()
                    };
                    (key.clone(), result)
                })
                .collect())
        })
    }
}

// =============================================================================
// Simulated generation service
// =============================================================================

struct QueuedJob {
    task: GenerationTask,
    sequence: u64,
}

// Higher priority first, then lower sequence (older) first.
impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.task.priority == other.task.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.task.priority.cmp(&other.task.priority) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ordering => ordering,
        }
    }
}

#[derive(Default)]
struct SimulatedGenerator {
    queue: Mutex<BinaryHeap<QueuedJob>>,
    sequence: AtomicU64,
    peak_depth: AtomicUsize,
    notify: Notify,
}

impl SimulatedGenerator {
    fn pop(&self) -> Option<QueuedJob> {
        self.queue.lock().pop()
    }

    fn peak_depth(&self) -> usize {
        self.peak_depth.load(AtomicOrdering::Relaxed)
    }
}

impl ThumbnailGenerationService for SimulatedGenerator {
    fn enqueue(
        &self,
        tasks: Vec<GenerationTask>,
    ) -> BoxFuture<'_, Result<EnqueueAck, GenerationError>> {
        Box::pin(async move {
            let accepted = tasks.len();
            let depth = {
                let mut queue = self.queue.lock();
                for task in tasks {
                    let sequence = self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
                    queue.push(QueuedJob { task, sequence });
                }
                queue.len()
            };
            self.peak_depth.fetch_max(depth, AtomicOrdering::Relaxed);
            for _ in 0..accepted {
                self.notify.notify_one();
            }
            Ok(EnqueueAck { accepted })
        })
    }
}

async fn run_worker(
    id: usize,
    generator: Arc<SimulatedGenerator>,
    disk: Arc<SimulatedDisk>,
    events: mpsc::Sender<GenerationEvent>,
    latency: Duration,
    fail_every: u64,
    shutdown: CancellationToken,
) {
    debug!(worker = id, "Simulated worker started");
    loop {
        let job = match generator.pop() {
            Some(job) => job,
            None => {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = generator.notify.notified() => continue,
                }
            }
        };

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(latency) => {}
        }

        let key = job.task.key();
        let event = if fail_every > 0 && (job.sequence + 1) % fail_every == 0 {
            GenerationEvent::Failed {
                key,
                reason: "simulated failure".to_string(),
            }
        } else {
            disk.store(key.clone());
            GenerationEvent::Ready {
                path: SimulatedDisk::path_for(&key),
                key,
            }
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
    debug!(worker = id, "Simulated worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use thumbgrid::thumbnail::SizeTier;

    fn job(priority: i32, sequence: u64) -> QueuedJob {
        QueuedJob {
            task: GenerationTask {
                source_path: PathBuf::from("/x.jpg"),
                content_hash: format!("h{}", sequence),
                size_tier: SizeTier::Small,
                priority,
                width: None,
                height: None,
            },
            sequence,
        }
    }

    fn args(items: usize) -> SimulateArgs {
        SimulateArgs {
            items,
            workers: 16,
            latency_ms: 1,
            steps: 5,
            step_rows: 3,
            visible_rows: 4,
            interval_ms: 5,
            width: 1000.0,
            cached_percent: 0,
            fail_every: 0,
            tier: None,
        }
    }

    #[test]
    fn test_queue_orders_by_priority_then_fifo() {
        let mut heap = BinaryHeap::new();
        heap.push(job(50, 0));
        heap.push(job(80, 1));
        heap.push(job(50, 2));
        heap.push(job(80, 3));

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|j| j.sequence)).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_synthetic_library_mixes_aspects() {
        let items = synthetic_library(90);
        assert_eq!(items.len(), 90);
        assert_eq!(items[0].width, Some(3000));
        assert_eq!(items[4].height, Some(2000));
        assert_ne!(items[0].taken_at, items[40].taken_at);
        let hashes: HashSet<_> = items.iter().map(|i| i.content_hash.clone()).collect();
        assert_eq!(hashes.len(), 90);
    }

    #[tokio::test]
    async fn test_simulation_drains_and_completes_dispatched() {
        let report = simulate(args(200), &ConfigFile::default()).await.unwrap();

        assert_eq!(report["workers"], MAX_WORKERS);
        assert_eq!(report["drained"], true);
        let dispatched = report["scheduler"]["dispatched"].as_u64().unwrap();
        assert!(dispatched > 0);
        assert_eq!(report["scheduler"]["completed"].as_u64().unwrap(), dispatched);
    }

    #[tokio::test]
    async fn test_fully_cached_library_generates_nothing() {
        let mut a = args(100);
        a.cached_percent = 100;
        let report = simulate(a, &ConfigFile::default()).await.unwrap();

        assert_eq!(report["scheduler"]["dispatched"], 0);
        assert!(report["scheduler"]["probe_hits"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_zero_visible_rows_is_rejected() {
        let mut a = args(10);
        a.visible_rows = 0;
        assert!(matches!(
            simulate(a, &ConfigFile::default()).await,
            Err(CliError::Config(_))
        ));
    }
}
