//! Test doubles for the scheduler's collaborators.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{RequestScheduler, SchedulerConfig};
use crate::thumbnail::{
    BoxFuture, DiskCacheProbe, EnqueueAck, GenerationError, GenerationTask, PassthroughResolver,
    ProbeError, ProbeResult, ThumbnailCache, ThumbnailGenerationService, ThumbnailKey,
};

/// Probe answering from a fixed hit table.
#[derive(Default)]
pub struct MockProbe {
    hits: Mutex<HashMap<ThumbnailKey, PathBuf>>,
    fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl MockProbe {
    pub fn with_hit(self, key: ThumbnailKey, path: impl Into<PathBuf>) -> Self {
        self.hits.lock().insert(key, path.into());
        self
    }

    pub fn failing() -> Self {
        let probe = Self::default();
        probe.fail.store(true, Ordering::SeqCst);
        probe
    }
}

impl DiskCacheProbe for MockProbe {
    fn batch_check<'a>(
        &'a self,
        keys: &'a [ThumbnailKey],
    ) -> BoxFuture<'a, Result<HashMap<ThumbnailKey, ProbeResult>, ProbeError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProbeError::Unavailable("mock".into()));
            }
            let hits = self.hits.lock();
            Ok(keys
                .iter()
                .map(|k| {
                    let result = match hits.get(k) {
                        Some(path) => ProbeResult::hit(path.clone()),
                        None => ProbeResult::miss(),
                    };
                    (k.clone(), result)
                })
                .collect())
        })
    }
}

/// Generator recording every batch it receives.
#[derive(Default)]
pub struct RecordingGenerator {
    pub batches: Mutex<Vec<Vec<GenerationTask>>>,
    fail: AtomicBool,
}

impl RecordingGenerator {
    pub fn failing() -> Self {
        let generator = Self::default();
        generator.fail.store(true, Ordering::SeqCst);
        generator
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn task_count(&self) -> usize {
        self.batches.lock().iter().map(Vec::len).sum()
    }

    pub fn all_tasks(&self) -> Vec<GenerationTask> {
        self.batches.lock().iter().flatten().cloned().collect()
    }
}

impl ThumbnailGenerationService for RecordingGenerator {
    fn enqueue(
        &self,
        tasks: Vec<GenerationTask>,
    ) -> BoxFuture<'_, Result<EnqueueAck, GenerationError>> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(GenerationError::Enqueue("mock failure".into()));
            }
            let accepted = tasks.len();
            self.batches.lock().push(tasks);
            Ok(EnqueueAck { accepted })
        })
    }
}

pub struct Harness {
    pub scheduler: Arc<RequestScheduler>,
    pub cache: Arc<ThumbnailCache>,
    pub probe: Arc<MockProbe>,
    pub generator: Arc<RecordingGenerator>,
}

pub fn harness_with(probe: MockProbe, generator: RecordingGenerator) -> Harness {
    let cache = Arc::new(ThumbnailCache::default());
    let probe = Arc::new(probe);
    let generator = Arc::new(generator);
    let scheduler = RequestScheduler::new(
        SchedulerConfig::default(),
        Arc::clone(&cache),
        probe.clone(),
        generator.clone(),
        Arc::new(PassthroughResolver),
    );
    Harness {
        scheduler,
        cache,
        probe,
        generator,
    }
}

pub fn harness() -> Harness {
    harness_with(MockProbe::default(), RecordingGenerator::default())
}

pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
