//! Cancellable timers.
//!
//! Every deferred action in the crate (debounce, retry backoff, load delay,
//! frame coalescing) is held as a [`ScheduledTask`]. Dropping the handle
//! aborts the task, so owners release their timers simply by going away.
//!
//! All constructors spawn onto the current tokio runtime and must be called
//! from within one.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Default frame interval for coalesced geometry callbacks (~60 Hz).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Handle to a spawned task that is aborted when dropped.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Run `fut` now.
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(fut),
        }
    }

    /// Run `fut` after `delay`. Both the wait and `fut` are cancellable.
    pub fn after<F>(delay: Duration, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::spawn(async move {
            tokio::time::sleep(delay).await;
            fut.await;
        })
    }

    /// Abort the task. No-op if it already finished.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Trailing-edge debouncer.
///
/// Each `schedule` restarts the delay; only the last action of a burst runs.
/// Once the delay elapses the action is detached and runs to completion;
/// only the wait is cancelled by a later `schedule` or `cancel`.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    slot: Mutex<Option<ScheduledTask>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `action`, replacing any pending one.
    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = ScheduledTask::after(self.delay, async move {
            tokio::spawn(action);
        });
        // Replacing the slot drops, and so aborts, the previous wait.
        *self.slot.lock() = Some(task);
    }

    /// Drop the pending action, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match self.slot.lock().take() {
            Some(task) => !task.is_finished(),
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }
}

/// Collapses bursts of requests into one callback per frame.
///
/// While a callback is pending, further requests are dropped; the pending
/// callback reads the latest state when it runs.
#[derive(Debug)]
pub struct FrameCoalescer {
    interval: Duration,
    pending: Arc<AtomicBool>,
    task: Mutex<Option<ScheduledTask>>,
}

impl Default for FrameCoalescer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl FrameCoalescer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Request `callback` on the next frame. Returns `false` when a callback
    /// is already pending and this one was coalesced away.
    pub fn request<F>(&self, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let pending = Arc::clone(&self.pending);
        let task = ScheduledTask::after(self.interval, async move {
            pending.store(false, Ordering::Release);
            callback();
        });
        *self.task.lock() = Some(task);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Drop the pending callback.
    pub fn cancel(&self) {
        if let Some(task) = self.task.lock().take() {
            task.cancel();
        }
        self.pending.store(false, Ordering::Release);
    }
}
