//! Scheduler implementation

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::GenerationError;

use super::config::SchedulerConfig;
use super::task::{Action, PendingTask, ScheduledTask, SchedulerStats, SchedulerStatus, insert_by_priority};

/// Internal state protected by mutex
struct SchedulerInner {
    /// Waiting tasks, highest priority first
    queue: Vec<ScheduledTask>,

    /// Tasks running or settling
    active: usize,

    max_concurrent: usize,

    /// A drain task has been spawned and has not run yet
    drain_pending: bool,

    stats: SchedulerStats,
}

struct Shared {
    config: SchedulerConfig,
    inner: Mutex<SchedulerInner>,
}

/// The Scheduler runs caller-supplied actions in priority order under a
/// global concurrency ceiling.
///
/// Admission is deferred to a drain task, so actions scheduled in the same
/// tick compete by priority before any of them starts. After an action
/// settles its slot stays occupied for the settle delay, throttling the
/// rate at which the shared backend is hit.
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Create a new scheduler with the given configuration
    pub fn new(config: SchedulerConfig) -> Self {
        debug!(?config, "Scheduler::new: called");
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(SchedulerInner {
                    queue: Vec::new(),
                    active: 0,
                    max_concurrent,
                    drain_pending: false,
                    stats: SchedulerStats::default(),
                }),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Queue an action for `owner_id`
    ///
    /// Higher priorities run first; equal priorities run in the order they
    /// were scheduled. The action reports its own outcome to its owner.
    pub fn schedule<A: Action>(&self, owner_id: impl Into<String>, action: A, priority: i32) {
        let task = ScheduledTask::new(owner_id, Box::new(action), priority);
        debug!(owner_id = %task.owner_id, priority, "Scheduler::schedule: called");

        {
            let mut inner = self.shared.inner.lock();
            insert_by_priority(&mut inner.queue, task);
            inner.stats.total_scheduled += 1;
            inner.stats.peak_queue_depth = inner.stats.peak_queue_depth.max(inner.queue.len());
            debug!(queued = inner.queue.len(), "Queued");
        }

        self.request_drain();
    }

    /// Update the concurrency ceiling; values below 1 are clamped to 1
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        debug!(max_concurrent, "Scheduler::set_max_concurrent: called");
        {
            let mut inner = self.shared.inner.lock();
            inner.max_concurrent = max_concurrent.max(1);
            info!(max_concurrent = inner.max_concurrent, "Scheduler concurrency updated");
        }
        self.request_drain();
    }

    /// Get current scheduler state
    pub fn status(&self) -> SchedulerStatus {
        debug!("Scheduler::status: called");
        let inner = self.shared.inner.lock();
        SchedulerStatus {
            queued: inner.queue.len(),
            active: inner.active,
            max_concurrent: inner.max_concurrent,
            stats: inner.stats.clone(),
        }
    }

    /// Get the waiting tasks in the order they will be admitted
    pub fn pending(&self) -> Vec<PendingTask> {
        debug!("Scheduler::pending: called");
        let inner = self.shared.inner.lock();
        inner
            .queue
            .iter()
            .map(|t| PendingTask {
                owner_id: t.owner_id.clone(),
                priority: t.priority,
                wait_time: t.submitted_at.elapsed(),
            })
            .collect()
    }

    /// Drop every queued task; running tasks are unaffected
    pub fn clear(&self) -> usize {
        debug!("Scheduler::clear: called");
        let dropped: Vec<ScheduledTask> = {
            let mut inner = self.shared.inner.lock();
            let dropped: Vec<ScheduledTask> = inner.queue.drain(..).collect();
            inner.stats.total_cleared += dropped.len() as u64;
            dropped
        };
        info!(dropped = dropped.len(), "Scheduler queue cleared");
        dropped.len()
    }

    /// Drop every queued task belonging to `owner_id`
    pub fn cancel_owner(&self, owner_id: &str) -> usize {
        debug!(%owner_id, "Scheduler::cancel_owner: called");
        let dropped: Vec<ScheduledTask> = {
            let mut inner = self.shared.inner.lock();
            let (dropped, kept): (Vec<_>, Vec<_>) = inner.queue.drain(..).partition(|t| t.owner_id == owner_id);
            inner.queue = kept;
            inner.stats.total_cleared += dropped.len() as u64;
            dropped
        };
        debug!(%owner_id, dropped = dropped.len(), "Scheduler::cancel_owner: done");
        dropped.len()
    }

    /// Spawn a drain task unless one is already pending
    fn request_drain(&self) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.drain_pending {
                debug!("Scheduler::request_drain: drain already pending");
                return;
            }
            inner.drain_pending = true;
        }

        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.shared.inner.lock().drain_pending = false;
            scheduler.drain();
        });
    }

    /// Admit as many queued tasks as the ceiling allows
    fn drain(&self) {
        let admitted: Vec<ScheduledTask> = {
            let mut inner = self.shared.inner.lock();
            let mut admitted = Vec::new();
            while inner.active < inner.max_concurrent && !inner.queue.is_empty() {
                let task = inner.queue.remove(0);
                inner.active += 1;
                inner.stats.total_wait_time_ms += task.submitted_at.elapsed().as_millis() as u64;
                admitted.push(task);
            }
            inner.stats.peak_concurrent = inner.stats.peak_concurrent.max(inner.active);
            admitted
        };

        for task in admitted {
            debug!(owner_id = %task.owner_id, priority = task.priority, "Scheduler::drain: admitting");
            let scheduler = self.clone();
            tokio::spawn(async move { scheduler.run_task(task).await });
        }
    }

    /// Run one admitted task, hold its slot for the settle delay, release it
    async fn run_task(self, task: ScheduledTask) {
        let ScheduledTask {
            owner_id,
            priority,
            action,
            ..
        } = task;
        debug!(%owner_id, priority, "Scheduler::run_task: called");

        let failed = match AssertUnwindSafe(action.run()).catch_unwind().await {
            Ok(Ok(())) => {
                debug!(%owner_id, "Action completed");
                false
            }
            Ok(Err(err)) => {
                warn!(%owner_id, error = %err, "Action failed");
                true
            }
            Err(payload) => {
                let err = GenerationError::from_panic(payload);
                error!(%owner_id, %err, "Action panicked");
                true
            }
        };

        tokio::time::sleep(self.shared.config.settle_delay()).await;

        let remaining = {
            let mut inner = self.shared.inner.lock();
            inner.active -= 1;
            if failed {
                inner.stats.total_failed += 1;
            } else {
                inner.stats.total_completed += 1;
            }
            inner.queue.len()
        };

        if remaining > 0 {
            debug!(remaining, "Scheduler::run_task: draining next");
            self.drain();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    fn config(max_concurrent: usize, settle_ms: u64) -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent,
            settle_ms,
        }
    }

    /// Let spawned drain tasks run
    async fn tick() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn reporting(
        owner: &'static str,
        work: Duration,
        tx: mpsc::UnboundedSender<&'static str>,
    ) -> impl FnOnce() -> futures::future::BoxFuture<'static, eyre::Result<()>> + Send + 'static {
        move || {
            async move {
                tokio::time::sleep(work).await;
                let _ = tx.send(owner);
                Ok::<(), eyre::Report>(())
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_ordering() {
        let scheduler = Scheduler::new(config(1, 10));
        let (tx, mut rx) = mpsc::unbounded_channel();

        scheduler.schedule("A", reporting("A", Duration::from_millis(5), tx.clone()), 1);
        scheduler.schedule("B", reporting("B", Duration::from_millis(5), tx.clone()), 5);
        scheduler.schedule("C", reporting("C", Duration::from_millis(5), tx.clone()), 1);

        let mut order = Vec::new();
        for _ in 0..3 {
            order.push(rx.recv().await.unwrap());
        }
        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_limit() {
        let scheduler = Scheduler::new(config(2, 10));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();

        for i in 0..6 {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            let tx = tx.clone();
            scheduler.schedule(
                format!("node-{}", i),
                move || async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    let _ = tx.send(i);
                    Ok::<(), eyre::Report>(())
                },
                0,
            );
        }

        tick().await;
        assert_eq!(scheduler.status().active, 2);
        assert_eq!(scheduler.status().queued, 4);

        for _ in 0..6 {
            rx.recv().await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_holds_slot() {
        let scheduler = Scheduler::new(config(1, 1000));
        let (tx, mut rx) = mpsc::unbounded_channel();

        for owner in ["first", "second"] {
            let tx = tx.clone();
            scheduler.schedule(
                owner,
                move || async move {
                    let _ = tx.send(Instant::now());
                    Ok::<(), eyre::Report>(())
                },
                0,
            );
        }

        let first = rx.recv().await.unwrap();
        tick().await;
        assert_eq!(scheduler.status().active, 1, "slot held while settling");
        let second = rx.recv().await.unwrap();
        assert!(second - first >= Duration::from_millis(1000));
    }

    async fn backend_down() -> eyre::Result<()> {
        Err(eyre::eyre!("backend down"))
    }

    async fn node_vanished() -> eyre::Result<()> {
        panic!("node vanished")
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_swallowed() {
        let scheduler = Scheduler::new(config(1, 10));
        let (tx, mut rx) = mpsc::unbounded_channel();

        scheduler.schedule("bad", backend_down, 10);
        scheduler.schedule("panics", node_vanished, 5);
        scheduler.schedule("good", reporting("good", Duration::from_millis(5), tx.clone()), 0);

        assert_eq!(rx.recv().await.unwrap(), "good");
        tokio::time::sleep(Duration::from_millis(20)).await;

        let status = scheduler.status();
        assert_eq!(status.stats.total_failed, 2);
        assert_eq!(status.stats.total_completed, 1);
        assert_eq!(status.active, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_before_admission() {
        let scheduler = Scheduler::new(config(1, 10));
        let (tx, mut rx) = mpsc::unbounded_channel();
        for owner in ["a", "b", "c", "d", "e"] {
            scheduler.schedule(owner, reporting(owner, Duration::from_millis(5), tx.clone()), 0);
        }
        drop(tx);

        assert_eq!(scheduler.clear(), 5);
        assert!(rx.recv().await.is_none());
        assert_eq!(scheduler.status().stats.total_cleared, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_max_concurrent_admits_waiting() {
        let scheduler = Scheduler::new(config(1, 10));
        let (tx, _rx) = mpsc::unbounded_channel();
        for owner in ["a", "b", "c", "d", "e"] {
            scheduler.schedule(owner, reporting(owner, Duration::from_secs(10), tx.clone()), 0);
        }
        tick().await;
        assert_eq!(scheduler.status().active, 1);

        scheduler.set_max_concurrent(3);
        tick().await;
        let status = scheduler.status();
        assert_eq!(status.active, 3);
        assert_eq!(status.queued, 2);
        assert_eq!(status.max_concurrent, 3);

        scheduler.set_max_concurrent(0);
        assert_eq!(scheduler.status().max_concurrent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_and_cancel_owner() {
        let scheduler = Scheduler::new(config(1, 10));
        let (tx, _rx) = mpsc::unbounded_channel();
        scheduler.schedule("node-1", reporting("x", Duration::from_secs(10), tx.clone()), 0);
        tick().await;

        scheduler.schedule("node-2", reporting("y", Duration::from_secs(1), tx.clone()), 1);
        scheduler.schedule("node-3", reporting("z", Duration::from_secs(1), tx.clone()), 3);
        scheduler.schedule("node-2", reporting("w", Duration::from_secs(1), tx.clone()), 2);

        let owners: Vec<_> = scheduler.pending().into_iter().map(|p| (p.owner_id, p.priority)).collect();
        assert_eq!(
            owners,
            vec![
                ("node-3".to_string(), 3),
                ("node-2".to_string(), 2),
                ("node-2".to_string(), 1)
            ]
        );

        assert_eq!(scheduler.cancel_owner("node-2"), 2);
        assert_eq!(scheduler.cancel_owner("node-1"), 0);
        assert_eq!(scheduler.status().queued, 1);
    }
}
