//! Task types for the scheduler

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;

/// A zero-argument unit of work run by the scheduler
///
/// The scheduler never looks inside an action. Whatever the action produces
/// is delivered by the action itself, typically through callbacks it
/// captured; the scheduler only observes whether it settled with an error.
#[async_trait]
pub trait Action: Send + 'static {
    async fn run(self: Box<Self>) -> eyre::Result<()>;
}

#[async_trait]
impl<F, Fut> Action for F
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = eyre::Result<()>> + Send + 'static,
{
    async fn run(self: Box<Self>) -> eyre::Result<()> {
        (*self)().await
    }
}

/// A queued action
pub struct ScheduledTask {
    pub owner_id: String,
    pub priority: i32,
    pub submitted_at: Instant,
    pub(crate) action: Box<dyn Action>,
}

impl ScheduledTask {
    /// Create a new scheduled task
    pub fn new(owner_id: impl Into<String>, action: Box<dyn Action>, priority: i32) -> Self {
        Self {
            owner_id: owner_id.into(),
            priority,
            submitted_at: Instant::now(),
            action,
        }
    }
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("owner_id", &self.owner_id)
            .field("priority", &self.priority)
            .field("submitted_at", &self.submitted_at)
            .finish_non_exhaustive()
    }
}

/// Insert a task keeping the queue in descending priority order
///
/// The sort is stable, so equal priorities keep their insertion order.
pub(crate) fn insert_by_priority(queue: &mut Vec<ScheduledTask>, task: ScheduledTask) {
    queue.push(task);
    queue.sort_by(|a, b| b.priority.cmp(&a.priority));
}

/// Statistics for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub total_scheduled: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_cleared: u64,
    pub total_wait_time_ms: u64,
    pub peak_queue_depth: usize,
    pub peak_concurrent: usize,
}

/// Scheduler state for debug overlays
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub queued: usize,
    pub active: usize,
    pub max_concurrent: usize,
    pub stats: SchedulerStats,
}

/// Queued task for debug overlays
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTask {
    pub owner_id: String,
    pub priority: i32,
    pub wait_time: Duration,
}
