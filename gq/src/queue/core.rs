//! Generation queue implementation

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::domain::{MediaKind, generate_request_id};
use crate::error::GenerationError;

use super::config::QueueConfig;
use super::generator::Generator;
use super::request::{GenerationRequest, LaneStats, LaneStatus, QueueStatus};

/// One media kind's queue, counters and backend
struct Lane {
    queue: VecDeque<GenerationRequest>,
    active: usize,
    limit: usize,
    generator: Option<Arc<dyn Generator>>,
    stats: LaneStats,
}

impl Lane {
    fn new(limit: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            active: 0,
            limit: limit.max(1),
            generator: None,
            stats: LaneStats::default(),
        }
    }

    fn status(&self) -> LaneStatus {
        LaneStatus {
            queued: self.queue.len(),
            active: self.active,
            limit: self.limit,
            has_generator: self.generator.is_some(),
            stats: self.stats.clone(),
        }
    }
}

/// Internal state protected by mutex
struct QueueInner {
    image: Lane,
    model: Lane,
}

impl QueueInner {
    fn lane(&self, kind: MediaKind) -> &Lane {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Model => &self.model,
        }
    }

    fn lane_mut(&mut self, kind: MediaKind) -> &mut Lane {
        match kind {
            MediaKind::Image => &mut self.image,
            MediaKind::Model => &mut self.model,
        }
    }
}

struct Shared {
    config: QueueConfig,
    inner: Mutex<QueueInner>,
}

/// Bounded concurrency work queue for image and model generation
///
/// Each media kind drains independently: requests leave their lane in
/// arrival order, at most `limit` at a time, and run as their own tokio
/// task against the lane's registered [`Generator`]. A finished request
/// frees its slot and, if work remains, re-drains the lane after the
/// poll and settle delays.
///
/// Cloning yields another handle to the same queue. Construct one at wiring
/// time and hand clones to every consumer that shares the backend.
///
/// `enqueue`, `set_generator` and `set_concurrency_limits` spawn tasks and
/// must be called from within a tokio runtime.
#[derive(Clone)]
pub struct GenerationQueue {
    shared: Arc<Shared>,
}

impl GenerationQueue {
    /// Create a new queue with the given configuration
    pub fn new(config: QueueConfig) -> Self {
        debug!(?config, "GenerationQueue::new: called");
        let inner = QueueInner {
            image: Lane::new(config.concurrency(MediaKind::Image)),
            model: Lane::new(config.concurrency(MediaKind::Model)),
        };
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(inner),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Register the backend for a media kind
    ///
    /// Requests already waiting in that lane start draining immediately.
    pub fn set_generator(&self, kind: MediaKind, generator: Arc<dyn Generator>) {
        debug!(%kind, "GenerationQueue::set_generator: called");
        {
            let mut inner = self.shared.inner.lock();
            let lane = inner.lane_mut(kind);
            if lane.generator.is_some() {
                debug!(%kind, "GenerationQueue::set_generator: replacing existing generator");
            }
            lane.generator = Some(generator);
        }
        info!(%kind, "Generator registered");
        self.drain(kind);
    }

    /// Update the concurrency ceilings; values below 1 are clamped to 1
    ///
    /// A raised ceiling admits waiting requests right away.
    pub fn set_concurrency_limits(&self, image_limit: usize, model_limit: usize) {
        debug!(image_limit, model_limit, "GenerationQueue::set_concurrency_limits: called");
        {
            let mut inner = self.shared.inner.lock();
            inner.image.limit = image_limit.max(1);
            inner.model.limit = model_limit.max(1);
            info!(
                image = inner.image.limit,
                model = inner.model.limit,
                "Concurrency limits updated"
            );
        }
        for kind in MediaKind::ALL {
            self.drain(kind);
        }
    }

    /// Add a request to the tail of its lane and return its ID
    ///
    /// Never blocks. Without a registered generator the request waits in its
    /// lane until one arrives, unless `fail_fast_without_generator` is set,
    /// in which case its error callback fires before this returns.
    pub fn enqueue(&self, mut request: GenerationRequest) -> String {
        let kind = request.kind;
        let id = request.id.get_or_insert_with(|| generate_request_id(kind)).clone();
        debug!(%id, %kind, priority = request.priority, "GenerationQueue::enqueue: called");
        request.enqueued_at = Some(Instant::now());

        let mut inner = self.shared.inner.lock();
        let has_generator = inner.lane(kind).generator.is_some();
        if !has_generator && self.shared.config.fail_fast_without_generator {
            inner.lane_mut(kind).stats.total_failed += 1;
            drop(inner);
            error!(%id, %kind, "No generator registered, rejecting request");
            request.settle(Err(GenerationError::MissingGenerator(kind)));
            return id;
        }

        let lane = inner.lane_mut(kind);
        lane.queue.push_back(request);
        lane.stats.total_enqueued += 1;
        lane.stats.peak_queue_depth = lane.stats.peak_queue_depth.max(lane.queue.len());
        let queued = lane.queue.len();
        drop(inner);

        debug!(%id, %kind, queued, "Enqueued");
        self.drain(kind);
        id
    }

    /// Enqueue a request as an image generation
    pub fn enqueue_image(&self, mut request: GenerationRequest) -> String {
        request.kind = MediaKind::Image;
        self.enqueue(request)
    }

    /// Enqueue a request as a model generation
    pub fn enqueue_model(&self, mut request: GenerationRequest) -> String {
        request.kind = MediaKind::Model;
        self.enqueue(request)
    }

    /// Snapshot of both lanes
    pub fn status(&self) -> QueueStatus {
        debug!("GenerationQueue::status: called");
        let inner = self.shared.inner.lock();
        QueueStatus {
            image: inner.image.status(),
            model: inner.model.status(),
        }
    }

    /// Drop every queued request that has not been admitted yet
    ///
    /// Dropped requests never settle. In-flight requests are unaffected.
    pub fn clear(&self) -> usize {
        debug!("GenerationQueue::clear: called");
        // Requests are dropped after the lock is released so captured state
        // in their callbacks can safely touch the queue from Drop.
        let mut dropped = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            for kind in MediaKind::ALL {
                let lane = inner.lane_mut(kind);
                lane.stats.total_cleared += lane.queue.len() as u64;
                dropped.extend(lane.queue.drain(..));
            }
        }
        let count = dropped.len();
        drop(dropped);
        info!(dropped = count, "Queue cleared");
        count
    }

    /// Remove a single queued request; admitted requests cannot be cancelled
    pub fn cancel(&self, id: &str) -> bool {
        debug!(%id, "GenerationQueue::cancel: called");
        let removed = {
            let mut inner = self.shared.inner.lock();
            MediaKind::ALL.into_iter().find_map(|kind| {
                let lane = inner.lane_mut(kind);
                let pos = lane.queue.iter().position(|r| r.id() == id)?;
                lane.stats.total_cleared += 1;
                lane.queue.remove(pos)
            })
        };

        match removed {
            Some(request) => {
                debug!(%id, kind = %request.kind, "GenerationQueue::cancel: removed from queue");
                true
            }
            None => {
                debug!(%id, "GenerationQueue::cancel: not found in queue");
                false
            }
        }
    }

    /// Admit as many queued requests of `kind` as the ceiling allows
    ///
    /// The ceiling check and the increment happen under one lock, so
    /// concurrent drains cannot over-admit.
    fn drain(&self, kind: MediaKind) {
        let (generator, admitted) = {
            let mut inner = self.shared.inner.lock();
            let lane = inner.lane_mut(kind);
            if lane.queue.is_empty() {
                return;
            }
            let Some(generator) = lane.generator.clone() else {
                error!(%kind, queued = lane.queue.len(), "No generator registered, requests are stalled");
                return;
            };

            let mut admitted = Vec::new();
            while lane.active < lane.limit {
                let Some(request) = lane.queue.pop_front() else {
                    break;
                };
                lane.active += 1;
                lane.stats.total_wait_time_ms += request.waited().as_millis() as u64;
                admitted.push(request);
            }
            lane.stats.peak_active = lane.stats.peak_active.max(lane.active);
            (generator, admitted)
        };

        for request in admitted {
            debug!(id = %request.id(), %kind, "GenerationQueue::drain: admitting");
            let queue = self.clone();
            let generator = generator.clone();
            tokio::spawn(async move { queue.dispatch(kind, generator, request).await });
        }
    }

    /// Run one admitted request to completion and release its slot
    async fn dispatch(self, kind: MediaKind, generator: Arc<dyn Generator>, request: GenerationRequest) {
        let id = request.id().to_string();
        debug!(%id, %kind, "GenerationQueue::dispatch: called");

        let result = AssertUnwindSafe(generator.generate(&request.prompt, request.metadata.as_ref()))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(GenerationError::from_panic(payload)));

        let succeeded = result.is_ok();
        match &result {
            Ok(_) => debug!(%id, %kind, "Generation succeeded"),
            Err(err) => warn!(%id, %kind, %err, "Generation failed"),
        }

        if std::panic::catch_unwind(AssertUnwindSafe(|| request.settle(result))).is_err() {
            error!(%id, %kind, "Request callback panicked");
        }

        let remaining = {
            let mut inner = self.shared.inner.lock();
            let lane = inner.lane_mut(kind);
            lane.active -= 1;
            if succeeded {
                lane.stats.total_succeeded += 1;
            } else {
                lane.stats.total_failed += 1;
            }
            lane.queue.len()
        };

        if remaining > 0 {
            let delay = self.shared.config.poll_delay() + self.shared.config.settle_delay(kind);
            debug!(%kind, remaining, ?delay, "GenerationQueue::dispatch: settling before next drain");
            tokio::time::sleep(delay).await;
            self.drain(kind);
        }
    }
}
