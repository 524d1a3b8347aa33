//! Generation requests and queue status types

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::{GenerationOutput, MediaKind};
use crate::error::GenerationError;

/// Callback invoked with a successful result
pub type SuccessCallback = Box<dyn FnOnce(GenerationOutput) + Send + 'static>;

/// Callback invoked with a failure
pub type ErrorCallback = Box<dyn FnOnce(GenerationError) + Send + 'static>;

/// A unit of work for the generation queue
///
/// Callbacks are `FnOnce`: a request settles through exactly one of them,
/// exactly once. Requests dropped by `clear` or `cancel` settle through
/// neither.
pub struct GenerationRequest {
    /// Caller supplied ID; one is generated at enqueue time when empty
    pub id: Option<String>,
    pub kind: MediaKind,
    pub prompt: String,

    /// Informational only; lanes are strictly FIFO
    pub priority: i32,

    /// Opaque caller data handed to the generator untouched
    pub metadata: Option<Value>,

    pub(crate) on_success: Option<SuccessCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
    pub(crate) enqueued_at: Option<Instant>,
}

impl GenerationRequest {
    /// Create a new request
    pub fn new(kind: MediaKind, prompt: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            prompt: prompt.into(),
            priority: 0,
            metadata: None,
            on_success: None,
            on_error: None,
            enqueued_at: None,
        }
    }

    pub fn image(prompt: impl Into<String>) -> Self {
        Self::new(MediaKind::Image, prompt)
    }

    pub fn model(prompt: impl Into<String>) -> Self {
        Self::new(MediaKind::Model, prompt)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(GenerationOutput) + Send + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(GenerationError) + Send + 'static,
    {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// The request ID, empty until assigned at enqueue
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Time spent queued so far
    pub fn waited(&self) -> Duration {
        self.enqueued_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    /// Settle this request with the outcome of its generation
    pub(crate) fn settle(self, result: Result<GenerationOutput, GenerationError>) {
        let id = self.id().to_string();
        match result {
            Ok(output) => match self.on_success {
                Some(callback) => callback(output),
                None => debug!(%id, "GenerationRequest::settle: no success callback"),
            },
            Err(err) => match self.on_error {
                Some(callback) => callback(err),
                None => debug!(%id, %err, "GenerationRequest::settle: no error callback"),
            },
        }
    }
}

impl std::fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("prompt", &self.prompt)
            .field("priority", &self.priority)
            .field("metadata", &self.metadata)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Counters for one lane
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LaneStats {
    pub total_enqueued: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub total_cleared: u64,
    pub total_wait_time_ms: u64,
    pub peak_queue_depth: usize,
    pub peak_active: usize,
}

/// Snapshot of one lane
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaneStatus {
    pub queued: usize,
    pub active: usize,
    pub limit: usize,
    pub has_generator: bool,
    pub stats: LaneStats,
}

impl LaneStatus {
    /// Queued work that cannot make progress until a generator is registered
    pub fn is_stalled(&self) -> bool {
        !self.has_generator && self.queued > 0
    }
}

/// Snapshot of the whole generation queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub image: LaneStatus,
    pub model: LaneStatus,
}

impl QueueStatus {
    pub fn lane(&self, kind: MediaKind) -> &LaneStatus {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Model => &self.model,
        }
    }

    pub fn image_queue_size(&self) -> usize {
        self.image.queued
    }

    pub fn model_queue_size(&self) -> usize {
        self.model.queued
    }

    pub fn active_image(&self) -> usize {
        self.image.active
    }

    pub fn active_model(&self) -> usize {
        self.model.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImageAsset;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_builder() {
        let req = GenerationRequest::model("a chair")
            .with_id("chair-1")
            .with_priority(3)
            .with_metadata(serde_json::json!({"x": 1}));
        assert_eq!(req.kind, MediaKind::Model);
        assert_eq!(req.id(), "chair-1");
        assert_eq!(req.priority, 3);
        assert!(req.metadata.is_some());
    }

    #[test]
    fn test_settle_routes_to_one_callback() {
        let successes = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let s = successes.clone();
        let e = errors.clone();
        let req = GenerationRequest::image("x")
            .on_success(move |_| {
                s.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |_| {
                e.fetch_add(1, Ordering::SeqCst);
            });
        req.settle(Ok(GenerationOutput::Image(ImageAsset {
            uri: "u".to_string(),
            mime_type: "image/png".to_string(),
        })));

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_settle_without_callbacks() {
        GenerationRequest::image("x").settle(Err(GenerationError::failed("ignored")));
    }

    #[test]
    fn test_lane_stalled() {
        let lane = LaneStatus {
            queued: 1,
            active: 0,
            limit: 1,
            has_generator: false,
            stats: LaneStats::default(),
        };
        assert!(lane.is_stalled());
        assert!(!LaneStatus { queued: 0, ..lane }.is_stalled());
    }
}
