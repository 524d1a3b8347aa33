//! Synthetic load for exercising the queue and scheduler
//!
//! Wires both components against fake backends with jittered latency and
//! random failures, the way the Lens runtime wires them against real ones.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::{GenerationOutput, ImageAsset, MediaKind, ModelAsset, SpatialPosition};
use crate::error::GenerationError;
use crate::queue::{GenerationQueue, GenerationRequest, Generator, QueueStatus};
use crate::scheduler::{Scheduler, SchedulerStatus};

/// Fake backend with jittered latency and a fixed failure rate
pub struct SyntheticGenerator {
    kind: MediaKind,
    latency: Duration,
    failure_rate: f64,
}

impl SyntheticGenerator {
    pub fn new(kind: MediaKind, latency: Duration, failure_rate: f64) -> Self {
        Self {
            kind,
            latency,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl Generator for SyntheticGenerator {
    async fn generate(&self, prompt: &str, metadata: Option<&Value>) -> Result<GenerationOutput, GenerationError> {
        let (delay, fail) = {
            let mut rng = rand::rng();
            let base = self.latency.as_millis() as u64;
            let jitter = rng.random_range(0..=base / 2);
            (Duration::from_millis(base + jitter), rng.random_bool(self.failure_rate))
        };
        debug!(kind = %self.kind, %prompt, ?delay, fail, "SyntheticGenerator::generate: called");
        tokio::time::sleep(delay).await;

        if fail {
            return Err(GenerationError::Backend {
                status: 503,
                message: "synthetic backend overloaded".to_string(),
            });
        }

        let slug: String = prompt
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect();
        Ok(match self.kind {
            MediaKind::Image => GenerationOutput::Image(ImageAsset {
                uri: format!("synthetic://image/{}.png", slug),
                mime_type: "image/png".to_string(),
            }),
            MediaKind::Model => GenerationOutput::Model(ModelAsset {
                uri: format!("synthetic://model/{}.glb", slug),
                position: metadata.and_then(SpatialPosition::from_metadata),
            }),
        })
    }
}

/// How much synthetic load to generate
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub images: usize,
    pub models: usize,
    pub tasks: usize,
    pub latency: Duration,
    pub failure_rate: f64,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            images: 6,
            models: 3,
            tasks: 3,
            latency: Duration::from_millis(300),
            failure_rate: 0.1,
        }
    }
}

impl SimulationPlan {
    pub fn total(&self) -> usize {
        self.images + self.models + self.tasks
    }
}

/// One settled unit of work
#[derive(Debug, Clone, Serialize)]
pub struct SimulationEvent {
    /// `image`, `model` or `scheduler`
    pub source: String,
    pub id: String,
    pub outcome: Result<String, String>,
    pub elapsed: Duration,
}

/// Final tally of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub queue: QueueStatus,
    pub scheduler: SchedulerStatus,
}

/// Run a simulation and report each settlement to `observer`
pub async fn run_simulation<F>(config: &Config, plan: &SimulationPlan, mut observer: F) -> SimulationReport
where
    F: FnMut(&SimulationEvent),
{
    info!(?plan, "Starting simulation");
    let started = Instant::now();

    let queue = GenerationQueue::new(config.queue.clone());
    let scheduler = Scheduler::new(config.scheduler.clone());
    let model_backend: Arc<dyn Generator> =
        Arc::new(SyntheticGenerator::new(MediaKind::Model, plan.latency * 2, plan.failure_rate));
    queue.set_generator(
        MediaKind::Image,
        Arc::new(SyntheticGenerator::new(MediaKind::Image, plan.latency, plan.failure_rate)),
    );
    queue.set_generator(MediaKind::Model, model_backend.clone());

    let (tx, mut rx) = mpsc::unbounded_channel::<SimulationEvent>();

    let requests = (0..plan.images)
        .map(|i| (MediaKind::Image, i))
        .chain((0..plan.models).map(|i| (MediaKind::Model, i)));
    for (kind, i) in requests {
        let ok_tx = tx.clone();
        let err_tx = tx.clone();
        let id = format!("{}-{}", kind, i);
        let ok_id = id.clone();
        let err_id = id.clone();
        let position = SpatialPosition::new(i as f32, 0.0, -1.0);
        queue.enqueue(
            GenerationRequest::new(kind, format!("node {} {}", kind, i))
                .with_id(id)
                .with_metadata(position.to_metadata())
                .on_success(move |output| {
                    let _ = ok_tx.send(SimulationEvent {
                        source: kind.to_string(),
                        id: ok_id,
                        outcome: Ok(output.uri().to_string()),
                        elapsed: started.elapsed(),
                    });
                })
                .on_error(move |err| {
                    let _ = err_tx.send(SimulationEvent {
                        source: kind.to_string(),
                        id: err_id,
                        outcome: Err(err.to_string()),
                        elapsed: started.elapsed(),
                    });
                }),
        );
    }

    for i in 0..plan.tasks {
        let tx = tx.clone();
        let backend = model_backend.clone();
        let owner = format!("model-node-{}", i);
        let owner_for_action = owner.clone();
        let priority = (i % 3) as i32;
        scheduler.schedule(
            owner,
            move || async move {
                let result = backend.generate(&format!("scheduled {}", owner_for_action), None).await;
                let outcome = result.as_ref().map(|o| o.uri().to_string()).map_err(|e| e.to_string());
                let _ = tx.send(SimulationEvent {
                    source: "scheduler".to_string(),
                    id: owner_for_action,
                    outcome,
                    elapsed: started.elapsed(),
                });
                result.map(|_| ()).map_err(eyre::Report::new)
            },
            priority,
        );
    }
    drop(tx);

    let mut succeeded = 0;
    let mut failed = 0;
    while let Some(event) = rx.recv().await {
        if event.outcome.is_ok() {
            succeeded += 1;
        } else {
            failed += 1;
        }
        observer(&event);
        if succeeded + failed == plan.total() {
            break;
        }
    }

    let report = SimulationReport {
        succeeded,
        failed,
        elapsed: started.elapsed(),
        queue: queue.status(),
        scheduler: scheduler.status(),
    };
    info!(succeeded, failed, elapsed = ?report.elapsed, "Simulation finished");
    report
}
