//! genqueue - generation request scheduling for AR Lens nodes
//!
//! Many visual nodes in a Lens scene want images and 3D models from the
//! same rate-limited generation API. genqueue sits between them and that
//! API so they never have to know about each other.
//!
//! # Core Concepts
//!
//! - **Lanes**: image and model requests queue separately, FIFO, each with
//!   its own concurrency ceiling
//! - **Injected backends**: the actual generation is a [`Generator`]
//!   registered per media kind at wiring time
//! - **Priority actions**: model nodes that drive their own generation hand
//!   the [`Scheduler`] an [`Action`] and a priority
//! - **Settle delays**: every completion is followed by a pause so the
//!   backend is never hit back-to-back
//! - **Shared handles**: both components are constructed once and cloned
//!   into every consumer
//!
//! # Modules
//!
//! - [`queue`] - bounded concurrency work queue
//! - [`scheduler`] - priority scheduler
//! - [`domain`] - media kinds, results, positions, IDs
//! - [`config`] - configuration types and loading
//! - [`simulate`] - synthetic load driver
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod queue;
pub mod scheduler;
pub mod simulate;

// Re-export commonly used types
pub use config::Config;
pub use domain::{GenerationOutput, ImageAsset, MediaKind, ModelAsset, SpatialPosition, generate_request_id};
pub use error::GenerationError;
pub use queue::{
    GenerationQueue, GenerationRequest, Generator, LaneStats, LaneStatus, QueueConfig, QueueStatus, generator_fn,
};
pub use scheduler::{Action, PendingTask, Scheduler, SchedulerConfig, SchedulerStats, SchedulerStatus};
pub use simulate::{SimulationEvent, SimulationPlan, SimulationReport, SyntheticGenerator, run_simulation};
