//! Bounded concurrency work queue for image and model generation
//!
//! Requests are split into one FIFO lane per media kind. Each lane has its
//! own concurrency ceiling and backend, and drains independently of the
//! other.

mod config;
mod core;
mod generator;
mod request;

pub use config::QueueConfig;
pub use core::GenerationQueue;
pub use generator::{FnGenerator, Generator, generator_fn};
pub use request::{ErrorCallback, GenerationRequest, LaneStats, LaneStatus, QueueStatus, SuccessCallback};
