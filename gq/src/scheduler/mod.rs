//! Priority scheduler for caller-owned generation actions
//!
//! Runs opaque async actions in priority order under a global concurrency
//! ceiling, with a settle delay after each one.

mod config;
mod core;
mod task;

pub use config::SchedulerConfig;
pub use core::Scheduler;
pub use task::{Action, PendingTask, ScheduledTask, SchedulerStats, SchedulerStatus};
