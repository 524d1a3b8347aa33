//! Generation queue configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::MediaKind;

/// Generation queue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Max concurrent image generations
    #[serde(rename = "image-concurrency", default = "default_image_concurrency")]
    pub image_concurrency: usize,

    /// Max concurrent model generations
    #[serde(rename = "model-concurrency", default = "default_model_concurrency")]
    pub model_concurrency: usize,

    /// Delay before re-draining a lane that still has queued work
    #[serde(rename = "poll-delay-ms", default = "default_poll_delay_ms")]
    pub poll_delay_ms: u64,

    /// Pause after each image completion before the lane drains again
    #[serde(rename = "image-settle-ms", default = "default_image_settle_ms")]
    pub image_settle_ms: u64,

    /// Pause after each model completion before the lane drains again
    #[serde(rename = "model-settle-ms", default = "default_model_settle_ms")]
    pub model_settle_ms: u64,

    /// Reject requests immediately when their kind has no generator,
    /// instead of holding them until one is registered
    #[serde(rename = "fail-fast-without-generator", default)]
    pub fail_fast_without_generator: bool,
}

fn default_image_concurrency() -> usize {
    2
}

fn default_model_concurrency() -> usize {
    1
}

fn default_poll_delay_ms() -> u64 {
    100
}

fn default_image_settle_ms() -> u64 {
    500
}

fn default_model_settle_ms() -> u64 {
    1000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            image_concurrency: 2,
            model_concurrency: 1,
            poll_delay_ms: 100,
            image_settle_ms: 500,
            model_settle_ms: 1000,
            fail_fast_without_generator: false,
        }
    }
}

impl QueueConfig {
    /// Concurrency ceiling for a kind, never below 1
    pub fn concurrency(&self, kind: MediaKind) -> usize {
        let limit = match kind {
            MediaKind::Image => self.image_concurrency,
            MediaKind::Model => self.model_concurrency,
        };
        limit.max(1)
    }

    /// Settle delay for a kind
    pub fn settle_delay(&self, kind: MediaKind) -> Duration {
        match kind {
            MediaKind::Image => Duration::from_millis(self.image_settle_ms),
            MediaKind::Model => Duration::from_millis(self.model_settle_ms),
        }
    }

    /// Poll delay between drain attempts
    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.image_concurrency, 2);
        assert_eq!(config.model_concurrency, 1);
        assert_eq!(config.poll_delay(), Duration::from_millis(100));
        assert_eq!(config.settle_delay(MediaKind::Image), Duration::from_millis(500));
        assert_eq!(config.settle_delay(MediaKind::Model), Duration::from_millis(1000));
        assert!(!config.fail_fast_without_generator);
    }

    #[test]
    fn test_concurrency_clamped() {
        let config = QueueConfig {
            image_concurrency: 0,
            model_concurrency: 4,
            ..Default::default()
        };
        assert_eq!(config.concurrency(MediaKind::Image), 1);
        assert_eq!(config.concurrency(MediaKind::Model), 4);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: QueueConfig = serde_yaml::from_str("model-settle-ms: 2500\n").unwrap();
        assert_eq!(config.model_settle_ms, 2500);
        assert_eq!(config.image_concurrency, 2);
        assert_eq!(config.poll_delay_ms, 100);
    }
}
