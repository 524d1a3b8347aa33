//! Media kinds handled by the generation queue

use serde::{Deserialize, Serialize};

/// Kind of media a generation request produces
///
/// Each kind has its own lane in the queue, with its own concurrency
/// ceiling and settle delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Model,
}

impl MediaKind {
    /// All kinds, in lane order
    pub const ALL: [MediaKind; 2] = [MediaKind::Image, MediaKind::Model];
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Model => write!(f, "model"),
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "model" | "3d" => Ok(Self::Model),
            _ => Err(format!("Unknown media kind: {}", s)),
        }
    }
}
