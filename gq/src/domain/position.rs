//! Spatial position carried as request metadata

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// World-space position where a generated model should be placed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SpatialPosition {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Extract a position from opaque request metadata
    ///
    /// Accepts either the position object itself (`{"x":..,"y":..,"z":..}`)
    /// or an object carrying it under a `position` key.
    pub fn from_metadata(metadata: &Value) -> Option<Self> {
        let candidate = metadata.get("position").unwrap_or(metadata);
        serde_json::from_value(candidate.clone()).ok()
    }

    /// Encode this position as request metadata
    pub fn to_metadata(self) -> Value {
        serde_json::json!({ "position": self })
    }
}
