//! Results produced by generators

use serde::{Deserialize, Serialize};

use super::{MediaKind, SpatialPosition};

/// A generated 2D image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Where the image can be fetched from
    pub uri: String,

    #[serde(rename = "mime-type")]
    pub mime_type: String,
}

/// A generated 3D model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAsset {
    /// Where the model can be fetched from
    pub uri: String,

    /// Placement requested by the caller, if any
    #[serde(default)]
    pub position: Option<SpatialPosition>,
}

/// Successful result of a generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GenerationOutput {
    Image(ImageAsset),
    Model(ModelAsset),
}

impl GenerationOutput {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Image(_) => MediaKind::Image,
            Self::Model(_) => MediaKind::Model,
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Self::Image(asset) => &asset.uri,
            Self::Model(asset) => &asset.uri,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_kind_and_uri() {
        let image = GenerationOutput::Image(ImageAsset {
            uri: "https://cdn.example/a.png".to_string(),
            mime_type: "image/png".to_string(),
        });
        assert_eq!(image.kind(), MediaKind::Image);
        assert_eq!(image.uri(), "https://cdn.example/a.png");

        let model = GenerationOutput::Model(ModelAsset {
            uri: "https://cdn.example/a.glb".to_string(),
            position: None,
        });
        assert_eq!(model.kind(), MediaKind::Model);
    }

    #[test]
    fn test_output_serde_tagged() {
        let model = GenerationOutput::Model(ModelAsset {
            uri: "m.glb".to_string(),
            position: Some(SpatialPosition::new(1.0, 0.0, 0.0)),
        });
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["kind"], "model");
        assert_eq!(json["uri"], "m.glb");
    }
}
