//! Domain types shared by the generation queue and the scheduler

mod id;
mod kind;
mod output;
mod position;

pub use id::generate_request_id;
pub use kind::MediaKind;
pub use output::{GenerationOutput, ImageAsset, ModelAsset};
pub use position::SpatialPosition;
