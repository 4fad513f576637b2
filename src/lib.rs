//! Interactive liquify: a per-pixel displacement field painted with a soft
//! brush, composited onto the source by inverse mapping, with an optional
//! segmentation mask that can hold the brush back on the subject.

pub mod brush;
pub mod config;
pub mod draw;
pub mod engine;
pub mod error;
pub mod field;
pub mod gamma;
pub mod inference;
pub mod io;
pub mod mask;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod types;
pub mod view;
pub mod warp;
pub mod worker;

pub use brush::{BrushSettings, Falloff, MaskWeighting, Stroke, Tool};
pub use engine::{DragState, EngineSettings, LiquifyEngine};
pub use error::{Error, Result};
pub use field::{DisplacementField, Offset};
pub use inference::{InferenceBackend, ModelState, SegmentationProvider};
pub use mask::MaskPipeline;
pub use types::{FrameBuffer, Mask, Rect};
pub use view::ViewMode;
pub use warp::{Recompute, SamplingPolicy};
pub use worker::{MaskJob, MaskWorker};
