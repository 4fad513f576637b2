// ONNX Runtime backend (feature `onnx`). The runtime dylib is loaded at run
// time, so point ORT_DYLIB_PATH at libonnxruntime before loading a model.

use crate::error::{Error, Result};
use crate::inference::{InferenceBackend, SegmentationProvider};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Single-input salient-object model (u2netp and friends). Only the first
/// output plane is used.
pub struct OnnxBackend {
    session: Mutex<Session>,
    input_size: (usize, usize),
}

impl OnnxBackend {
    pub fn load(path: &Path, input_size: (usize, usize)) -> Result<Self> {
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| Error::ModelUnavailable(format!("{}: {e}", path.display())))?;
        Ok(Self { session: Mutex::new(session), input_size })
    }
}

impl InferenceBackend for OnnxBackend {
    fn input_size(&self) -> (usize, usize) {
        self.input_size
    }

    fn infer(&self, tensor: &[f32]) -> Result<Vec<f32>> {
        let (w, h) = self.input_size;
        let input = Tensor::from_array(([1usize, 3, h, w], tensor.to_vec()))
            .map_err(|e| Error::Inference(format!("input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::Inference("session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| Error::Inference(e.to_string()))?;

        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Inference(format!("output tensor: {e}")))?;
        if data.len() < w * h {
            return Err(Error::Inference(format!(
                "output has {} values, expected at least {}",
                data.len(),
                w * h
            )));
        }
        Ok(data[..w * h].to_vec())
    }
}

impl SegmentationProvider {
    /// Provider backed by an ONNX model file at the default input size.
    pub fn onnx(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        let size = crate::inference::MODEL_INPUT_SIZE;
        Self::new(name, move || {
            Ok(Arc::new(OnnxBackend::load(&path, (size, size))?) as Arc<dyn InferenceBackend>)
        })
    }
}
