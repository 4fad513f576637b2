//! Segmentation inference behind an injectable provider.
//!
//! The warp engine never talks to a model runtime directly. It holds a
//! [`SegmentationProvider`], which owns a loader for some
//! [`InferenceBackend`] and tracks its lifecycle
//! (`Unloaded → Loading → Ready | Failed`). Anything that can turn a
//! normalised planar tensor into a score grid can be plugged in.

use crate::error::{Error, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Default model input edge (u2netp takes 320×320).
pub const MODEL_INPUT_SIZE: usize = 320;

/// A model that maps a `3×H×W` planar tensor to an `H×W` score grid.
pub trait InferenceBackend: Send + Sync {
    /// (width, height) the backend expects its input at.
    fn input_size(&self) -> (usize, usize);

    /// Raw, unnormalised scores, row-major, `width·height` long.
    fn infer(&self, tensor: &[f32]) -> Result<Vec<f32>>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
    Failed(String),
}

impl ModelState {
    pub fn label(&self) -> &'static str {
        match self {
            ModelState::Unloaded => "NO MODEL",
            ModelState::Loading => "LOADING",
            ModelState::Ready => "READY",
            ModelState::Failed(_) => "FAILED",
        }
    }
}

type Loader = Box<dyn Fn() -> Result<Arc<dyn InferenceBackend>> + Send + Sync>;

struct Inner {
    state: ModelState,
    backend: Option<Arc<dyn InferenceBackend>>,
}

pub struct SegmentationProvider {
    name: String,
    loader: Option<Loader>,
    inner: Mutex<Inner>,
}

impl SegmentationProvider {
    /// Provider that loads its backend lazily through `loader`.
    pub fn new<F>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn InferenceBackend>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            loader: Some(Box::new(loader)),
            inner: Mutex::new(Inner { state: ModelState::Unloaded, backend: None }),
        }
    }

    /// Provider with no model configured; every load fails.
    pub fn none() -> Self {
        Self {
            name: "none".into(),
            loader: None,
            inner: Mutex::new(Inner { state: ModelState::Unloaded, backend: None }),
        }
    }

    /// Provider that is ready immediately with an already-built backend.
    pub fn ready(name: impl Into<String>, backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            name: name.into(),
            loader: None,
            inner: Mutex::new(Inner { state: ModelState::Ready, backend: Some(backend) }),
        }
    }

    /// Score maps precomputed into a grayscale image file.
    pub fn score_map(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self::new(name, move || {
            Ok(Arc::new(ScoreMapBackend::open(&path)?) as Arc<dyn InferenceBackend>)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // A panic while holding the lock cannot leave Inner half-written.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> ModelState {
        self.lock().state.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.lock().state == ModelState::Ready
    }

    /// Build the backend. Ready stays ready; Loading returns the current
    /// state without starting a second load.
    pub fn load(&self) -> ModelState {
        {
            let mut inner = self.lock();
            match inner.state {
                ModelState::Ready | ModelState::Loading => return inner.state.clone(),
                _ => inner.state = ModelState::Loading,
            }
        }
        info!("model {}: loading", self.name);

        let result = match &self.loader {
            Some(load) => load(),
            None => Err(Error::ModelUnavailable("no model configured".into())),
        };

        let mut inner = self.lock();
        match result {
            Ok(backend) => {
                info!("model {}: ready", self.name);
                inner.backend = Some(backend);
                inner.state = ModelState::Ready;
            }
            Err(e) => {
                warn!("model {}: {e}; editing continues without a mask", self.name);
                inner.backend = None;
                inner.state = ModelState::Failed(e.to_string());
            }
        }
        inner.state.clone()
    }

    fn backend(&self) -> Result<Arc<dyn InferenceBackend>> {
        let inner = self.lock();
        match (&inner.state, &inner.backend) {
            (ModelState::Ready, Some(b)) => Ok(Arc::clone(b)),
            (ModelState::Failed(reason), _) => Err(Error::ModelUnavailable(reason.clone())),
            (state, _) => Err(Error::ModelUnavailable(format!("model is {}", state.label()))),
        }
    }

    pub fn input_size(&self) -> Result<(usize, usize)> {
        Ok(self.backend()?.input_size())
    }

    /// Run the backend without holding the lock, so state queries stay cheap.
    pub fn infer(&self, tensor: &[f32]) -> Result<Vec<f32>> {
        self.backend()?.infer(tensor)
    }
}

/// Backend that replays a score grid stored as a grayscale image.
pub struct ScoreMapBackend {
    width: usize,
    height: usize,
    scores: Vec<f32>,
}

impl ScoreMapBackend {
    pub fn new(width: usize, height: usize, scores: Vec<f32>) -> Result<Self> {
        if scores.len() != width * height {
            return Err(Error::size_mismatch("score map", (width, height), (scores.len(), 1)));
        }
        Ok(Self { width, height, scores })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let img = image::open(path).map_err(|e| {
            Error::ModelUnavailable(format!("cannot read score map {}: {e}", path.display()))
        })?;
        let gray = img.to_luma8();
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let scores = gray.pixels().map(|p| p[0] as f32 / 255.0).collect();
        Self::new(w, h, scores)
    }
}

impl InferenceBackend for ScoreMapBackend {
    fn input_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn infer(&self, tensor: &[f32]) -> Result<Vec<f32>> {
        let expected = 3 * self.width * self.height;
        if tensor.len() != expected {
            return Err(Error::Inference(format!(
                "tensor has {} values, expected {expected}",
                tensor.len()
            )));
        }
        Ok(self.scores.clone())
    }
}
