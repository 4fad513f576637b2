// Background mask generation. Stamping and compositing stay on the event
// loop; the mask pipeline runs on its own thread and is polled once per frame.
// At most one job is in flight, so an older mask can never land after a newer one.

use crate::error::{Error, Result};
use crate::inference::SegmentationProvider;
use crate::mask::MaskPipeline;
use crate::types::Mask;
use image::RgbaImage;
use log::{debug, warn};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// A finished job, tagged with the image generation it was computed for.
pub struct MaskJob {
    pub generation: u64,
    pub result: Result<Mask>,
}

pub struct MaskWorker {
    provider: Arc<SegmentationProvider>,
    pipeline: MaskPipeline,
    /// Generation of the running job and where its result arrives.
    pending: Option<(u64, Receiver<MaskJob>)>,
}

impl MaskWorker {
    pub fn new(provider: Arc<SegmentationProvider>, pipeline: MaskPipeline) -> Self {
        Self { provider, pipeline, pending: None }
    }

    pub fn provider(&self) -> &Arc<SegmentationProvider> {
        &self.provider
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Start a job for `image`. Rejected while another job runs, and
    /// skipped entirely when the model is not ready.
    pub fn request(&mut self, image: RgbaImage, generation: u64) -> Result<()> {
        if self.pending.is_some() {
            warn!("mask request ignored: a job is already running");
            return Err(Error::MaskBusy);
        }
        if !self.provider.is_ready() {
            return Err(Error::ModelUnavailable(format!(
                "model is {}",
                self.provider.state().label()
            )));
        }

        let (tx, rx) = mpsc::channel();
        let provider = Arc::clone(&self.provider);
        let pipeline = self.pipeline;
        debug!("mask job started for generation {generation}");
        thread::spawn(move || {
            let result = pipeline.run(&provider, &image);
            // receiver gone means the worker was dropped; nothing to deliver
            let _ = tx.send(MaskJob { generation, result });
        });
        self.pending = Some((generation, rx));
        Ok(())
    }

    /// Non-blocking: the finished job, if there is one.
    pub fn poll(&mut self) -> Option<MaskJob> {
        let (generation, rx) = self.pending.as_ref()?;
        match rx.try_recv() {
            Ok(job) => {
                self.pending = None;
                Some(job)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                let job = lost_job(*generation);
                self.pending = None;
                Some(job)
            }
        }
    }

    /// Block until the running job finishes. `None` when idle.
    pub fn wait(&mut self) -> Option<MaskJob> {
        let (generation, rx) = self.pending.take()?;
        Some(rx.recv().unwrap_or_else(|_| lost_job(generation)))
    }
}

// The job thread ended without sending, e.g. the backend panicked.
fn lost_job(generation: u64) -> MaskJob {
    MaskJob {
        generation,
        result: Err(Error::Inference("mask worker exited without a result".into())),
    }
}
