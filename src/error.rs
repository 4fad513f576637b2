// Error type for the liquify engine and its window shell.
// Every variant states *where* things went wrong.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Window init error: {0}")]
    WindowInit(String),

    #[error("Window update error: {0}")]
    WindowUpdate(String),

    #[error("Image load error ({path}): {source}")]
    ImageLoad {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Image save error ({path}): {source}")]
    ImageSave {
        path: String,
        #[source]
        source: image::ImageError,
    },

    /// Two buffers that must share W×H did not.
    #[error("{what}: expected {expected_w}x{expected_h}, got {got_w}x{got_h}")]
    SizeMismatch {
        what: &'static str,
        expected_w: usize,
        expected_h: usize,
        got_w: usize,
        got_h: usize,
    },

    #[error("Segmentation model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    /// A mask request arrived while another one was still running.
    #[error("Mask generation already in progress")]
    MaskBusy,
}

impl Error {
    pub(crate) fn size_mismatch(
        what: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    ) -> Self {
        Error::SizeMismatch {
            what,
            expected_w: expected.0,
            expected_h: expected.1,
            got_w: got.0,
            got_h: got.1,
        }
    }
}
