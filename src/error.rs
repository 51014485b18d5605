//! Error types for the pixel pipeline.
//!
//! Every fallible entry point logs before returning one of these, so callers
//! that drop the `Result` still see the failure in the log and get a no-op.

use std::path::PathBuf;

use thiserror::Error;

use crate::framebuffer::AttachmentKind;
use crate::texture::TextureFormat;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("alignment must be a non-zero power of two, got {0}")]
    InvalidAlignment(usize),
    #[error("cannot allocate {0} elements")]
    InvalidAllocation(usize),
    #[error("image size mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    SizeMismatch {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },
    #[error("expected {expected} layer buffers, got {got}")]
    LayerCountMismatch { expected: usize, got: usize },
    #[error("image data cannot be uploaded to a multi-sample texture")]
    MultiSampleUpload,
    #[error("multi-sample textures cannot be exported as images")]
    MultiSampleExport,
    #[error("unsupported sample count: {0}")]
    UnsupportedSampleCount(usize),
    #[error("layer {layer} level {level} is not allocated")]
    MissingLevel { layer: usize, level: usize },
    #[error("{kind:?} attachment cannot bind a {format:?} texture")]
    AttachmentMismatch {
        kind: AttachmentKind,
        format: TextureFormat,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("short read from {path}: expected {expected} bytes")]
    ShortRead { path: PathBuf, expected: usize },
    #[error("texture data reloaded from {path} differs from what was stored")]
    RoundTripMismatch { path: PathBuf },
    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
