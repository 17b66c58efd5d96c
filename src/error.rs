use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LensError {
    /// The tokenized input has no mask token; raised before any ranking or rendering.
    #[error("Input must include mask token {placeholder}.")]
    MissingMask { placeholder: String },

    #[error("malformed attention tensor: {reason}")]
    MalformedAttention { reason: String },

    #[error("malformed inference record: {reason}")]
    Record { reason: String },

    #[error("tensor readback failed: {reason}")]
    Tensor { reason: String },

    #[error("failed to rasterize label {text:?}: {reason}")]
    Font { text: String, reason: String },

    #[error("failed to load font {}: {reason}", path.display())]
    FontLoad { path: PathBuf, reason: String },

    #[error("failed to write diagram {}", path.display())]
    RenderIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LensError {
    pub fn render_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::RenderIo {
            path: path.into(),
            source,
        }
    }

    pub fn is_missing_mask(&self) -> bool {
        matches!(self, Self::MissingMask { .. })
    }
}

pub type Result<T, E = LensError> = std::result::Result<T, E>;
