use std::path::PathBuf;

use thiserror::Error;

use crate::capture::CaptureStage;

/// Errors raised by the rendering backends and the capture pipeline.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// A handle table is full or the device refused an allocation.
    #[error("{kind} handles exhausted (limit {limit})")]
    ResourceExhausted { kind: &'static str, limit: usize },

    #[error("invalid {0} handle")]
    InvalidHandle(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing asset {}: {source}", path.display())]
    MissingAsset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid shader `{name}`: {reason}")]
    InvalidShader { name: String, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// PNG output supports grey, RGB and RGBA only.
    #[error("unsupported channel count {0} (expected 1, 3 or 4)")]
    UnsupportedChannels(u8),

    #[error("pixel buffer is empty")]
    EmptyBuffer,

    /// Read-back data consumed before the frame that produces it completed.
    #[error("read-back not ready: needs frame {ready_frame}, completed {completed_frame}")]
    StaleData { ready_frame: u64, completed_frame: u64 },

    #[error("capture operation out of order: expected {expected:?}, capture is {found:?}")]
    OutOfOrder {
        expected: CaptureStage,
        found: CaptureStage,
    },

    #[error("device error: {0}")]
    Device(String),
}

impl CaptureError {
    /// Save failures the host loop may log and skip.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CaptureError::FileIo { .. } | CaptureError::Encode { .. })
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
