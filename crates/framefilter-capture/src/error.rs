//! Error types for the capture module.

use thiserror::Error;

use framefilter_encoder::EncoderError;

/// Errors that can occur during capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The source cannot provide pixels right now.
    #[error("Video source unavailable: {0}")]
    SourceUnavailable(String),

    /// Source pixels do not match the stated dimensions.
    #[error("Frame buffer mismatch: expected {expected} bytes, got {actual}")]
    BufferMismatch { expected: usize, actual: usize },

    /// Frame conversion error.
    #[error("Frame conversion error: {0}")]
    FrameConversion(String),

    /// Still-image encoding failed.
    #[error("Frame encoding failed: {0}")]
    Encode(#[from] EncoderError),
}
