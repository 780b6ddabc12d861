//! Error types for the encoder module.

use thiserror::Error;

/// Errors that can occur during encoding operations.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// Quality outside the accepted range.
    #[error("Invalid quality {0}: expected 1 - 100")]
    InvalidQuality(u8),

    /// Zero-sized frame.
    #[error("Cannot encode an empty {width}x{height} frame")]
    EmptyFrame { width: u32, height: u32 },

    /// Invalid input data.
    #[error("Invalid input data: {0}")]
    InvalidInput(String),

    /// General encoding error.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Encoder produced no data.
    #[error("Encoder produced no output")]
    NoOutput,
}

impl From<image::ImageError> for EncoderError {
    fn from(err: image::ImageError) -> Self {
        Self::Encoding(err.to_string())
    }
}
