//! Still-image encoding of sampled frames.
//!
//! Frames are drawn as packed RGB8 pixels and compressed to JPEG before
//! they are shipped to the processing service.

mod error;
mod jpeg;

pub use error::EncoderError;
pub use jpeg::JpegEncoder;

use bytes::Bytes;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Default JPEG quality (0.8 on a 0 - 1 scale).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Bytes per pixel of the RGB8 layout encoders accept.
pub const RGB_BYTES_PER_PIXEL: usize = 3;

/// Still-image encoding configuration.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Quality, 1 - 100.
    pub quality: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// An encoded still image.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Compressed image data.
    pub data: Bytes,

    /// MIME type of `data`.
    pub content_type: &'static str,
}

/// Trait for still-image encoders.
pub trait FrameEncoder: Send {
    /// Encode packed RGB8 pixels of the given dimensions.
    fn encode(&mut self, pixels: &[u8], width: u32, height: u32) -> EncoderResult<EncodedImage>;

    /// Get encoder name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Create the JPEG encoder used for frame submission.
pub fn create_frame_encoder(config: EncoderConfig) -> EncoderResult<Box<dyn FrameEncoder>> {
    let encoder = JpegEncoder::new(config.quality)?;
    tracing::debug!(quality = config.quality, "Using JPEG frame encoder");
    Ok(Box::new(encoder))
}

/// Expected RGB8 buffer size for given dimensions.
pub fn rgb_buffer_size(width: u32, height: u32) -> usize {
    width as usize * height as usize * RGB_BYTES_PER_PIXEL
}
