//! Reusable RGB drawing surface.

use image::imageops::{resize, FilterType};
use image::{ImageBuffer, Rgb};

use framefilter_encoder::rgb_buffer_size;

use crate::error::CaptureError;
use crate::CaptureResult;

/// Packed RGB8 pixel buffer that sources draw into.
#[derive(Debug, Default)]
pub struct DrawSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl DrawSurface {
    /// Create an empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize to the given dimensions. Returns true if the size changed.
    ///
    /// Existing pixel contents are undefined after a resize.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }

        self.width = width;
        self.height = height;
        self.pixels.resize(rgb_buffer_size(width, height), 0);
        true
    }

    /// Current dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns true if the surface has no pixels.
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Packed RGB8 pixels.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Draw an RGB8 image scaled (nearest neighbour) to cover the surface.
    pub fn draw_scaled(&mut self, src: &[u8], src_width: u32, src_height: u32) -> CaptureResult<()> {
        let expected = rgb_buffer_size(src_width, src_height);
        if src.len() != expected {
            return Err(CaptureError::BufferMismatch {
                expected,
                actual: src.len(),
            });
        }
        if src_width == 0 || src_height == 0 {
            return Err(CaptureError::FrameConversion(
                "cannot draw a zero-sized image".to_string(),
            ));
        }
        if self.is_empty() {
            return Err(CaptureError::FrameConversion(
                "surface has no pixels".to_string(),
            ));
        }

        if (src_width, src_height) == (self.width, self.height) {
            self.pixels.copy_from_slice(src);
            return Ok(());
        }

        let frame = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(src_width, src_height, src)
            .ok_or_else(|| CaptureError::FrameConversion("frame buffer too small".to_string()))?;
        let scaled = resize(&frame, self.width, self.height, FilterType::Nearest);
        self.pixels.copy_from_slice(scaled.as_raw());

        Ok(())
    }
}
