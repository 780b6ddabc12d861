//! JPEG still-image encoder.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::ExtendedColorType;
use tracing::{instrument, trace};

use crate::error::EncoderError;
use crate::{rgb_buffer_size, EncodedImage, EncoderResult, FrameEncoder};

/// MIME type of JPEG output.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Lossy JPEG encoder at a fixed quality.
pub struct JpegEncoder {
    quality: u8,
    /// Output buffer reused across frames.
    scratch: Vec<u8>,
    frame_count: u64,
}

impl JpegEncoder {
    /// Create a new JPEG encoder.
    pub fn new(quality: u8) -> EncoderResult<Self> {
        if !(1..=100).contains(&quality) {
            return Err(EncoderError::InvalidQuality(quality));
        }

        Ok(Self {
            quality,
            scratch: Vec::new(),
            frame_count: 0,
        })
    }

    /// Configured quality.
    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl FrameEncoder for JpegEncoder {
    #[instrument(name = "jpeg_encode", skip(self, pixels))]
    fn encode(&mut self, pixels: &[u8], width: u32, height: u32) -> EncoderResult<EncodedImage> {
        if width == 0 || height == 0 {
            return Err(EncoderError::EmptyFrame { width, height });
        }

        let expected_size = rgb_buffer_size(width, height);
        if pixels.len() != expected_size {
            return Err(EncoderError::InvalidInput(format!(
                "expected {} bytes for {}x{} RGB, got {}",
                expected_size,
                width,
                height,
                pixels.len()
            )));
        }

        self.scratch.clear();
        let mut encoder = ImageJpegEncoder::new_with_quality(&mut self.scratch, self.quality);
        encoder.encode(pixels, width, height, ExtendedColorType::Rgb8)?;

        if self.scratch.is_empty() {
            return Err(EncoderError::NoOutput);
        }

        self.frame_count += 1;
        trace!(
            frame = self.frame_count,
            size = self.scratch.len(),
            "Encoded JPEG frame"
        );

        Ok(EncodedImage {
            data: Bytes::copy_from_slice(&self.scratch),
            content_type: JPEG_CONTENT_TYPE,
        })
    }

    fn name(&self) -> &'static str {
        "jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        let mut pixels = Vec::with_capacity(rgb_buffer_size(width, height));
        for y in 0..height {
            for x in 0..width {
                pixels.push((x * 255 / width) as u8);
                pixels.push((y * 255 / height) as u8);
                pixels.push(128);
            }
        }
        pixels
    }

    #[test]
    fn test_rejects_invalid_quality() {
        assert!(matches!(
            JpegEncoder::new(0),
            Err(EncoderError::InvalidQuality(0))
        ));
        assert!(matches!(
            JpegEncoder::new(101),
            Err(EncoderError::InvalidQuality(101))
        ));
    }

    #[test]
    fn test_encodes_decodable_jpeg() {
        let mut encoder = JpegEncoder::new(80).unwrap();
        let image = encoder.encode(&gradient(64, 48), 64, 48).unwrap();

        assert_eq!(image.content_type, "image/jpeg");
        // SOI marker
        assert_eq!(&image.data[..2], &[0xFF, 0xD8]);

        let decoded =
            image::load_from_memory_with_format(&image.data, image::ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_rejects_mismatched_buffer() {
        let mut encoder = JpegEncoder::new(80).unwrap();
        let result = encoder.encode(&[0u8; 10], 64, 48);
        assert!(matches!(result, Err(EncoderError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_empty_frame() {
        let mut encoder = JpegEncoder::new(80).unwrap();
        let result = encoder.encode(&[], 0, 48);
        assert!(matches!(
            result,
            Err(EncoderError::EmptyFrame {
                width: 0,
                height: 48
            })
        ));
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let pixels = gradient(128, 96);
        let high = JpegEncoder::new(95)
            .unwrap()
            .encode(&pixels, 128, 96)
            .unwrap();
        let low = JpegEncoder::new(10)
            .unwrap()
            .encode(&pixels, 128, 96)
            .unwrap();
        assert!(low.data.len() < high.data.len());
    }
}
