//! Frame sampling: draw the current video frame and encode it.

use std::time::Instant;

use tracing::{debug, trace};

use framefilter_encoder::{create_frame_encoder, EncoderConfig, FrameEncoder};

use crate::frame::{CaptureTimestamp, CapturedFrame};
use crate::surface::DrawSurface;
use crate::{CaptureResult, VideoSource};

/// Why a sample produced no frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    /// The source has not decoded any frame dimensions yet.
    ZeroDimensions,

    /// The source failed to draw its current frame.
    DrawFailed,

    /// The drawn frame could not be compressed.
    EncodeFailed,
}

/// Outcome of one sampling attempt.
#[derive(Debug)]
pub enum Sample {
    /// An encoded frame ready for submission.
    Ready(CapturedFrame),

    /// Nothing to submit this cycle.
    NotReady(NotReadyReason),
}

impl Sample {
    /// Returns the frame, if one was captured.
    pub fn into_frame(self) -> Option<CapturedFrame> {
        match self {
            Self::Ready(frame) => Some(frame),
            Self::NotReady(_) => None,
        }
    }
}

/// Samples frames from a video source into encoded still images.
///
/// The only state kept between calls is the drawing surface, which is
/// reused and resized when the source resolution changes.
pub struct FrameSampler {
    surface: DrawSurface,
    encoder: Box<dyn FrameEncoder>,
    start_time: Instant,
    sequence: u64,
    resizes: u64,
}

impl FrameSampler {
    /// Create a sampler around an encoder.
    pub fn new(encoder: Box<dyn FrameEncoder>) -> Self {
        Self {
            surface: DrawSurface::new(),
            encoder,
            start_time: Instant::now(),
            sequence: 0,
            resizes: 0,
        }
    }

    /// Create a sampler with the default JPEG encoder at the given quality.
    pub fn with_quality(quality: u8) -> CaptureResult<Self> {
        let encoder = create_frame_encoder(EncoderConfig { quality })?;
        Ok(Self::new(encoder))
    }

    /// Capture and encode the source's current frame.
    pub fn sample(&mut self, source: &dyn VideoSource) -> Sample {
        let (width, height) = source.natural_size();
        if width == 0 || height == 0 {
            trace!(source = %source.id(), "Video has no dimensions yet");
            return Sample::NotReady(NotReadyReason::ZeroDimensions);
        }

        if self.surface.resize(width, height) {
            self.resizes += 1;
            debug!(width, height, "Resized capture surface");
        }

        if let Err(e) = source.draw(&mut self.surface) {
            debug!(source = %source.id(), "Draw failed: {}", e);
            return Sample::NotReady(NotReadyReason::DrawFailed);
        }

        let image = match self.encoder.encode(self.surface.pixels(), width, height) {
            Ok(image) if !image.data.is_empty() => image,
            Ok(_) => {
                debug!("Encoder returned an empty image");
                return Sample::NotReady(NotReadyReason::EncodeFailed);
            }
            Err(e) => {
                debug!(encoder = self.encoder.name(), "Encode failed: {}", e);
                return Sample::NotReady(NotReadyReason::EncodeFailed);
            }
        };

        self.sequence += 1;
        trace!(
            sequence = self.sequence,
            width,
            height,
            size = image.data.len(),
            "Captured frame"
        );

        Sample::Ready(CapturedFrame {
            data: image.data,
            content_type: image.content_type,
            width,
            height,
            timestamp: CaptureTimestamp::now(self.start_time),
            sequence: self.sequence,
        })
    }

    /// Current drawing surface dimensions.
    pub fn surface_dimensions(&self) -> (u32, u32) {
        self.surface.dimensions()
    }

    /// How many times the surface was resized.
    pub fn resize_count(&self) -> u64 {
        self.resizes
    }

    /// Frames captured so far.
    pub fn frames_captured(&self) -> u64 {
        self.sequence
    }
}
