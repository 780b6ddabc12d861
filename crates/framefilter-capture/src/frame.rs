//! Captured frame types.

use bytes::Bytes;
use std::time::Instant;

/// File name frames are uploaded under.
pub const FRAME_FILE_NAME: &str = "frame.jpg";

/// Timestamp for a captured frame.
#[derive(Debug, Clone, Copy)]
pub struct CaptureTimestamp {
    /// Monotonic timestamp when the frame was captured.
    pub capture_time: Instant,

    /// Milliseconds since the sampler was created.
    pub elapsed_ms: u64,
}

impl CaptureTimestamp {
    /// Create a new capture timestamp.
    pub fn now(start_time: Instant) -> Self {
        let capture_time = Instant::now();
        let elapsed = capture_time.duration_since(start_time);

        Self {
            capture_time,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// An encoded frame awaiting submission.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Compressed still image.
    pub data: Bytes,

    /// MIME type of `data`.
    pub content_type: &'static str,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Capture timestamp.
    pub timestamp: CaptureTimestamp,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

impl CapturedFrame {
    /// Size of the encoded image in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if no image data was produced.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
