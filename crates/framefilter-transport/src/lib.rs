//! HTTP client for the remote frame processing service.
//!
//! Each captured frame is uploaded as a single multipart request; the
//! response body is the processed image. There is no batching, pipelining
//! or retrying: one request, one response, per frame.

mod error;
mod http;
mod multipart;

pub use error::TransportError;
pub use http::HttpProcessorClient;
pub use multipart::{generate_boundary, MultipartBody};

use bytes::Bytes;

use framefilter_capture::CapturedFrame;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Path of the processing endpoint, relative to the service base URL.
pub const DETECT_PATH: &str = "detect";

/// Path of the liveness probe.
pub const HEALTH_PATH: &str = "hello-world";

/// Multipart field carrying the frame.
pub const FRAME_FIELD: &str = "frame";

/// Default cap on processed image size.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// A processed image returned by the service.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Image bytes.
    pub data: Bytes,

    /// MIME type reported by the service.
    pub content_type: String,
}

/// Anything that can turn a captured frame into a processed image.
pub trait RemoteProcessor: Send + Sync {
    /// Submit one frame and wait for the processed result.
    fn submit(&self, frame: &CapturedFrame) -> TransportResult<ProcessedImage>;

    /// Name for diagnostics.
    fn name(&self) -> &str;
}
