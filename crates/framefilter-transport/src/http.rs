//! Blocking HTTP client for the processing service.

use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, instrument, warn};
use url::Url;

use framefilter_capture::{CapturedFrame, FRAME_FILE_NAME};

use crate::error::TransportError;
use crate::multipart::MultipartBody;
use crate::{
    ProcessedImage, RemoteProcessor, TransportResult, DEFAULT_MAX_RESPONSE_BYTES, DETECT_PATH,
    FRAME_FIELD, HEALTH_PATH,
};

/// Client for `POST <endpoint>/detect`.
pub struct HttpProcessorClient {
    detect_url: Url,
    health_url: Url,
    agent: ureq::Agent,
    max_response_bytes: usize,
    requests_sent: AtomicU64,
    requests_failed: AtomicU64,
    bytes_sent: AtomicU64,
}

impl HttpProcessorClient {
    /// Create a client for the service at `endpoint`.
    pub fn new(endpoint: &str, timeout: Duration) -> TransportResult<Self> {
        let mut base = Url::parse(endpoint)
            .map_err(|e| TransportError::InvalidUrl(format!("{endpoint}: {e}")))?;

        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(TransportError::InvalidUrl(
                "URL must start with http:// or https://".to_string(),
            ));
        }

        // Treat the base as a directory so joins append instead of replacing
        // the last path segment.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let detect_url = base
            .join(DETECT_PATH)
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let health_url = base
            .join(HEALTH_PATH)
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        let agent = ureq::AgentBuilder::new().timeout(timeout).build();

        Ok(Self {
            detect_url,
            health_url,
            agent,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            requests_sent: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
        })
    }

    /// Cap the size of accepted processed images.
    pub fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }

    /// Full URL frames are posted to.
    pub fn detect_url(&self) -> &Url {
        &self.detect_url
    }

    /// Probe the service's liveness endpoint.
    #[instrument(name = "http_health_check", skip(self))]
    pub fn health_check(&self) -> TransportResult<()> {
        let response = self.agent.get(self.health_url.as_str()).call()?;
        debug!(status = response.status(), "Processing service reachable");
        Ok(())
    }

    /// Get transport statistics.
    pub fn statistics(&self) -> TransportStatistics {
        TransportStatistics {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }

    fn post_frame(&self, frame: &CapturedFrame) -> TransportResult<ProcessedImage> {
        let mut body = MultipartBody::new();
        body.add_file(FRAME_FIELD, FRAME_FILE_NAME, frame.content_type, &frame.data);
        let content_type = body.content_type();
        let body = body.finish();

        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent
            .fetch_add(body.len() as u64, Ordering::Relaxed);

        let response = self
            .agent
            .post(self.detect_url.as_str())
            .set("Content-Type", &content_type)
            .send_bytes(&body)?;

        let content_type = response.content_type().to_string();
        let mut data = Vec::new();
        response
            .into_reader()
            .take(self.max_response_bytes as u64 + 1)
            .read_to_end(&mut data)?;

        if data.len() > self.max_response_bytes {
            return Err(TransportError::ResponseTooLarge(self.max_response_bytes));
        }
        if data.is_empty() {
            return Err(TransportError::EmptyResponse);
        }

        Ok(ProcessedImage {
            data: Bytes::from(data),
            content_type,
        })
    }
}

impl RemoteProcessor for HttpProcessorClient {
    #[instrument(name = "http_submit", skip_all, fields(sequence = frame.sequence))]
    fn submit(&self, frame: &CapturedFrame) -> TransportResult<ProcessedImage> {
        debug!(size = frame.len(), "Sending frame to processing service");
        let started = Instant::now();

        match self.post_frame(frame) {
            Ok(image) => {
                debug!(
                    size = image.data.len(),
                    content_type = %image.content_type,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Received processed frame"
                );
                Ok(image)
            }
            Err(e) => {
                self.requests_failed.fetch_add(1, Ordering::Relaxed);
                warn!(url = %self.detect_url, "Failed to process frame: {}", e);
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Transport statistics.
#[derive(Debug, Clone, Default)]
pub struct TransportStatistics {
    pub requests_sent: u64,
    pub requests_failed: u64,
    pub bytes_sent: u64,
}
