//! Common types used across surface/engine messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the capture and processing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Base URL of the processing service (e.g., "http://localhost:8080").
    pub endpoint: String,

    /// Period between capture cycles in milliseconds (default: 100).
    pub capture_interval_ms: u64,

    /// JPEG quality, 1 - 100 (default: 80).
    pub jpeg_quality: u8,

    /// Per-request timeout in milliseconds (default: 10000).
    pub request_timeout_ms: u64,

    /// Largest processed image accepted from the service.
    pub max_response_bytes: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            capture_interval_ms: 100,
            jpeg_quality: 80,
            request_timeout_ms: 10_000,
            max_response_bytes: 16 * 1024 * 1024,
        }
    }
}

impl FilterConfig {
    /// Cycle period as a duration.
    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Check the configuration for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if self.capture_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::QualityOutOfRange(self.jpeg_quality));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("processing endpoint is empty")]
    MissingEndpoint,

    #[error("capture interval must be non-zero")]
    ZeroInterval,

    #[error("JPEG quality {0} is outside 1..=100")]
    QualityOutOfRange(u8),

    #[error("request timeout must be non-zero")]
    ZeroTimeout,
}

/// Descriptor of a displayed overlay, safe to hand across threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayRef {
    /// Registry identifier of the handle.
    pub id: u64,

    /// Transient URI the image is reachable under while live.
    pub uri: String,

    /// MIME type reported by the processing service.
    pub content_type: String,

    /// Size of the processed image in bytes.
    pub byte_len: usize,
}

/// Cycle statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleStats {
    /// Ticks that ran a cycle.
    pub cycles: u64,

    /// Frames sent to the processing service.
    pub frames_submitted: u64,

    /// Cycles skipped because the source had no frame.
    pub not_ready_skips: u64,

    /// Cycles skipped because encoding failed.
    pub encode_skips: u64,

    /// Submissions that failed.
    pub transport_failures: u64,

    /// Overlays installed.
    pub overlays_installed: u64,

    /// Results discarded because processing stopped meanwhile.
    pub stale_discards: u64,

    /// Round-trip time of the last successful submission in milliseconds.
    pub last_round_trip_ms: u64,

    /// Seconds since processing was started.
    pub uptime_seconds: u64,
}
