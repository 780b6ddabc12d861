//! Error types for the engine module.

use thiserror::Error;

use framefilter_capture::CaptureError;
use framefilter_ipc::ConfigError;
use framefilter_transport::TransportError;

/// Errors that can occur while building an engine.
///
/// Per-cycle failures never surface as errors; they only skip the cycle.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Sampler could not be created.
    #[error("Capture setup failed: {0}")]
    Capture(#[from] CaptureError),

    /// Processing client could not be created.
    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),
}
