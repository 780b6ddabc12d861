//! Overlay state machine for the frame filter.
//!
//! This crate ties the frame sampler and the remote processor together:
//! while active it runs one capture → submit → install cycle per tick and
//! owns the single live processed-frame handle.

mod error;
mod handles;
mod metrics;
mod overlay;

pub use error::EngineError;
pub use handles::{HandleRegistry, ProcessedFrameHandle, HANDLE_URI_SCHEME};
pub use metrics::CycleMetrics;
pub use overlay::{OverlayEngine, OverlayView};

use std::sync::Arc;

use crossbeam_channel::Sender;
use tokio::runtime::Handle;

use framefilter_capture::FrameSampler;
use framefilter_ipc::{FilterConfig, OverlayEvent};
use framefilter_transport::RemoteProcessor;

/// Result type for engine construction.
pub type EngineResult<T> = Result<T, EngineError>;

/// Create an engine wired to the HTTP processing service named in `config`.
pub fn create_engine(
    runtime: Handle,
    config: &FilterConfig,
    event_tx: Sender<OverlayEvent>,
) -> EngineResult<OverlayEngine> {
    OverlayEngine::from_config(runtime, config, event_tx)
}

/// Create an engine around a caller-supplied sampler and processor.
pub fn create_engine_with(
    runtime: Handle,
    config: &FilterConfig,
    sampler: FrameSampler,
    processor: Arc<dyn RemoteProcessor>,
    event_tx: Sender<OverlayEvent>,
) -> OverlayEngine {
    OverlayEngine::new(runtime, config, sampler, processor, event_tx)
}
