//! Frame sampling from a playing video source.
//!
//! A [`VideoSource`] is owned by the embedding application; this crate only
//! reads its dimensions and asks it to draw its current frame into a reusable
//! [`DrawSurface`]. [`FrameSampler`] turns that surface into an encoded
//! [`CapturedFrame`] or reports that the source is not ready.

mod error;
mod frame;
mod pattern;
mod sampler;
mod surface;

pub use error::CaptureError;
pub use frame::{CaptureTimestamp, CapturedFrame, FRAME_FILE_NAME};
pub use pattern::PatternSource;
pub use sampler::{FrameSampler, NotReadyReason, Sample};
pub use surface::DrawSurface;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Stable identity of a video source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    /// Allocate a process-unique identifier.
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap an identifier chosen by the embedding application.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Raw identifier value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source:{}", self.0)
    }
}

/// A playing video the sampler can read frames from.
pub trait VideoSource: Send + Sync {
    /// Identity of the underlying media element.
    fn id(&self) -> SourceId;

    /// Decoded frame dimensions; `(0, 0)` until metadata is available.
    fn natural_size(&self) -> (u32, u32);

    /// Draw the currently displayed frame scaled to fill `surface`.
    ///
    /// Must read a single frame; the surface size may differ from the
    /// frame if the resolution changed since `natural_size` was read.
    fn draw(&self, surface: &mut DrawSurface) -> CaptureResult<()>;
}
