//! Synthetic test-pattern video source.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use framefilter_encoder::rgb_buffer_size;

use crate::error::CaptureError;
use crate::surface::DrawSurface;
use crate::{CaptureResult, SourceId, VideoSource};

struct PatternState {
    width: u32,
    height: u32,
    /// Native-resolution frame, regenerated on every draw.
    frame: Vec<u8>,
}

/// A video source that renders moving colour bars.
///
/// Used by the demo binary and tests in place of a real media element.
pub struct PatternSource {
    id: SourceId,
    state: Mutex<PatternState>,
    frames_drawn: AtomicU64,
}

impl PatternSource {
    /// Create a source with the given native resolution.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: SourceId::next(),
            state: Mutex::new(PatternState {
                width,
                height,
                frame: Vec::new(),
            }),
            frames_drawn: AtomicU64::new(0),
        }
    }

    /// Create a source whose metadata has not loaded yet.
    pub fn unloaded() -> Self {
        Self::new(0, 0)
    }

    /// Change the reported resolution, as when metadata loads or the stream
    /// switches quality.
    pub fn set_dimensions(&self, width: u32, height: u32) {
        let mut state = self.state.lock();
        state.width = width;
        state.height = height;
    }

    /// Number of frames drawn so far.
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn.load(Ordering::Relaxed)
    }
}

impl VideoSource for PatternSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn natural_size(&self) -> (u32, u32) {
        let state = self.state.lock();
        (state.width, state.height)
    }

    fn draw(&self, surface: &mut DrawSurface) -> CaptureResult<()> {
        let tick = self.frames_drawn.fetch_add(1, Ordering::Relaxed);

        // Hold the lock for the whole draw so a concurrent resolution change
        // cannot mix two frame sizes.
        let mut state = self.state.lock();
        let (width, height) = (state.width, state.height);
        if width == 0 || height == 0 {
            return Err(CaptureError::SourceUnavailable("no decoded frame".into()));
        }

        let PatternState { frame, .. } = &mut *state;
        render_bars(frame, width, height, tick);
        surface.draw_scaled(frame, width, height)
    }
}

const BARS: [[u8; 3]; 7] = [
    [192, 192, 192],
    [192, 192, 0],
    [0, 192, 192],
    [0, 192, 0],
    [192, 0, 192],
    [192, 0, 0],
    [0, 0, 192],
];

fn render_bars(frame: &mut Vec<u8>, width: u32, height: u32, tick: u64) {
    frame.resize(rgb_buffer_size(width, height), 0);

    let w = width as usize;
    let shift = (tick as usize * 4) % w;
    for (i, px) in frame.chunks_exact_mut(3).enumerate() {
        let x = (i % w + shift) % w;
        px.copy_from_slice(&BARS[x * BARS.len() / w]);
    }
}
