//! Events sent from the engine to the surface.

use serde::{Deserialize, Serialize};

use crate::state::{ProcessingState, SkipReason};
use crate::types::{CycleStats, OverlayRef};

/// Events that the engine can send to the surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OverlayEvent {
    /// Processing state has changed.
    StateChanged {
        /// Previous state.
        previous: ProcessingState,

        /// Current state.
        current: ProcessingState,
    },

    /// Current processing state, in reply to a state query.
    State(ProcessingState),

    /// A video source was wired to the engine.
    SourceAttached {
        /// Identity of the attached source.
        source_id: u64,
    },

    /// A new processed frame replaced the displayed overlay.
    OverlayInstalled(OverlayRef),

    /// The overlay was removed; the unmodified video is shown.
    OverlayCleared,

    /// A cycle finished without changing the overlay.
    CycleSkipped(SkipReason),

    /// Cycle statistics snapshot.
    Stats(CycleStats),

    /// Engine is ready.
    Ready,

    /// Engine has shut down.
    Shutdown,
}
