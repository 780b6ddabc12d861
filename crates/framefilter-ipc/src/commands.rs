//! Commands sent from the surface to the engine.

use serde::{Deserialize, Serialize};

/// Commands that the presentation surface can send to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayCommand {
    /// Begin periodic capture and processing.
    Start,

    /// Stop processing and drop the overlay.
    Stop,

    /// Start when idle, stop when active.
    Toggle,

    /// Request current processing state.
    GetState,

    /// Request a snapshot of cycle statistics.
    GetStats,

    /// Shutdown the engine completely.
    Shutdown,
}
