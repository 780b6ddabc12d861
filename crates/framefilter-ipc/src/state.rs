//! Overlay state machine types.

use serde::{Deserialize, Serialize};

/// Whether the engine is periodically processing frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingState {
    /// No cycle task armed, no live overlay.
    #[default]
    Idle,

    /// Cycle task armed; zero or one live overlay.
    Active,
}

impl ProcessingState {
    /// Returns true if the engine is idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if the engine is processing frames.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Active => "Active",
        }
    }
}

/// Why a cycle ended without installing an overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// No video source is attached.
    NoSource,

    /// The source has no decoded frame yet.
    NotReady,

    /// The frame could not be compressed.
    EncodeFailed,

    /// The processing service failed or was unreachable.
    TransportFailed { message: String },

    /// The result arrived after processing was stopped.
    Stale,
}

impl SkipReason {
    /// Returns a display message for this reason.
    pub fn message(&self) -> String {
        match self {
            Self::NoSource => "No video source attached".to_string(),
            Self::NotReady => "Video has no frame yet".to_string(),
            Self::EncodeFailed => "Frame could not be encoded".to_string(),
            Self::TransportFailed { message } => format!("Processing failed: {message}"),
            Self::Stale => "Result discarded after stop".to_string(),
        }
    }

    /// Returns true for skips the user should never hear about.
    pub fn is_silent(&self) -> bool {
        !matches!(self, Self::TransportFailed { .. })
    }
}
