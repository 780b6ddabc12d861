//! Typed surface<->engine messages for the frame filter.
//!
//! This crate defines the message and configuration types shared between
//! the presentation surface and the overlay engine.

mod commands;
mod events;
mod state;
mod types;

pub use commands::OverlayCommand;
pub use events::OverlayEvent;
pub use state::{ProcessingState, SkipReason};
pub use types::{ConfigError, CycleStats, FilterConfig, OverlayRef};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for events (Engine → Surface).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<OverlayEvent>, Receiver<OverlayEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
