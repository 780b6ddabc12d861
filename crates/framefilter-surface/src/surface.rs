//! Presentation surface driving the overlay engine.

use std::sync::Arc;

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{debug, info, instrument, warn};

use framefilter_capture::VideoSource;
use framefilter_engine::OverlayEngine;
use framefilter_ipc::{OverlayCommand, OverlayEvent};

use crate::scene::{
    Layer, Scene, LABEL_START, LABEL_STOP, MODE_FILTERED, MODE_ORIGINAL, STATUS_PROCESSING,
};

/// Renders the video with the live overlay on top and forwards user toggles.
///
/// Everything shown is read from the engine at render time; the surface only
/// remembers whether an engine event arrived since the last render.
pub struct PresentationSurface {
    engine: OverlayEngine,
    event_rx: Receiver<OverlayEvent>,
    dirty: bool,
}

impl PresentationSurface {
    /// Create a surface around an engine and the receiving end of its events.
    pub fn new(engine: OverlayEngine, event_rx: Receiver<OverlayEvent>) -> Self {
        Self {
            engine,
            event_rx,
            dirty: true,
        }
    }

    /// Show a video source. Returns true if the engine was rewired.
    pub fn set_source(&mut self, source: Arc<dyn VideoSource>) -> bool {
        let changed = self.engine.attach_source(source);
        self.dirty |= changed;
        changed
    }

    /// User pressed the start/stop control.
    #[instrument(name = "surface_toggle", skip(self))]
    pub fn toggle(&mut self) {
        self.send(OverlayCommand::Toggle);
    }

    /// Forward a command to the engine. Returns false after shutdown.
    pub fn send(&mut self, command: OverlayCommand) -> bool {
        let running = self.engine.handle_command(command);
        self.dirty = true;
        running
    }

    /// Drain pending engine events.
    pub fn poll_events(&mut self) -> Vec<OverlayEvent> {
        let mut events = Vec::new();

        loop {
            match self.event_rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("Event channel disconnected");
                    break;
                }
            }
        }

        if !events.is_empty() {
            debug!(count = events.len(), "Received engine events");
            self.dirty = true;
        }
        events
    }

    /// Returns true if something changed since the last render.
    pub fn needs_render(&self) -> bool {
        self.dirty
    }

    /// Composite the current scene.
    pub fn render(&mut self) -> Scene {
        self.dirty = false;

        let state = self.engine.state();
        let overlay = self.engine.overlay();
        let mut scene = Scene::default();

        scene.push(Layer::Video {
            source: self.engine.source_id(),
        });

        let filtered = overlay.is_some();
        if let Some(view) = overlay {
            scene.push(Layer::Overlay {
                uri: view.descriptor.uri,
                content_type: view.descriptor.content_type,
                bytes: view.data,
            });
        }

        if state.is_active() {
            scene.push(Layer::StatusBadge {
                text: STATUS_PROCESSING,
            });
        }

        scene.push(Layer::ToggleButton {
            label: if state.is_active() {
                LABEL_STOP
            } else {
                LABEL_START
            },
        });
        scene.push(Layer::ModeLabel {
            text: if filtered { MODE_FILTERED } else { MODE_ORIGINAL },
        });

        scene
    }

    /// The engine behind this surface.
    pub fn engine(&self) -> &OverlayEngine {
        &self.engine
    }

    /// Stop processing and tear the engine down.
    pub fn shutdown(mut self) {
        self.send(OverlayCommand::Shutdown);
        self.poll_events();
        info!("Presentation surface closed");
    }
}
