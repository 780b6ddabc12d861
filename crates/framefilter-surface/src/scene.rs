//! Composited view of the video, the overlay and the controls.

use bytes::Bytes;

use framefilter_capture::SourceId;

pub const STATUS_PROCESSING: &str = "Processing...";
pub const LABEL_START: &str = "Start Filter";
pub const LABEL_STOP: &str = "Stop Filter";
pub const MODE_FILTERED: &str = "Filtered";
pub const MODE_ORIGINAL: &str = "Original";

/// One drawable element, listed bottom to top in a [`Scene`].
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    /// The playing video, if a source is attached.
    Video { source: Option<SourceId> },

    /// Processed frame covering the video.
    Overlay {
        uri: String,
        content_type: String,
        bytes: Bytes,
    },

    /// Shown while processing is active.
    StatusBadge { text: &'static str },

    /// The start/stop control.
    ToggleButton { label: &'static str },

    /// Which picture the viewer is looking at.
    ModeLabel { text: &'static str },
}

/// A rendered frame of the presentation surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    layers: Vec<Layer>,
}

impl Scene {
    pub(crate) fn push(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Layers bottom to top.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// URI of the displayed overlay.
    pub fn overlay_uri(&self) -> Option<&str> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Overlay { uri, .. } => Some(uri.as_str()),
            _ => None,
        })
    }

    pub fn has_overlay(&self) -> bool {
        self.overlay_uri().is_some()
    }

    pub fn is_processing(&self) -> bool {
        self.layers
            .iter()
            .any(|layer| matches!(layer, Layer::StatusBadge { .. }))
    }

    pub fn toggle_label(&self) -> Option<&'static str> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::ToggleButton { label } => Some(*label),
            _ => None,
        })
    }

    pub fn mode_label(&self) -> Option<&'static str> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::ModeLabel { text } => Some(*text),
            _ => None,
        })
    }

    /// Source shown by the video layer.
    pub fn video_source(&self) -> Option<SourceId> {
        self.layers.iter().find_map(|layer| match layer {
            Layer::Video { source } => *source,
            _ => None,
        })
    }
}
