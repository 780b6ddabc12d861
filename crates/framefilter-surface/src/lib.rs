//! Presentation surface for the frame filter.
//!
//! Composites the playing video, the live processed overlay and the controls
//! into a [`Scene`], and turns user toggles into engine commands.

mod scene;
mod surface;

pub use scene::{
    Layer, Scene, LABEL_START, LABEL_STOP, MODE_FILTERED, MODE_ORIGINAL, STATUS_PROCESSING,
};
pub use surface::PresentationSurface;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "framefilter=debug,framefilter_surface=debug,framefilter_engine=debug,framefilter_capture=debug,framefilter_encoder=debug,framefilter_transport=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
