//! Headless demo of the frame filter.
//!
//! Plays a synthetic colour-bar source, turns processing on for a few
//! seconds against the configured service and prints what the surface would
//! show.

use std::env;
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use framefilter_capture::PatternSource;
use framefilter_ipc::{event_channel, FilterConfig, OverlayEvent};
use framefilter_surface::{init_logging, PresentationSurface};
use framefilter_transport::HttpProcessorClient;

const CONFIG_ENV: &str = "FRAMEFILTER_CONFIG";
const ENDPOINT_ENV: &str = "FRAMEFILTER_ENDPOINT";

const DEMO_WIDTH: u32 = 640;
const DEMO_HEIGHT: u32 = 480;
const RENDER_PASSES: u32 = 10;
const RENDER_INTERVAL: Duration = Duration::from_millis(500);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

fn load_config() -> anyhow::Result<FilterConfig> {
    let mut config = match env::var(CONFIG_ENV) {
        Ok(path) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse config file {}", path))?
        }
        Err(_) => FilterConfig::default(),
    };

    if let Ok(endpoint) = env::var(ENDPOINT_ENV) {
        config.endpoint = endpoint;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    init_logging();
    info!("Starting frame filter demo");

    let config = load_config()?;
    info!(endpoint = %config.endpoint, "Loaded configuration");

    let probe = HttpProcessorClient::new(&config.endpoint, config.request_timeout())?;
    match probe.health_check() {
        Ok(()) => info!("Processing service is reachable"),
        Err(e) => warn!("Processing service health check failed: {}", e),
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    let (event_tx, event_rx) = event_channel();
    let engine = framefilter_engine::create_engine(runtime.handle().clone(), &config, event_tx)?;
    let mut surface = PresentationSurface::new(engine, event_rx);

    surface.set_source(Arc::new(PatternSource::new(DEMO_WIDTH, DEMO_HEIGHT)));
    surface.toggle();

    for pass in 0..RENDER_PASSES {
        thread::sleep(RENDER_INTERVAL);

        let skipped = surface
            .poll_events()
            .iter()
            .filter(|event| matches!(event, OverlayEvent::CycleSkipped(_)))
            .count();
        if skipped > 0 {
            info!(pass, skipped, "Cycles skipped since last render");
        }
        if !surface.needs_render() {
            continue;
        }

        let scene = surface.render();
        info!(
            pass,
            layers = scene.layers().len(),
            mode = scene.mode_label().unwrap_or_default(),
            overlay = scene.overlay_uri().unwrap_or("-"),
            "Rendered scene"
        );
    }

    surface.toggle();
    let stats = surface.engine().stats();
    info!(
        "Demo finished: cycles={}, submitted={}, installed={}, failed={}",
        stats.cycles, stats.frames_submitted, stats.overlays_installed, stats.transport_failures
    );

    surface.shutdown();
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    Ok(())
}
