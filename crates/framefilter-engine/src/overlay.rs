//! Overlay state machine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, trace, warn};

use framefilter_capture::{FrameSampler, NotReadyReason, Sample, SourceId, VideoSource};
use framefilter_ipc::{
    CycleStats, FilterConfig, OverlayCommand, OverlayEvent, OverlayRef, ProcessingState,
    SkipReason,
};
use framefilter_transport::{HttpProcessorClient, ProcessedImage, RemoteProcessor};

use crate::handles::{HandleRegistry, ProcessedFrameHandle};
use crate::metrics::CycleMetrics;
use crate::EngineResult;

/// How often the cycle task logs its counters.
const STATS_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// A displayable copy of the live overlay.
#[derive(Debug, Clone)]
pub struct OverlayView {
    /// Handle description.
    pub descriptor: OverlayRef,

    /// Processed image bytes.
    pub data: Bytes,
}

struct OverlayCore {
    state: ProcessingState,
    /// Bumped on every start; cycles from an older epoch are stale.
    epoch: u64,
    live: Option<ProcessedFrameHandle>,
}

/// State shared between the engine and its cycle task.
struct Shared {
    core: Mutex<OverlayCore>,
    source: RwLock<Option<Arc<dyn VideoSource>>>,
    sampler: Mutex<FrameSampler>,
    processor: Arc<dyn RemoteProcessor>,
    registry: Arc<HandleRegistry>,
    metrics: CycleMetrics,
    event_tx: Sender<OverlayEvent>,
}

/// The recurring capture task of one active period.
struct CycleTask {
    epoch: u64,
    /// Dropping this ends the task at its next tick.
    _cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Drives periodic capture → submit → install cycles and owns the live
/// overlay handle.
pub struct OverlayEngine {
    runtime: Handle,
    interval: Duration,
    shared: Arc<Shared>,
    task: Option<CycleTask>,
    attachments: u64,
}

impl OverlayEngine {
    /// Create an engine around a sampler and a processor.
    pub fn new(
        runtime: Handle,
        config: &FilterConfig,
        sampler: FrameSampler,
        processor: Arc<dyn RemoteProcessor>,
        event_tx: Sender<OverlayEvent>,
    ) -> Self {
        let shared = Arc::new(Shared {
            core: Mutex::new(OverlayCore {
                state: ProcessingState::Idle,
                epoch: 0,
                live: None,
            }),
            source: RwLock::new(None),
            sampler: Mutex::new(sampler),
            processor,
            registry: HandleRegistry::new(),
            metrics: CycleMetrics::new(),
            event_tx,
        });

        info!(
            processor = shared.processor.name(),
            interval_ms = config.capture_interval_ms,
            "Overlay engine ready"
        );
        shared.send_event(OverlayEvent::Ready);

        Self {
            runtime,
            interval: config.capture_interval(),
            shared,
            task: None,
            attachments: 0,
        }
    }

    /// Create an engine that posts JPEG frames to the configured HTTP service.
    pub fn from_config(
        runtime: Handle,
        config: &FilterConfig,
        event_tx: Sender<OverlayEvent>,
    ) -> EngineResult<Self> {
        config.validate()?;

        let client = HttpProcessorClient::new(&config.endpoint, config.request_timeout())?
            .with_max_response_bytes(config.max_response_bytes);
        let sampler = FrameSampler::with_quality(config.jpeg_quality)?;

        Ok(Self::new(runtime, config, sampler, Arc::new(client), event_tx))
    }

    /// Wire the engine to a video source.
    ///
    /// Attaching the source that is already attached does nothing. A
    /// different source stops processing first. Returns true if the wiring
    /// changed.
    #[instrument(name = "attach_source", skip_all, fields(source = %source.id()))]
    pub fn attach_source(&mut self, source: Arc<dyn VideoSource>) -> bool {
        let id = source.id();
        if self.source_id() == Some(id) {
            debug!("Source already attached, ignoring");
            return false;
        }

        if self.source_id().is_some() {
            info!("Video source changed, stopping processing");
            self.stop();
        }

        *self.shared.source.write() = Some(source);
        self.attachments += 1;

        info!("Video source attached");
        self.shared
            .send_event(OverlayEvent::SourceAttached { source_id: id.get() });
        true
    }

    /// Stop processing and forget the attached source.
    pub fn detach_source(&mut self) {
        self.stop();
        if self.shared.source.write().take().is_some() {
            info!("Video source detached");
        }
    }

    /// Identity of the attached source.
    pub fn source_id(&self) -> Option<SourceId> {
        self.shared.source.read().as_ref().map(|s| s.id())
    }

    /// How many times a source was wired to the engine.
    pub fn attachment_count(&self) -> u64 {
        self.attachments
    }

    /// Begin periodic processing. Does nothing if already active.
    #[instrument(name = "overlay_start", skip(self))]
    pub fn start(&mut self) {
        let epoch = {
            let mut core = self.shared.core.lock();
            if core.state.is_active() {
                debug!("Processing already running");
                return;
            }

            core.epoch += 1;
            self.shared
                .transition(&mut core, ProcessingState::Active);
            core.epoch
        };

        self.shared.metrics.start();

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let handle = self.runtime.spawn(cycle_loop(
            Arc::clone(&self.shared),
            epoch,
            self.interval,
            cancel_rx,
        ));

        self.task = Some(CycleTask {
            epoch,
            _cancel: cancel_tx,
            handle,
        });

        info!(epoch, "Started frame processing");
    }

    /// Stop processing and drop the overlay. Safe to call when idle.
    #[instrument(name = "overlay_stop", skip(self))]
    pub fn stop(&mut self) {
        // Cancels the cycle task; an in-flight cycle finishes on its own and
        // its result is discarded.
        let task = self.task.take();

        let cleared = {
            let mut core = self.shared.core.lock();
            if core.state.is_idle() && core.live.is_none() && task.is_none() {
                debug!("Already idle, ignoring stop");
                return;
            }

            self.shared.transition(&mut core, ProcessingState::Idle);
            let cleared = core.live.take();
            if let Some(handle) = cleared.as_ref() {
                debug!(id = handle.id(), "Clearing overlay");
                self.shared.send_event(OverlayEvent::OverlayCleared);
            }
            cleared
        };

        if let Some(handle) = cleared {
            handle.release();
        }
        if let Some(task) = task {
            debug!(epoch = task.epoch, "Cycle task cancelled");
        }

        self.shared.metrics.stop();
        info!("Stopped frame processing");
    }

    /// Start when idle, stop when active.
    pub fn toggle(&mut self) {
        if self.state().is_active() {
            self.stop();
        } else {
            self.start();
        }
    }

    /// Handle a command. Returns false if the engine should shut down.
    pub fn handle_command(&mut self, command: OverlayCommand) -> bool {
        debug!(?command, "Handling command");

        match command {
            OverlayCommand::Start => self.start(),
            OverlayCommand::Stop => self.stop(),
            OverlayCommand::Toggle => self.toggle(),
            OverlayCommand::GetState => self.send_state(),
            OverlayCommand::GetStats => {
                self.shared.send_event(OverlayEvent::Stats(self.stats()));
            }
            OverlayCommand::Shutdown => {
                self.stop();
                self.shared.send_event(OverlayEvent::Shutdown);
                return false;
            }
        }

        true
    }

    fn send_state(&self) {
        self.shared.send_event(OverlayEvent::State(self.state()));
    }

    /// Current processing state.
    pub fn state(&self) -> ProcessingState {
        self.shared.core.lock().state
    }

    /// Activation counter; unchanged by a redundant start.
    pub fn epoch(&self) -> u64 {
        self.shared.core.lock().epoch
    }

    /// Epoch of the running cycle task, if any.
    pub fn task_epoch(&self) -> Option<u64> {
        self.task.as_ref().map(|t| t.epoch)
    }

    /// Returns true while a cycle task is alive.
    pub fn is_cycle_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.handle.is_finished())
    }

    /// The overlay currently on display.
    pub fn overlay(&self) -> Option<OverlayView> {
        let core = self.shared.core.lock();
        core.live.as_ref().map(|handle| OverlayView {
            descriptor: handle.descriptor(),
            data: handle.data(),
        })
    }

    /// Registry the engine mints handles from.
    pub fn registry(&self) -> Arc<HandleRegistry> {
        Arc::clone(&self.shared.registry)
    }

    /// Current cycle statistics.
    pub fn stats(&self) -> CycleStats {
        self.shared.metrics.snapshot()
    }
}

impl Drop for OverlayEngine {
    fn drop(&mut self) {
        self.stop();
        debug!("Overlay engine torn down");
    }
}

impl Shared {
    /// Returns true if cycles of `epoch` may still change state.
    fn is_current(&self, epoch: u64) -> bool {
        let core = self.core.lock();
        core.state.is_active() && core.epoch == epoch
    }

    fn transition(&self, core: &mut OverlayCore, next: ProcessingState) {
        let previous = core.state;
        core.state = next;
        if previous == next {
            return;
        }

        debug!(
            previous = %previous.name(),
            current = %next.name(),
            "State transition"
        );
        self.send_event(OverlayEvent::StateChanged {
            previous,
            current: next,
        });
    }

    /// Replace the live overlay with `image`, unless processing stopped or
    /// restarted since the cycle began.
    fn install(&self, epoch: u64, image: ProcessedImage) {
        // The new handle is fully ready before displayed state is touched.
        let handle = self.registry.mint(image);

        let mut core = self.core.lock();
        if !core.state.is_active() || core.epoch != epoch {
            drop(core);
            self.metrics.record_stale_discard();
            debug!(id = handle.id(), epoch, "Discarding result that arrived after stop");
            handle.release();
            return;
        }

        let descriptor = handle.descriptor();
        if let Some(previous) = core.live.replace(handle) {
            trace!(previous = previous.id(), current = descriptor.id, "Replacing overlay");
            previous.release();
        }
        self.metrics.record_overlay_installed();
        self.send_event(OverlayEvent::OverlayInstalled(descriptor));
    }

    fn skip(&self, reason: SkipReason) {
        if reason.is_silent() {
            trace!(reason = %reason.message(), "Cycle skipped");
        } else {
            self.send_event(OverlayEvent::CycleSkipped(reason));
        }
    }

    fn send_event(&self, event: OverlayEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}

/// Recurring task of one active period. Cycles never overlap: each runs to
/// completion before the next tick is awaited, and ticks missed meanwhile are
/// skipped.
async fn cycle_loop(
    shared: Arc<Shared>,
    epoch: u64,
    period: Duration,
    mut cancel: oneshot::Receiver<()>,
) {
    debug!(epoch, period_ms = period.as_millis() as u64, "Cycle task starting");

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_log_time = Instant::now();

    loop {
        tokio::select! {
            biased;
            _ = &mut cancel => break,
            _ = ticker.tick() => {}
        }

        if !shared.is_current(epoch) {
            break;
        }

        run_cycle(&shared, epoch).await;

        if last_log_time.elapsed() >= STATS_LOG_INTERVAL {
            let stats = shared.metrics.snapshot();
            info!(
                "Cycle stats: cycles={}, submitted={}, installed={}, failed={}, not_ready={}, rtt={}ms",
                stats.cycles,
                stats.frames_submitted,
                stats.overlays_installed,
                stats.transport_failures,
                stats.not_ready_skips,
                stats.last_round_trip_ms
            );
            last_log_time = Instant::now();
        }
    }

    debug!(epoch, "Cycle task stopped");
}

/// One capture → submit → install sequence.
async fn run_cycle(shared: &Arc<Shared>, epoch: u64) {
    shared.metrics.record_cycle();

    let Some(source) = shared.source.read().clone() else {
        shared.skip(SkipReason::NoSource);
        return;
    };

    let sampling = Arc::clone(shared);
    let sample =
        match tokio::task::spawn_blocking(move || sampling.sampler.lock().sample(source.as_ref()))
            .await
        {
            Ok(sample) => sample,
            Err(e) => {
                error!("Sampling task failed: {}", e);
                return;
            }
        };

    let frame = match sample {
        Sample::Ready(frame) => frame,
        Sample::NotReady(NotReadyReason::EncodeFailed) => {
            shared.metrics.record_encode_skip();
            shared.skip(SkipReason::EncodeFailed);
            return;
        }
        Sample::NotReady(_) => {
            shared.metrics.record_not_ready();
            shared.skip(SkipReason::NotReady);
            return;
        }
    };

    // Stopped while sampling; nothing to submit.
    if !shared.is_current(epoch) {
        shared.metrics.record_stale_discard();
        shared.skip(SkipReason::Stale);
        return;
    }

    shared.metrics.record_submission();
    let started = Instant::now();
    let submitting = Arc::clone(shared);
    let result = tokio::task::spawn_blocking(move || submitting.processor.submit(&frame)).await;

    match result {
        Ok(Ok(image)) => {
            shared.metrics.record_round_trip(started.elapsed());
            shared.install(epoch, image);
        }
        Ok(Err(e)) => {
            shared.metrics.record_transport_failure();
            shared.skip(SkipReason::TransportFailed {
                message: e.to_string(),
            });
        }
        Err(e) => error!("Submission task failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use crossbeam_channel::{Receiver, Sender};
    use framefilter_capture::{CaptureResult, CapturedFrame, DrawSurface, PatternSource};
    use framefilter_ipc::event_channel;
    use framefilter_transport::{TransportError, TransportResult};

    const PERIOD_MS: u64 = 10;

    /// Succeeds for the first `succeed_first` calls, then answers HTTP 500.
    struct MockProcessor {
        calls: AtomicU64,
        succeed_first: u64,
    }

    impl MockProcessor {
        fn succeeding() -> Arc<Self> {
            Self::succeeding_first(u64::MAX)
        }

        fn failing() -> Arc<Self> {
            Self::succeeding_first(0)
        }

        fn succeeding_first(succeed_first: u64) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU64::new(0),
                succeed_first,
            })
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RemoteProcessor for MockProcessor {
        fn submit(&self, frame: &CapturedFrame) -> TransportResult<ProcessedImage> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.succeed_first {
                return Err(TransportError::Status {
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(ProcessedImage {
                data: Bytes::from(vec![call as u8; frame.len().min(32)]),
                content_type: "image/jpeg".into(),
            })
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    /// Blocks every submission until the test releases it.
    struct GatedProcessor {
        entered_tx: Sender<()>,
        release_rx: Receiver<()>,
    }

    impl RemoteProcessor for GatedProcessor {
        fn submit(&self, _frame: &CapturedFrame) -> TransportResult<ProcessedImage> {
            let _ = self.entered_tx.send(());
            let _ = self.release_rx.recv();
            Ok(ProcessedImage {
                data: Bytes::from_static(b"late"),
                content_type: "image/jpeg".into(),
            })
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    /// Takes longer than several tick periods and records how many
    /// submissions were running at once.
    struct SlowProcessor {
        delay: Duration,
        in_flight: AtomicU64,
        peak: AtomicU64,
        calls: AtomicU64,
    }

    impl SlowProcessor {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                in_flight: AtomicU64::new(0),
                peak: AtomicU64::new(0),
                calls: AtomicU64::new(0),
            })
        }
    }

    impl RemoteProcessor for SlowProcessor {
        fn submit(&self, _frame: &CapturedFrame) -> TransportResult<ProcessedImage> {
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            std::thread::sleep(self.delay);

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(ProcessedImage {
                data: Bytes::from_static(b"slow"),
                content_type: "image/jpeg".into(),
            })
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    /// Blocks inside `draw` until the test releases it.
    struct GatedSource {
        inner: PatternSource,
        entered_tx: Sender<()>,
        release_rx: Receiver<()>,
    }

    impl VideoSource for GatedSource {
        fn id(&self) -> SourceId {
            self.inner.id()
        }

        fn natural_size(&self) -> (u32, u32) {
            self.inner.natural_size()
        }

        fn draw(&self, surface: &mut DrawSurface) -> CaptureResult<()> {
            let _ = self.entered_tx.send(());
            let _ = self.release_rx.recv();
            self.inner.draw(surface)
        }
    }

    fn config() -> FilterConfig {
        FilterConfig {
            capture_interval_ms: PERIOD_MS,
            ..Default::default()
        }
    }

    fn engine_with(processor: Arc<dyn RemoteProcessor>) -> (OverlayEngine, Receiver<OverlayEvent>) {
        let (event_tx, event_rx) = event_channel();
        let sampler = FrameSampler::with_quality(80).unwrap();
        let engine =
            crate::create_engine_with(Handle::current(), &config(), sampler, processor, event_tx);
        (engine, event_rx)
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        condition()
    }

    async fn periods(n: u64) {
        tokio::time::sleep(Duration::from_millis(PERIOD_MS * n)).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_is_idempotent() {
        let (mut engine, _events) = engine_with(MockProcessor::succeeding());
        engine.attach_source(Arc::new(PatternSource::new(32, 24)));

        engine.start();
        let epoch = engine.epoch();
        let task_epoch = engine.task_epoch();

        engine.start();
        engine.handle_command(OverlayCommand::Start);

        assert!(engine.state().is_active());
        assert_eq!(engine.epoch(), epoch);
        assert_eq!(engine.task_epoch(), task_epoch);
        assert!(engine.is_cycle_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_when_idle_is_noop() {
        let (mut engine, events) = engine_with(MockProcessor::succeeding());
        assert!(matches!(events.try_recv(), Ok(OverlayEvent::Ready)));

        engine.stop();
        engine.stop();

        assert!(engine.state().is_idle());
        assert_eq!(engine.epoch(), 0);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overlays_replace_each_other_and_release_on_stop() {
        let processor = MockProcessor::succeeding();
        let (mut engine, _events) = engine_with(processor.clone());
        let registry = engine.registry();
        engine.attach_source(Arc::new(PatternSource::new(32, 24)));

        engine.start();
        assert!(wait_for(|| engine.stats().overlays_installed >= 3).await);
        assert!(engine.overlay().is_some());

        engine.stop();
        assert!(engine.overlay().is_none());
        assert!(engine.state().is_idle());

        // An in-flight cycle may still resolve; it must not leak.
        periods(5).await;
        assert_eq!(registry.outstanding(), 0);
        assert_eq!(registry.minted_count(), registry.released_count());
        assert!(registry.minted_count() >= 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_zero_dimensions_never_submits() {
        let processor = MockProcessor::succeeding();
        let (mut engine, _events) = engine_with(processor.clone());
        engine.attach_source(Arc::new(PatternSource::unloaded()));

        engine.start();
        assert!(wait_for(|| engine.stats().not_ready_skips >= 5).await);

        assert_eq!(processor.calls(), 0);
        assert!(engine.overlay().is_none());
        assert!(engine.state().is_active());
        assert_eq!(engine.registry().minted_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failure_keeps_previous_overlay() {
        let processor = MockProcessor::succeeding_first(1);
        let (mut engine, events) = engine_with(processor.clone());
        engine.attach_source(Arc::new(PatternSource::new(32, 24)));

        engine.start();
        assert!(wait_for(|| engine.stats().transport_failures >= 3).await);

        let overlay = engine.overlay().expect("first overlay stays displayed");
        assert_eq!(overlay.descriptor.id, 1);
        assert_eq!(overlay.data.as_ref(), &[0u8; 32][..overlay.data.len()]);
        assert_eq!(engine.registry().minted_count(), 1);

        let failures = events
            .try_iter()
            .filter(|e| matches!(e, OverlayEvent::CycleSkipped(SkipReason::TransportFailed { .. })))
            .count();
        assert!(failures >= 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_while_in_flight_discards_result() {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let processor = Arc::new(GatedProcessor {
            entered_tx,
            release_rx,
        });
        let (mut engine, _events) = engine_with(processor);
        let registry = engine.registry();
        engine.attach_source(Arc::new(PatternSource::new(32, 24)));

        engine.start();
        assert!(wait_for(|| entered_rx.try_recv().is_ok()).await);

        engine.stop();
        release_tx.send(()).unwrap();

        assert!(wait_for(|| engine.stats().stale_discards == 1).await);
        assert!(engine.overlay().is_none());
        assert!(engine.state().is_idle());
        assert_eq!(registry.minted_count(), 1);
        assert_eq!(registry.released_count(), 1);
        assert_eq!(engine.stats().overlays_installed, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drop_releases_live_overlay() {
        let (mut engine, _events) = engine_with(MockProcessor::succeeding());
        let registry = engine.registry();
        engine.attach_source(Arc::new(PatternSource::new(32, 24)));

        engine.start();
        assert!(wait_for(|| engine.overlay().is_some()).await);
        drop(engine);

        assert!(wait_for(|| registry.outstanding() == 0).await);
        periods(5).await;
        assert_eq!(registry.outstanding(), 0);
        assert_eq!(registry.minted_count(), registry.released_count());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_same_source_attaches_once() {
        let (mut engine, _events) = engine_with(MockProcessor::succeeding());
        let source: Arc<dyn VideoSource> = Arc::new(PatternSource::new(32, 24));

        assert!(engine.attach_source(Arc::clone(&source)));
        engine.start();
        let epoch = engine.epoch();

        assert!(!engine.attach_source(Arc::clone(&source)));
        assert_eq!(engine.attachment_count(), 1);
        assert!(engine.state().is_active());
        assert_eq!(engine.epoch(), epoch);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_new_source_stops_processing() {
        let (mut engine, _events) = engine_with(MockProcessor::succeeding());
        engine.attach_source(Arc::new(PatternSource::new(32, 24)));
        engine.start();
        assert!(wait_for(|| engine.overlay().is_some()).await);

        let next = Arc::new(PatternSource::new(16, 16));
        let next_id = next.id();
        assert!(engine.attach_source(next));

        assert!(engine.state().is_idle());
        assert!(engine.overlay().is_none());
        assert_eq!(engine.source_id(), Some(next_id));
        assert_eq!(engine.attachment_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_detach_clears_overlay_and_source() {
        let (mut engine, _events) = engine_with(MockProcessor::succeeding());
        let registry = engine.registry();
        engine.attach_source(Arc::new(PatternSource::new(32, 24)));
        engine.start();
        assert!(wait_for(|| engine.overlay().is_some()).await);

        engine.detach_source();
        assert!(engine.source_id().is_none());
        assert!(engine.state().is_idle());
        assert!(engine.overlay().is_none());
        assert!(wait_for(|| registry.outstanding() == 0).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_no_source_skips_cycles() {
        let processor = MockProcessor::succeeding();
        let (mut engine, _events) = engine_with(processor.clone());

        engine.start();
        assert!(wait_for(|| engine.stats().cycles >= 3).await);
        assert_eq!(processor.calls(), 0);
        assert!(engine.overlay().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failing_service_never_installs() {
        let processor = MockProcessor::failing();
        let (mut engine, _events) = engine_with(processor.clone());
        engine.attach_source(Arc::new(PatternSource::new(32, 24)));

        engine.start();
        assert!(wait_for(|| processor.calls() >= 5).await);
        assert!(engine.overlay().is_none());
        assert_eq!(engine.registry().minted_count(), 0);
        assert!(engine.state().is_active());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_toggle_and_commands() {
        let (mut engine, events) = engine_with(MockProcessor::succeeding());
        engine.attach_source(Arc::new(PatternSource::new(32, 24)));

        assert!(engine.handle_command(OverlayCommand::Toggle));
        assert!(engine.state().is_active());
        assert!(engine.handle_command(OverlayCommand::Toggle));
        assert!(engine.state().is_idle());

        assert!(engine.handle_command(OverlayCommand::GetState));
        assert!(engine.handle_command(OverlayCommand::GetStats));
        assert!(!engine.handle_command(OverlayCommand::Shutdown));

        let received: Vec<_> = events.try_iter().collect();
        assert!(received.iter().any(|e| matches!(
            e,
            OverlayEvent::StateChanged {
                previous: ProcessingState::Idle,
                current: ProcessingState::Active
            }
        )));
        assert!(received
            .iter()
            .any(|e| matches!(e, OverlayEvent::State(ProcessingState::Idle))));
        assert!(!received.iter().any(|e| matches!(
            e,
            OverlayEvent::StateChanged { previous, current } if previous == current
        )));
        assert!(received.iter().any(|e| matches!(e, OverlayEvent::Stats(_))));
        assert!(matches!(received.last(), Some(OverlayEvent::Shutdown)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_service_never_overlaps_cycles() {
        let processor = SlowProcessor::new(Duration::from_millis(PERIOD_MS * 6));
        let (mut engine, _events) = engine_with(processor.clone());
        let registry = engine.registry();
        engine.attach_source(Arc::new(PatternSource::new(32, 24)));

        engine.start();
        assert!(wait_for(|| processor.calls.load(Ordering::SeqCst) >= 5).await);
        assert_eq!(processor.peak.load(Ordering::SeqCst), 1);
        assert!(engine.overlay().is_some());

        // Requests from earlier activations may still land after a restart.
        for _ in 0..20 {
            engine.stop();
            engine.start();
        }
        engine.stop();

        assert!(
            wait_for(|| {
                processor.in_flight.load(Ordering::SeqCst) == 0
                    && registry.minted_count() == registry.released_count()
            })
            .await
        );
        periods(10).await;
        assert_eq!(registry.outstanding(), 0);
        assert_eq!(registry.minted_count(), registry.released_count());
        assert!(engine.overlay().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_while_sampling_counts_stale_cycle() {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let processor = MockProcessor::succeeding();
        let (mut engine, _events) = engine_with(processor.clone());
        engine.attach_source(Arc::new(GatedSource {
            inner: PatternSource::new(32, 24),
            entered_tx,
            release_rx,
        }));

        engine.start();
        assert!(wait_for(|| entered_rx.try_recv().is_ok()).await);

        engine.stop();
        release_tx.send(()).unwrap();

        assert!(wait_for(|| engine.stats().stale_discards == 1).await);
        periods(5).await;
        assert_eq!(processor.calls(), 0);
        assert_eq!(engine.stats().frames_submitted, 0);
        assert_eq!(engine.registry().minted_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_restart_uses_new_epoch() {
        let (mut engine, _events) = engine_with(MockProcessor::succeeding());
        engine.attach_source(Arc::new(PatternSource::new(32, 24)));

        engine.start();
        engine.stop();
        engine.start();

        assert_eq!(engine.epoch(), 2);
        assert_eq!(engine.task_epoch(), Some(2));
        assert!(wait_for(|| engine.overlay().is_some()).await);
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (event_tx, _event_rx) = event_channel();
        let config = FilterConfig {
            jpeg_quality: 0,
            ..Default::default()
        };

        let result = OverlayEngine::from_config(runtime.handle().clone(), &config, event_tx);
        assert!(matches!(result, Err(crate::EngineError::Config(_))));
    }
}
