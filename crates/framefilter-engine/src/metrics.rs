//! Cycle metrics collection and reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use framefilter_ipc::CycleStats;

/// Collects per-cycle counters.
pub struct CycleMetrics {
    start_time: RwLock<Option<Instant>>,
    cycles: AtomicU64,
    frames_submitted: AtomicU64,
    not_ready_skips: AtomicU64,
    encode_skips: AtomicU64,
    transport_failures: AtomicU64,
    overlays_installed: AtomicU64,
    stale_discards: AtomicU64,
    last_round_trip_ms: AtomicU64,
}

impl CycleMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            start_time: RwLock::new(None),
            cycles: AtomicU64::new(0),
            frames_submitted: AtomicU64::new(0),
            not_ready_skips: AtomicU64::new(0),
            encode_skips: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
            overlays_installed: AtomicU64::new(0),
            stale_discards: AtomicU64::new(0),
            last_round_trip_ms: AtomicU64::new(0),
        }
    }

    /// Mark the start of an active period.
    pub fn start(&self) {
        *self.start_time.write() = Some(Instant::now());
    }

    /// Mark the end of an active period.
    pub fn stop(&self) {
        *self.start_time.write() = None;
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_submission(&self) {
        self.frames_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_ready(&self) {
        self.not_ready_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encode_skip(&self) {
        self.encode_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overlay_installed(&self) {
        self.overlays_installed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_discard(&self) {
        self.stale_discards.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the round-trip time of a successful submission.
    pub fn record_round_trip(&self, elapsed: Duration) {
        self.last_round_trip_ms
            .store(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> CycleStats {
        let uptime_seconds = self
            .start_time
            .read()
            .map(|s| s.elapsed().as_secs())
            .unwrap_or(0);

        CycleStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            frames_submitted: self.frames_submitted.load(Ordering::Relaxed),
            not_ready_skips: self.not_ready_skips.load(Ordering::Relaxed),
            encode_skips: self.encode_skips.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            overlays_installed: self.overlays_installed.load(Ordering::Relaxed),
            stale_discards: self.stale_discards.load(Ordering::Relaxed),
            last_round_trip_ms: self.last_round_trip_ms.load(Ordering::Relaxed),
            uptime_seconds,
        }
    }
}

impl Default for CycleMetrics {
    fn default() -> Self {
        Self::new()
    }
}
