//! Lightweight cycle timing utilities.
//!
//! Measures where each cycle spends its time (controller I/O vs. physics).
//! Enabled via the `PS_TIMING` environment variable or programmatically.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable cycle timing globally.
pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Disable cycle timing globally.
pub fn disable_timing() {
    ENABLED.store(false, Ordering::Relaxed);
}

/// Check if timing is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var("PS_TIMING").is_ok()
}

/// Measures one phase; records into an [`AccumulatingTimer`] when stopped.
pub struct PhaseTimer<'a> {
    sink: &'a AccumulatingTimer,
    start: Instant,
    enabled: bool,
}

impl<'a> PhaseTimer<'a> {
    pub fn start(sink: &'a AccumulatingTimer) -> Self {
        Self {
            sink,
            start: Instant::now(),
            enabled: is_enabled(),
        }
    }

    /// Stop and record. Returns elapsed seconds when timing is enabled.
    pub fn stop(self) -> Option<f64> {
        if !self.enabled {
            return None;
        }
        let elapsed = self.start.elapsed().as_secs_f64();
        self.sink.record(elapsed);
        Some(elapsed)
    }
}

/// Accumulating timer for tracking total time across multiple calls.
#[derive(Debug)]
pub struct AccumulatingTimer {
    total_ns: AtomicU64,
    max_ns: AtomicU64,
    count: AtomicU64,
}

impl Default for AccumulatingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl AccumulatingTimer {
    pub const fn new() -> Self {
        Self {
            total_ns: AtomicU64::new(0),
            max_ns: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a timing measurement.
    pub fn record(&self, duration_s: f64) {
        let nanos = (duration_s.max(0.0) * 1e9) as u64;
        self.total_ns.fetch_add(nanos, Ordering::Relaxed);
        self.max_ns.fetch_max(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_seconds(&self) -> f64 {
        self.total_ns.load(Ordering::Relaxed) as f64 / 1e9
    }

    /// Slowest single measurement (in seconds).
    pub fn max_seconds(&self) -> f64 {
        self.max_ns.load(Ordering::Relaxed) as f64 / 1e9
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get average time per call (in seconds).
    pub fn average_seconds(&self) -> f64 {
        let count = self.count();
        if count > 0 {
            self.total_seconds() / count as f64
        } else {
            0.0
        }
    }

    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::Relaxed);
        self.max_ns.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

/// Per-phase timers owned by one cycle driver.
#[derive(Debug, Default)]
pub struct CycleTimings {
    /// Controller read/write pass
    pub sync: AccumulatingTimer,
    /// Physics tick
    pub tick: AccumulatingTimer,
}

impl CycleTimings {
    pub fn reset(&self) {
        self.sync.reset();
        self.tick.reset();
    }

    /// One-line summary, `None` when nothing was recorded.
    pub fn summary(&self) -> Option<String> {
        if self.sync.count() == 0 && self.tick.count() == 0 {
            return None;
        }
        Some(format!(
            "sync: {} calls, {:.3}ms avg, {:.3}ms max | tick: {} calls, {:.3}ms avg, {:.3}ms max",
            self.sync.count(),
            self.sync.average_seconds() * 1000.0,
            self.sync.max_seconds() * 1000.0,
            self.tick.count(),
            self.tick.average_seconds() * 1000.0,
            self.tick.max_seconds() * 1000.0,
        ))
    }
}
