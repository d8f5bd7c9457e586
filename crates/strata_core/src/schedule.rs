use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Accumulates frame time and fires at most once per call when the interval elapses.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    interval: f32,
    accumulated: f32,
}

impl FixedInterval {
    /// The first `tick` always fires so a fresh streamer fills its window immediately.
    pub fn new(interval_secs: f32) -> Self {
        let interval = interval_secs.max(0.0);
        Self {
            interval,
            accumulated: interval,
        }
    }

    pub fn tick(&mut self, dt: f32) -> bool {
        if dt.is_finite() && dt > 0.0 {
            self.accumulated += dt;
        }
        if self.accumulated < self.interval {
            return false;
        }
        // Long stalls collapse into a single firing.
        self.accumulated = 0.0;
        true
    }
}

/// Shared flag tied to the lifetime of one unit of background work.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
