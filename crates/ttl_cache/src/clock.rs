//! Wall-clock abstraction so expiry logic is testable without real time.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of monotonic time for cache expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production clock backed by `Instant::now`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock. Time stands still until `advance` is called.
#[derive(Debug)]
pub struct ManualClock {
    epoch: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            epoch: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        })
    }

    /// Move time forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut offset = self.offset.lock().expect("clock mutex poisoned");
        *offset += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.epoch + *self.offset.lock().expect("clock mutex poisoned")
    }
}
