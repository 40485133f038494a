//! Injectable time source for the render loop and the capture stage.
//!
//! The scheduler itself is clock-agnostic (callers pass `now_ms` into each
//! tick); the clock abstraction exists so the capture loop can be paced by
//! real time in production and by a virtual timeline in tests.

use std::time::{Duration, Instant};

pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> f64;

    /// Suspend until `ms` milliseconds have passed.
    fn sleep_ms(&mut self, ms: f64);
}

/// Real wall-clock time, origin at construction.
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn sleep_ms(&mut self, ms: f64) {
        if ms > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(ms / 1000.0));
        }
    }
}

/// Virtual clock that only advances when slept on. Deterministic and
/// instantaneous, used by the timing tests.
pub struct ManualClock {
    now_ms: f64,
}

impl ManualClock {
    pub fn starting_at(now_ms: f64) -> Self {
        Self { now_ms }
    }

    pub fn advance(&mut self, ms: f64) {
        self.now_ms += ms.max(0.0);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now_ms
    }

    fn sleep_ms(&mut self, ms: f64) {
        self.advance(ms);
    }
}
